//! Coordinator-side edge routing
//!
//! Decides, per streamed edge, which worker(s) receive it and whether they
//! must store it.

pub mod router;

pub use router::{EdgeRouter, Route, RouterStats, WorkerId};
