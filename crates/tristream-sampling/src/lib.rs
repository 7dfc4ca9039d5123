//! Bounded-memory triangle estimation over edge streams
//!
//! Each worker owns one [`CountingEngine`], which keeps a fixed-capacity
//! [`Reservoir`] of the edges it has seen and a running estimate of the global
//! and per-vertex triangle counts derived from that sample.

pub mod common;
pub mod engine;
pub mod error;
pub mod reservoir;

pub use common::{Edge, SlotId, VertexId};
pub use engine::{Admission, CountingEngine, SamplerConfig, SamplerStats};
pub use error::{SamplingError, SamplingResult};
pub use reservoir::Reservoir;
