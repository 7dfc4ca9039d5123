//! Tristream
//!
//! Distributed, bounded-memory triangle counting over a one-pass edge stream.
//!
//! # Architecture
//!
//! - A coordinator reads the edge stream and routes every edge with an
//!   [`EdgeRouter`]: to the owner of both endpoints, to the two owners when
//!   they differ, or to every worker under the naive method.
//! - Each worker keeps a fixed-capacity edge reservoir
//!   ([`tristream_sampling::CountingEngine`]) and maintains weighted global
//!   and per-vertex triangle estimates.
//! - At the end of the stream the coordinator gathers the worker reports and
//!   combines them with an [`Aggregator`].
//!
//! ## Example Usage
//!
//! ```rust
//! use tristream::{run_edges, EstimatorConfig, Method};
//! use tristream_sampling::Edge;
//!
//! let config = EstimatorConfig {
//!     worker_num: 1,
//!     method: Method::Partition,
//!     mem_size: 10,
//!     total_space: 10,
//!     ..Default::default()
//! };
//! let edges = vec![Edge::new(1, 2), Edge::new(2, 3), Edge::new(1, 3)];
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let outcome = runtime.block_on(run_edges(&config, edges, 0)).unwrap();
//! assert_eq!(outcome.global_cnt, 1.0);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod config;
pub mod error;
pub mod io;
pub mod routing;
pub mod runtime;
pub mod transport;
pub mod worker;

// Re-export main types for convenience
pub use aggregate::{AggregateResult, Aggregator};
pub use config::{ConfigError, ConfigResult, EstimatorConfig, Method};
pub use error::{TriError, TriResult};
pub use io::{EdgeParser, ParseError, ResultWriter};
pub use routing::{EdgeRouter, Route, RouterStats, WorkerId};
pub use runtime::{run_edges, run_experiment, run_once, Coordinator, Role, RunOutcome, WorkerTask};
pub use transport::{
    ChannelTransport, Transport, TransportError, TransportResult, WorkerEndpoint, WorkerMessage,
    WorkerReport,
};
pub use worker::{Worker, WorkerCounts, WorkerMode, WorkerPhase};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
