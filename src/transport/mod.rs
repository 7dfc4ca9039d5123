//! Coordinator/worker message transport
//!
//! The counting core never performs IO itself. The coordinator pushes edges
//! through a [`Transport`], and each worker pulls them from its own
//! [`WorkerEndpoint`] in the order they were sent. Sends wait while a
//! worker's queue is full, which bounds the memory held in flight.

pub mod channel;

use crate::routing::{Route, WorkerId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tristream_sampling::{Edge, SamplerStats, VertexId};

pub use channel::{ChannelTransport, WorkerEndpoint};

/// Transport errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Worker id outside `[0, worker_num)`
    #[error("Unknown worker: {0}")]
    UnknownWorker(WorkerId),

    /// Worker's inbound queue is closed
    #[error("Worker {0} is no longer receiving")]
    WorkerUnavailable(WorkerId),

    /// Coordinator's report queue is closed
    #[error("Coordinator is no longer receiving reports")]
    CoordinatorUnavailable,

    /// Not every worker reported before the report queue closed
    #[error("Gathered {received} of {expected} worker reports")]
    IncompleteGather { expected: usize, received: usize },
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Message on a worker's inbound queue
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WorkerMessage {
    /// Next streamed edge
    Edge(Edge),
    /// No more edges will arrive
    End,
}

/// Counts and cost a worker sends back at the end of a stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub worker: WorkerId,
    pub global_cnt: f64,
    pub local_cnt: HashMap<VertexId, f32>,
    /// Seconds spent processing, excluding time blocked on the transport
    pub comp_cost_secs: f64,
    pub stats: Option<SamplerStats>,
}

/// Coordinator side of the transport
#[async_trait]
pub trait Transport: Send + Sync {
    fn worker_num(&self) -> usize;

    /// Deliver one edge to exactly one worker
    async fn send_edge(&self, edge: Edge, worker: WorkerId) -> TransportResult<()>;

    /// Deliver one edge to two workers, each independently
    async fn broadcast_pair(&self, edge: Edge, first: WorkerId, second: WorkerId) -> TransportResult<()>;

    /// Deliver one edge to every worker
    async fn broadcast_all(&self, edge: Edge) -> TransportResult<()>;

    /// Tell every worker the stream has ended
    async fn send_end_signal(&self) -> TransportResult<()>;

    /// Wait for one report per worker
    async fn gather(&mut self) -> TransportResult<Vec<WorkerReport>>;

    /// Deliver `edge` along a routing decision
    async fn deliver(&self, edge: Edge, route: Route) -> TransportResult<()> {
        match route {
            Route::Unicast(w) => self.send_edge(edge, w).await,
            Route::Pair(a, b) => self.broadcast_pair(edge, a, b).await,
            Route::All => self.broadcast_all(edge).await,
        }
    }
}
