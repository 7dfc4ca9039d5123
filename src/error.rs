//! Error types shared by the coordinator and worker roles

use crate::config::ConfigError;
use crate::io::ParseError;
use crate::transport::TransportError;
use crate::worker::WorkerPhase;
use thiserror::Error;
use tristream_sampling::SamplingError;

/// Top-level errors
#[derive(Error, Debug)]
pub enum TriError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Sampling engine could not be built
    #[error("Sampling error: {0}")]
    Sampling(#[from] SamplingError),

    /// Edge source could not be read
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Message delivery failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Operation not allowed in the worker's current phase
    #[error("Worker {worker} cannot {action} while {phase:?}")]
    InvalidPhase {
        worker: usize,
        phase: WorkerPhase,
        action: &'static str,
    },

    /// Vertex id too large to index the local count vector
    #[error("Vertex id {0} is too large for a dense local count vector")]
    VertexIdOverflow(u64),

    /// A worker task panicked or was cancelled
    #[error("Worker task failed: {0}")]
    WorkerTask(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TriResult<T> = Result<T, TriError>;
