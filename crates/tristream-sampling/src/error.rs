//! Sampling engine errors

use thiserror::Error;

/// Errors raised when a counting engine is constructed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplingError {
    /// Reservoir capacity must be positive
    #[error("Reservoir capacity must be positive")]
    ZeroCapacity,

    /// Capacity above the hard memory ceiling
    #[error("Reservoir capacity {k} exceeds total space {total_space}")]
    CapacityExceedsTotalSpace { k: usize, total_space: usize },

    /// Retention rate outside (0, 1]
    #[error("Retention rate must be in (0, 1], got {0}")]
    InvalidRate(f64),
}

pub type SamplingResult<T> = Result<T, SamplingError>;
