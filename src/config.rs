//! Run configuration
//!
//! Options can come from a YAML file and be overridden from the command line.
//! Everything is validated once, before any worker is created.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;
use tristream_sampling::SamplerConfig;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A value is out of range
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// Unknown counting method name
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    /// Config file could not be read
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid YAML
    #[error("Failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Sampling and counting policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Every worker sees the whole stream and samples it independently
    Naive,
    /// Vertices are owned by workers; edges go to the owners of their endpoints
    Partition,
}

impl Method {
    /// Whether every worker receives the whole stream
    pub fn replicates_stream(&self) -> bool {
        matches!(self, Method::Naive)
    }

    /// Divisor applied to the summed worker counts.
    ///
    /// Under `Naive` each triangle is counted once per worker. Under
    /// `Partition` a triangle is seen by some worker only when at most two
    /// owners share its vertices; with owners drawn uniformly per run that
    /// happens with probability `1 - (w - 1)(w - 2) / w^2`.
    pub fn rescale(&self, worker_num: usize) -> f64 {
        let w = worker_num.max(1) as f64;
        match self {
            Method::Naive => w,
            Method::Partition => 1.0 - (w - 1.0) * (w - 2.0) / (w * w),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Naive => write!(f, "naive"),
            Method::Partition => write!(f, "partition"),
        }
    }
}

impl FromStr for Method {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "naive" => Ok(Method::Naive),
            "partition" => Ok(Method::Partition),
            other => Err(ConfigError::UnknownMethod(other.to_string())),
        }
    }
}

/// Estimator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Number of worker processes
    pub worker_num: usize,
    /// Counting method
    pub method: Method,
    /// Reservoir capacity per worker (k)
    pub mem_size: usize,
    /// Hard per-worker memory ceiling, in edges
    pub total_space: usize,
    /// Target retention fraction in (0, 1]
    pub rate: f64,
    /// Load-balance tolerance for mandatory stores on broadcast edges
    pub tolerance: f64,
    /// Base RNG seed; worker `i` uses `seed + i`, the router derives its
    /// vertex ownership from it
    pub seed: u64,
    /// Number of repeated runs
    pub repeat: usize,
    /// Messages buffered per worker queue
    pub buf_len: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            worker_num: 4,
            method: Method::Partition,
            mem_size: 100_000,
            total_space: 100_000,
            rate: 1.0,
            tolerance: 0.2,
            seed: 0,
            repeat: 1,
            buf_len: 1024,
        }
    }
}

impl EstimatorConfig {
    /// Load a YAML config file; missing keys keep their defaults
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&text)?;
        debug!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.worker_num == 0 {
            return Err(ConfigError::Invalid {
                field: "worker_num",
                reason: "at least one worker is required".to_string(),
            });
        }

        if self.mem_size == 0 {
            return Err(ConfigError::Invalid {
                field: "mem_size",
                reason: "reservoir capacity must be positive".to_string(),
            });
        }

        if self.mem_size > self.total_space {
            return Err(ConfigError::Invalid {
                field: "total_space",
                reason: format!(
                    "total space ({}) is smaller than the reservoir capacity ({})",
                    self.total_space, self.mem_size
                ),
            });
        }

        if !(self.rate > 0.0 && self.rate <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "rate",
                reason: format!("must be in (0, 1], got {}", self.rate),
            });
        }

        if !(self.tolerance >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "tolerance",
                reason: format!("must be non-negative, got {}", self.tolerance),
            });
        }

        if self.buf_len == 0 {
            return Err(ConfigError::Invalid {
                field: "buf_len",
                reason: "worker queues need room for at least one message".to_string(),
            });
        }

        if self.repeat == 0 {
            return Err(ConfigError::Invalid {
                field: "repeat",
                reason: "at least one run is required".to_string(),
            });
        }

        Ok(())
    }

    /// Per-worker sampler parameters
    pub fn sampler(&self) -> SamplerConfig {
        SamplerConfig::new(self.mem_size, self.total_space, self.rate)
    }

    /// Seed for run `i` of an experiment
    pub fn run_seed(&self, i: usize) -> u64 {
        self.seed + (self.repeat * self.worker_num * i) as u64
    }
}
