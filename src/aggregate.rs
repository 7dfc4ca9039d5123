//! Coordinator-side aggregation of worker counts
//!
//! Sums the per-worker global and local estimates into a dense per-vertex
//! vector, then divides by [`Method::rescale`]: the worker count when every
//! worker sampled the whole stream, the probability that a triangle is
//! observable at all under vertex partitioning.

use crate::config::Method;
use crate::error::{TriError, TriResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};
use tristream_sampling::VertexId;

/// Final estimate for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    /// Global triangle-count estimate
    pub global_cnt: f64,
    /// Local estimate per vertex, indexed by vertex id (length `max_vid + 1`)
    pub local_cnt: Vec<f32>,
    /// Number of worker reports combined
    pub reports: usize,
}

/// Accumulates worker reports for one run
#[derive(Debug, Clone)]
pub struct Aggregator {
    method: Method,
    worker_num: usize,
    global: f64,
    local: Vec<f64>,
    reports: usize,
}

impl Aggregator {
    /// Fails when `max_vid + 1` entries cannot be indexed
    pub fn new(method: Method, worker_num: usize, max_vid: VertexId) -> TriResult<Self> {
        let len = usize::try_from(max_vid)
            .ok()
            .and_then(|m| m.checked_add(1))
            .ok_or(TriError::VertexIdOverflow(max_vid))?;
        Ok(Self {
            method,
            worker_num: worker_num.max(1),
            global: 0.0,
            local: vec![0.0; len],
            reports: 0,
        })
    }

    /// Add one worker's contribution
    pub fn add(&mut self, global_cnt: f64, local_cnt: &HashMap<VertexId, f32>) {
        self.global += global_cnt;
        for (&v, &cnt) in local_cnt {
            let Some(idx) = usize::try_from(v).ok().filter(|&i| i < usize::MAX) else {
                warn!(vertex = v, "Local count for unindexable vertex dropped");
                continue;
            };
            if idx >= self.local.len() {
                // a worker can only know vertices the router saw
                warn!(vertex = v, "Local count for vertex beyond max id, growing result");
                self.local.resize(idx + 1, 0.0);
            }
            self.local[idx] += cnt as f64;
        }
        self.reports += 1;
    }

    /// Apply the method's rescaling and return the final estimate
    pub fn finish(self) -> AggregateResult {
        if self.reports != self.worker_num {
            warn!(
                expected = self.worker_num,
                received = self.reports,
                "Aggregating an incomplete set of worker reports"
            );
        }

        let scale = self.method.rescale(self.worker_num);

        let global_cnt = self.global / scale;
        let local_cnt = self.local.iter().map(|&c| (c / scale) as f32).collect();
        debug!(global_cnt, reports = self.reports, "Aggregated worker counts");

        AggregateResult {
            global_cnt,
            local_cnt,
            reports: self.reports,
        }
    }
}
