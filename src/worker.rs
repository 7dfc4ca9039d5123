//! Worker role
//!
//! Wraps one [`CountingEngine`] and enforces the worker lifecycle:
//! `Idle -> Receiving -> Draining -> Reporting -> Terminal`.

use crate::config::Method;
use crate::error::{TriError, TriResult};
use crate::routing::WorkerId;
use std::collections::HashMap;
use tracing::debug;
use tristream_sampling::{Admission, CountingEngine, Edge, SamplerConfig, SamplerStats, VertexId};

/// Lifecycle phase of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Created, no edge received yet
    Idle,
    /// Processing edges
    Receiving,
    /// End of stream received, no more edges accepted
    Draining,
    /// Counts have been taken
    Reporting,
    /// Counts sent, worker done
    Terminal,
}

/// What a worker does with the edges it receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerMode {
    /// Sample and count
    #[default]
    Count,
    /// Drain the stream and report zero, to measure routing and transport cost
    Discard,
}

/// Counts taken from a worker at the end of the stream
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerCounts {
    pub global_cnt: f64,
    pub local_cnt: HashMap<VertexId, f32>,
    pub stats: Option<SamplerStats>,
}

/// One worker's state for a single stream pass
pub struct Worker {
    id: WorkerId,
    method: Method,
    phase: WorkerPhase,
    engine: Option<CountingEngine>,
    received: u64,
}

impl Worker {
    /// Create a worker whose engine is seeded with `seed + id`
    pub fn new(
        id: WorkerId,
        method: Method,
        mode: WorkerMode,
        sampler: SamplerConfig,
        seed: u64,
    ) -> TriResult<Self> {
        let engine = match mode {
            WorkerMode::Count => Some(CountingEngine::new(sampler, seed.wrapping_add(id as u64))?),
            WorkerMode::Discard => None,
        };
        Ok(Self {
            id,
            method,
            phase: WorkerPhase::Idle,
            engine,
            received: 0,
        })
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn phase(&self) -> WorkerPhase {
        self.phase
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn engine(&self) -> Option<&CountingEngine> {
        self.engine.as_ref()
    }

    /// Process one delivered edge.
    ///
    /// Mandatory edges take the store-without-sampling path, except under the
    /// naive method where every edge is sampled. Returns `None` in discard mode.
    pub fn process(&mut self, edge: &Edge) -> TriResult<Option<Admission>> {
        match self.phase {
            WorkerPhase::Idle => self.phase = WorkerPhase::Receiving,
            WorkerPhase::Receiving => {}
            phase => return Err(self.invalid(phase, "accept edges")),
        }
        self.received += 1;

        let Some(engine) = self.engine.as_mut() else {
            return Ok(None);
        };
        let admission = if edge.do_store && self.method != Method::Naive {
            engine.process_edge_without_sampling(edge)
        } else {
            engine.process_edge(edge)
        };
        Ok(Some(admission))
    }

    /// Mark the end of the stream
    pub fn end_stream(&mut self) -> TriResult<()> {
        match self.phase {
            WorkerPhase::Idle | WorkerPhase::Receiving => {
                debug!(worker = self.id, received = self.received, "End of stream");
                self.phase = WorkerPhase::Draining;
                Ok(())
            }
            phase => Err(self.invalid(phase, "end the stream")),
        }
    }

    /// Take the final counts. Allowed once, after the end of the stream.
    pub fn take_counts(&mut self) -> TriResult<WorkerCounts> {
        if self.phase != WorkerPhase::Draining {
            return Err(self.invalid(self.phase, "report counts"));
        }
        self.phase = WorkerPhase::Reporting;

        let counts = match self.engine.take() {
            Some(engine) => {
                let stats = engine.stats();
                let (global_cnt, local_cnt) = engine.into_counts();
                WorkerCounts { global_cnt, local_cnt, stats: Some(stats) }
            }
            None => WorkerCounts {
                global_cnt: 0.0,
                local_cnt: HashMap::new(),
                stats: None,
            },
        };
        Ok(counts)
    }

    /// Mark the counts as delivered
    pub fn terminate(&mut self) -> TriResult<()> {
        if self.phase != WorkerPhase::Reporting {
            return Err(self.invalid(self.phase, "terminate"));
        }
        self.phase = WorkerPhase::Terminal;
        Ok(())
    }

    fn invalid(&self, phase: WorkerPhase, action: &'static str) -> TriError {
        TriError::InvalidPhase { worker: self.id, phase, action }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(method: Method) -> Worker {
        Worker::new(0, method, WorkerMode::Count, SamplerConfig::new(10, 10, 1.0), 0).unwrap()
    }

    #[test]
    fn test_lifecycle() {
        let mut w = worker(Method::Partition);
        assert_eq!(w.phase(), WorkerPhase::Idle);

        for (u, v) in [(1, 2), (2, 3), (1, 3)] {
            w.process(&Edge::new(u, v)).unwrap();
        }
        assert_eq!(w.phase(), WorkerPhase::Receiving);

        w.end_stream().unwrap();
        assert!(w.process(&Edge::new(4, 5)).is_err());

        let counts = w.take_counts().unwrap();
        assert_eq!(counts.global_cnt, 1.0);
        assert_eq!(counts.local_cnt[&1], 1.0);
        assert!(w.take_counts().is_err());

        w.terminate().unwrap();
        assert_eq!(w.phase(), WorkerPhase::Terminal);
    }

    #[test]
    fn test_empty_stream_can_report() {
        let mut w = worker(Method::Partition);
        w.end_stream().unwrap();
        let counts = w.take_counts().unwrap();
        assert_eq!(counts.global_cnt, 0.0);
        assert!(counts.local_cnt.is_empty());
    }

    #[test]
    fn test_mandatory_edges_skip_sampling() {
        let sampler = SamplerConfig::new(1, 1, 0.01);
        let mut w = Worker::new(0, Method::Partition, WorkerMode::Count, sampler, 0).unwrap();

        w.process(&Edge::stored(1, 2)).unwrap();
        let admission = w.process(&Edge::stored(3, 4)).unwrap();
        assert_eq!(
            admission,
            Some(Admission::Stored { evicted: Some(Edge::stored(1, 2)) })
        );
        assert_eq!(w.engine().unwrap().stats().evictions, 1);
    }

    #[test]
    fn test_discard_mode_reports_zero() {
        let mut w = Worker::new(1, Method::Naive, WorkerMode::Discard, SamplerConfig::new(10, 10, 1.0), 0)
            .unwrap();
        assert_eq!(w.process(&Edge::new(1, 2)).unwrap(), None);
        w.end_stream().unwrap();
        let counts = w.take_counts().unwrap();
        assert_eq!(counts.global_cnt, 0.0);
        assert!(counts.stats.is_none());
        assert_eq!(w.received(), 1);
    }
}
