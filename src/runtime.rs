//! Run driver
//!
//! A run has one coordinator and `worker_num` workers. Each participant is a
//! [`Role`], dispatched once: the coordinator streams and routes edges and
//! aggregates the final reports, each worker drains its queue through its own
//! counting engine and reports back.

use crate::aggregate::Aggregator;
use crate::config::EstimatorConfig;
use crate::error::{TriError, TriResult};
use crate::io::{EdgeParser, ParseError, ResultWriter};
use crate::routing::{EdgeRouter, RouterStats};
use crate::transport::{ChannelTransport, Transport, WorkerEndpoint, WorkerReport};
use crate::worker::{Worker, WorkerMode};
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tristream_sampling::Edge;

/// Result of one run, as seen by the coordinator
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunOutcome {
    pub global_cnt: f64,
    /// Local estimate per vertex id
    pub local_cnt: Vec<f32>,
    /// Coordinator processing seconds, excluding time spent in the transport
    pub src_comp_cost: f64,
    pub worker_comp_cost_max: f64,
    pub worker_comp_cost_sum: f64,
    /// Wall-clock milliseconds for the whole run
    pub elapsed_ms: f64,
    pub router: RouterStats,
}

/// Coordinator state: the edge source, the router and the transport
pub struct Coordinator<T, I> {
    transport: T,
    router: EdgeRouter,
    edges: I,
}

impl<T, I> Coordinator<T, I>
where
    T: Transport,
    I: Iterator<Item = Result<Edge, ParseError>> + Send,
{
    /// `seed` keys vertex ownership for this run
    pub fn new(config: &EstimatorConfig, transport: T, edges: I, seed: u64) -> Self {
        Self {
            router: EdgeRouter::new(config.worker_num, config.method, config.tolerance, seed),
            transport,
            edges,
        }
    }

    /// Stream every edge, signal the end and aggregate the worker reports
    pub async fn run(mut self) -> TriResult<RunOutcome> {
        let start = Instant::now();
        let mut io_time = Duration::ZERO;

        for edge in self.edges.by_ref() {
            let mut edge = edge?;
            let Some(route) = self.router.route(&mut edge) else {
                continue;
            };
            let sent = Instant::now();
            self.transport.deliver(edge, route).await?;
            io_time += sent.elapsed();
        }

        let sent = Instant::now();
        self.transport.send_end_signal().await?;
        let reports = self.transport.gather().await?;
        io_time += sent.elapsed();

        let stats = self.router.stats().clone();
        info!(
            routed = stats.routed,
            unicast = stats.unicast,
            pair = stats.pair,
            replicated = stats.replicated,
            mandatory = stats.mandatory,
            max_vid = self.router.max_vid(),
            "Stream routed"
        );

        let mut aggregator = Aggregator::new(
            self.router.method(),
            self.router.worker_num(),
            self.router.max_vid(),
        )?;
        let mut worker_comp_cost_max: f64 = 0.0;
        let mut worker_comp_cost_sum = 0.0;
        for report in &reports {
            aggregator.add(report.global_cnt, &report.local_cnt);
            worker_comp_cost_max = worker_comp_cost_max.max(report.comp_cost_secs);
            worker_comp_cost_sum += report.comp_cost_secs;
        }
        let result = aggregator.finish();

        Ok(RunOutcome {
            global_cnt: result.global_cnt,
            local_cnt: result.local_cnt,
            src_comp_cost: start.elapsed().saturating_sub(io_time).as_secs_f64(),
            worker_comp_cost_max,
            worker_comp_cost_sum,
            elapsed_ms: 0.0,
            router: stats,
        })
    }
}

/// Worker state: its inbound endpoint and its counting worker
pub struct WorkerTask {
    endpoint: WorkerEndpoint,
    worker: Worker,
}

impl WorkerTask {
    pub fn new(endpoint: WorkerEndpoint, worker: Worker) -> Self {
        Self { endpoint, worker }
    }

    /// Process edges until the end signal, then report counts
    pub async fn run(mut self) -> TriResult<()> {
        let start = Instant::now();

        while let Some(edge) = self.endpoint.recv_edge().await {
            self.worker.process(&edge)?;
        }
        self.worker.end_stream()?;

        let counts = self.worker.take_counts()?;
        if let Some(stats) = &counts.stats {
            debug!(
                worker = self.worker.id(),
                seen = stats.seen,
                admitted = stats.admitted,
                evictions = stats.evictions,
                rounds = stats.total_round,
                "Worker finished stream"
            );
        }

        let comp_cost = start.elapsed().saturating_sub(self.endpoint.blocked_time());
        self.endpoint.send_cnt(WorkerReport {
            worker: self.worker.id(),
            global_cnt: counts.global_cnt,
            local_cnt: counts.local_cnt,
            comp_cost_secs: comp_cost.as_secs_f64(),
            stats: counts.stats,
        })?;
        self.worker.terminate()
    }
}

/// A participant in a run
pub enum Role<T, I> {
    Coordinator(Coordinator<T, I>),
    Worker(WorkerTask),
}

impl<T, I> Role<T, I>
where
    T: Transport,
    I: Iterator<Item = Result<Edge, ParseError>> + Send,
{
    /// Run this role to completion. Only the coordinator returns an outcome.
    pub async fn run(self) -> TriResult<Option<RunOutcome>> {
        match self {
            Role::Coordinator(coordinator) => coordinator.run().await.map(Some),
            Role::Worker(task) => task.run().await.map(|_| None),
        }
    }
}

/// Run one pass over `edges` with in-process workers
pub async fn run_once<I>(
    config: &EstimatorConfig,
    edges: I,
    seed: u64,
    mode: WorkerMode,
) -> TriResult<RunOutcome>
where
    I: Iterator<Item = Result<Edge, ParseError>> + Send + 'static,
{
    config.validate()?;
    let start = Instant::now();

    let (transport, endpoints) = ChannelTransport::new(config.worker_num, config.buf_len);
    let mut handles = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints {
        let worker = Worker::new(endpoint.id(), config.method, mode, config.sampler(), seed)?;
        let role: Role<ChannelTransport, I> = Role::Worker(WorkerTask::new(endpoint, worker));
        handles.push(tokio::spawn(role.run()));
    }

    let coordinator = Role::Coordinator(Coordinator::new(config, transport, edges, seed));
    let outcome = coordinator.run().await;

    let mut worker_error = None;
    for handle in handles {
        match handle.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                warn!("Worker failed: {}", e);
                worker_error.get_or_insert(e);
            }
            Err(e) => {
                worker_error.get_or_insert(TriError::WorkerTask(e.to_string()));
            }
        }
    }

    let mut outcome = match (outcome, worker_error) {
        (Ok(Some(outcome)), None) => outcome,
        (Err(e), _) | (Ok(_), Some(e)) => return Err(e),
        (Ok(None), None) => return Err(TriError::WorkerTask("coordinator produced no outcome".to_string())),
    };
    outcome.elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    Ok(outcome)
}

/// Run one pass over an in-memory edge list
pub async fn run_edges(
    config: &EstimatorConfig,
    edges: Vec<Edge>,
    seed: u64,
) -> TriResult<RunOutcome> {
    run_once(config, edges.into_iter().map(Ok), seed, WorkerMode::Count).await
}

/// Repeat the run `config.repeat` times over the edge file at `input`,
/// writing each run's results into `output`
pub async fn run_experiment(
    config: &EstimatorConfig,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    mode: WorkerMode,
) -> TriResult<Vec<RunOutcome>> {
    config.validate()?;
    let writer = ResultWriter::new(output)?;
    let mut outcomes = Vec::with_capacity(config.repeat);

    for i in 0..config.repeat {
        let parser = EdgeParser::open(input.as_ref())?;
        let seed = config.run_seed(i);
        let outcome = run_once(config, parser, seed, mode).await?;

        info!(
            run = i,
            seed,
            global = outcome.global_cnt,
            elapsed_ms = outcome.elapsed_ms,
            src_cost = outcome.src_comp_cost,
            worker_cost_max = outcome.worker_comp_cost_max,
            "Run complete"
        );
        writer.write_run(i, &outcome)?;
        outcomes.push(outcome);
    }

    Ok(outcomes)
}
