//! In-process transport over tokio channels
//!
//! One bounded queue per worker keeps edges in send order; a shared queue
//! carries the final reports back to the coordinator.

use super::{Transport, TransportError, TransportResult, WorkerMessage, WorkerReport};
use crate::routing::WorkerId;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{channel, unbounded_channel, Receiver, Sender, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};
use tristream_sampling::Edge;

/// Coordinator end of the channel transport
pub struct ChannelTransport {
    workers: Vec<Sender<WorkerMessage>>,
    reports: UnboundedReceiver<WorkerReport>,
}

/// Worker end of the channel transport
pub struct WorkerEndpoint {
    id: WorkerId,
    inbox: Receiver<WorkerMessage>,
    reports: UnboundedSender<WorkerReport>,
    /// Time spent blocked waiting for messages
    blocked: Duration,
}

impl ChannelTransport {
    /// Create a transport and the matching endpoint for each worker.
    ///
    /// `buf_len` is the number of messages a worker queue holds before sends wait.
    pub fn new(worker_num: usize, buf_len: usize) -> (Self, Vec<WorkerEndpoint>) {
        let (report_tx, report_rx) = unbounded_channel();
        let mut workers = Vec::with_capacity(worker_num);
        let mut endpoints = Vec::with_capacity(worker_num);

        for id in 0..worker_num {
            let (tx, rx) = channel(buf_len.max(1));
            workers.push(tx);
            endpoints.push(WorkerEndpoint {
                id,
                inbox: rx,
                reports: report_tx.clone(),
                blocked: Duration::ZERO,
            });
        }

        (Self { workers, reports: report_rx }, endpoints)
    }

    async fn push(&self, worker: WorkerId, message: WorkerMessage) -> TransportResult<()> {
        self.workers
            .get(worker)
            .ok_or(TransportError::UnknownWorker(worker))?
            .send(message)
            .await
            .map_err(|_| TransportError::WorkerUnavailable(worker))
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    fn worker_num(&self) -> usize {
        self.workers.len()
    }

    async fn send_edge(&self, edge: Edge, worker: WorkerId) -> TransportResult<()> {
        self.push(worker, WorkerMessage::Edge(edge)).await
    }

    async fn broadcast_pair(&self, edge: Edge, first: WorkerId, second: WorkerId) -> TransportResult<()> {
        self.push(first, WorkerMessage::Edge(edge)).await?;
        self.push(second, WorkerMessage::Edge(edge)).await
    }

    async fn broadcast_all(&self, edge: Edge) -> TransportResult<()> {
        for w in 0..self.workers.len() {
            self.push(w, WorkerMessage::Edge(edge)).await?;
        }
        Ok(())
    }

    async fn send_end_signal(&self) -> TransportResult<()> {
        debug!(workers = self.workers.len(), "Sending end signal");
        for w in 0..self.workers.len() {
            self.push(w, WorkerMessage::End).await?;
        }
        Ok(())
    }

    async fn gather(&mut self) -> TransportResult<Vec<WorkerReport>> {
        let expected = self.workers.len();
        let mut reports = Vec::with_capacity(expected);

        while reports.len() < expected {
            match self.reports.recv().await {
                Some(report) => {
                    debug!(worker = report.worker, global = report.global_cnt, "Received worker report");
                    reports.push(report);
                }
                None => {
                    return Err(TransportError::IncompleteGather {
                        expected,
                        received: reports.len(),
                    })
                }
            }
        }

        reports.sort_by_key(|r| r.worker);
        info!(workers = expected, "Gathered all worker reports");
        Ok(reports)
    }
}

impl WorkerEndpoint {
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Wait for the next edge. Returns `None` once the end signal arrives or
    /// the coordinator has gone away.
    pub async fn recv_edge(&mut self) -> Option<Edge> {
        let start = Instant::now();
        let message = self.inbox.recv().await;
        self.blocked += start.elapsed();
        match message {
            Some(WorkerMessage::Edge(edge)) => Some(edge),
            Some(WorkerMessage::End) | None => None,
        }
    }

    /// Time spent waiting on the inbound queue so far
    pub fn blocked_time(&self) -> Duration {
        self.blocked
    }

    /// Send this worker's counts to the coordinator
    pub fn send_cnt(&self, report: WorkerReport) -> TransportResult<()> {
        self.reports
            .send(report)
            .map_err(|_| TransportError::CoordinatorUnavailable)
    }
}
