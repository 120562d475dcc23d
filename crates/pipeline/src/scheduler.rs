//! Per-user FIFO lanes, each drained by one dedicated worker task.
//!
//! Activations of the same user run strictly in submission order and never
//! overlap. Different users run concurrently. A failing or panicking job is
//! logged and the worker moves on to the next request.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use analyzer_core::analysis::AnalysisDomain;
use analyzer_core::types::UserId;
use dashmap::DashMap;
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::executor::{JobExecutor, JobRequest, RunOutcome};

struct Lane {
    sender: mpsc::UnboundedSender<JobRequest>,
    /// Taken by the worker when it starts.
    receiver: Option<mpsc::UnboundedReceiver<JobRequest>>,
    /// Requests queued or in flight.
    pending: watch::Sender<usize>,
    worker: Option<JoinHandle<()>>,
}

impl Lane {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (pending, _) = watch::channel(0);
        Self {
            sender,
            receiver: Some(receiver),
            pending,
            worker: None,
        }
    }
}

pub struct JobScheduler {
    domain: AnalysisDomain,
    executor: Arc<JobExecutor>,
    lanes: DashMap<UserId, Lane>,
    shutdown: CancellationToken,
}

impl JobScheduler {
    pub fn new(domain: AnalysisDomain, executor: Arc<JobExecutor>) -> Self {
        Self {
            domain,
            executor,
            lanes: DashMap::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn domain(&self) -> AnalysisDomain {
        self.domain
    }

    /// Append a request to the user's lane. Never blocks.
    pub fn enqueue(&self, request: JobRequest) -> Result<(), PipelineError> {
        if self.shutdown.is_cancelled() {
            return Err(PipelineError::ShuttingDown(self.domain));
        }

        let lane = self
            .lanes
            .entry(request.user_id.clone())
            .or_insert_with(Lane::new);

        lane.pending.send_modify(|n| *n += 1);
        if lane.sender.send(request).is_err() {
            // Only possible once the worker has exited on shutdown.
            lane.pending.send_modify(|n| *n = n.saturating_sub(1));
            return Err(PipelineError::ShuttingDown(self.domain));
        }
        Ok(())
    }

    /// Start the user's worker unless it is already running.
    pub fn ensure_worker_running(&self, user_id: &UserId) {
        let mut lane = self.lanes.entry(user_id.clone()).or_insert_with(Lane::new);
        let Some(receiver) = lane.receiver.take() else {
            return;
        };

        let worker = Worker {
            domain: self.domain,
            user_id: user_id.clone(),
            executor: Arc::clone(&self.executor),
            pending: lane.pending.clone(),
            shutdown: self.shutdown.clone(),
        };
        lane.worker = Some(tokio::spawn(worker.run(receiver)));
        tracing::info!(domain = %self.domain, user_id = %user_id, "Started user worker");
    }

    /// Enqueue and make sure a worker will pick the request up.
    pub fn submit(&self, request: JobRequest) -> Result<(), PipelineError> {
        let user_id = request.user_id.clone();
        self.enqueue(request)?;
        self.ensure_worker_running(&user_id);
        Ok(())
    }

    /// Resolve once the user has nothing queued or in flight.
    pub async fn wait_idle(&self, user_id: &UserId) {
        let Some(mut pending) = self.lanes.get(user_id).map(|lane| lane.pending.subscribe()) else {
            return;
        };
        // Err means the lane is gone, which also means idle.
        let _ = pending.wait_for(|n| *n == 0).await;
    }

    /// Requests queued or in flight for one user.
    pub fn pending(&self, user_id: &UserId) -> usize {
        self.lanes
            .get(user_id)
            .map_or(0, |lane| *lane.pending.borrow())
    }

    pub fn worker_count(&self) -> usize {
        self.lanes.iter().filter(|lane| lane.worker.is_some()).count()
    }

    /// Stop accepting work, let running jobs reach their end, and wait for
    /// the workers up to `timeout`.
    pub async fn shutdown(&self, timeout: Duration) {
        self.shutdown.cancel();

        let handles: Vec<JoinHandle<()>> = self
            .lanes
            .iter_mut()
            .filter_map(|mut lane| lane.worker.take())
            .collect();
        let count = handles.len();

        let joined = tokio::time::timeout(timeout, futures::future::join_all(handles)).await;
        match joined {
            Ok(_) => tracing::info!(domain = %self.domain, count, "User workers stopped"),
            Err(_) => tracing::warn!(domain = %self.domain, count, "User workers did not stop in time"),
        }
    }
}

struct Worker {
    domain: AnalysisDomain,
    user_id: UserId,
    executor: Arc<JobExecutor>,
    pending: watch::Sender<usize>,
    shutdown: CancellationToken,
}

impl Worker {
    async fn run(self, mut receiver: mpsc::UnboundedReceiver<JobRequest>) {
        loop {
            let request = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                request = receiver.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };

            let result = AssertUnwindSafe(self.executor.run_job(&request))
                .catch_unwind()
                .await;

            match result {
                Ok(Ok(outcome)) => log_outcome(&request, outcome),
                Ok(Err(e)) => {
                    tracing::error!(
                        domain = %self.domain,
                        user_id = %request.user_id,
                        job_id = %request.job_id,
                        error = %e,
                        "Job activation failed",
                    );
                }
                Err(_) => {
                    tracing::error!(
                        domain = %self.domain,
                        user_id = %request.user_id,
                        job_id = %request.job_id,
                        "Job activation panicked",
                    );
                }
            }

            self.pending.send_modify(|n| *n = n.saturating_sub(1));
        }

        // Whatever is still queued is dropped with the receiver.
        self.pending.send_replace(0);
        tracing::debug!(domain = %self.domain, user_id = %self.user_id, "User worker exited");
    }
}

fn log_outcome(request: &JobRequest, outcome: RunOutcome) {
    tracing::debug!(
        user_id = %request.user_id,
        job_id = %request.job_id,
        resume = request.is_resume,
        ?outcome,
        "Job activation finished",
    );
}
