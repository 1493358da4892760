use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::context::PipelineContext;
use crate::error::{PipelineError, Result};
use crate::types::ConversionTask;

/// Workers used when no explicit count is configured: every core with
/// `all_cores`, otherwise one core is left free. Never below one.
pub fn default_worker_count(all_cores: bool) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    if all_cores {
        cores
    } else {
        cores.saturating_sub(1).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub workers: usize,
    /// Bound of the task channel; submitters wait once it is full.
    pub capacity: usize,
}

impl PoolConfig {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            capacity: workers * 4,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(default_worker_count(false))
    }
}

/// Accepted/completed counters shared by the pool and its submitters.
#[derive(Debug, Default)]
pub struct PoolStatus {
    accepted: AtomicUsize,
    completed: AtomicUsize,
}

impl PoolStatus {
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::Acquire)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    /// Tasks accepted but not yet finished.
    pub fn pending(&self) -> usize {
        self.accepted().saturating_sub(self.completed())
    }
}

/// Cloneable handle for feeding tasks into a [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct TaskSubmitter {
    sender: Arc<Mutex<Option<mpsc::Sender<ConversionTask>>>>,
    in_flight: Arc<Mutex<HashSet<PathBuf>>>,
    status: Arc<PoolStatus>,
}

impl TaskSubmitter {
    /// Queue `task`, waiting while the channel is full.
    ///
    /// Returns `Ok(false)` when the same original is already queued or being
    /// processed, and an error once the pool has shut down. Dropping the
    /// future before it resolves leaves the task unqueued.
    pub async fn submit(&self, task: ConversionTask) -> Result<bool> {
        let Some(sender) = self.sender.lock().clone() else {
            return Err(PipelineError::Worker("worker pool is shut down".into()));
        };
        if !self.in_flight.lock().insert(task.original.clone()) {
            debug!(original = %task.original.display(), "already in flight");
            return Ok(false);
        }
        let mut claim = InFlightClaim {
            in_flight: &self.in_flight,
            original: Some(task.original.clone()),
        };
        if sender.send(task).await.is_err() {
            return Err(PipelineError::Worker("task channel closed".into()));
        }
        claim.original = None;
        self.status.accepted.fetch_add(1, Ordering::AcqRel);
        Ok(true)
    }

    pub fn status(&self) -> &PoolStatus {
        &self.status
    }
}

/// Releases an in-flight entry unless the task reached the channel.
struct InFlightClaim<'a> {
    in_flight: &'a Mutex<HashSet<PathBuf>>,
    original: Option<PathBuf>,
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        if let Some(original) = self.original.take() {
            self.in_flight.lock().remove(&original);
        }
    }
}

/// Fixed set of tokio workers draining one bounded task channel.
#[derive(Debug)]
pub struct WorkerPool {
    submitter: TaskSubmitter,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start(ctx: Arc<PipelineContext>, config: PoolConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let submitter = TaskSubmitter {
            sender: Arc::new(Mutex::new(Some(tx))),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            status: Arc::new(PoolStatus::default()),
        };

        let workers = (0..config.workers.max(1))
            .map(|id| {
                let ctx = Arc::clone(&ctx);
                let rx = Arc::clone(&rx);
                let in_flight = Arc::clone(&submitter.in_flight);
                let status = Arc::clone(&submitter.status);
                tokio::spawn(async move {
                    worker_loop(id, ctx, rx, in_flight, status).await;
                })
            })
            .collect::<Vec<_>>();

        info!(
            workers = workers.len(),
            capacity = config.capacity,
            "started conversion workers"
        );
        Self { submitter, workers }
    }

    pub fn submitter(&self) -> TaskSubmitter {
        self.submitter.clone()
    }

    pub fn status(&self) -> &PoolStatus {
        self.submitter.status()
    }

    /// Close the channel and wait for every queued task to finish.
    pub async fn shutdown(self) -> Result<()> {
        self.submitter.sender.lock().take();
        let mut failed = 0usize;
        for handle in self.workers {
            if let Err(err) = handle.await {
                error!("conversion worker aborted: {}", err);
                failed += 1;
            }
        }
        info!(
            completed = self.submitter.status.completed(),
            "worker pool drained"
        );
        if failed > 0 {
            return Err(PipelineError::Worker(format!(
                "{failed} worker(s) aborted"
            )));
        }
        Ok(())
    }
}

async fn worker_loop(
    id: usize,
    ctx: Arc<PipelineContext>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<ConversionTask>>>,
    in_flight: Arc<Mutex<HashSet<PathBuf>>>,
    status: Arc<PoolStatus>,
) {
    debug!(worker = id, "worker started");
    loop {
        let next = { rx.lock().await.recv().await };
        let Some(task) = next else {
            break;
        };
        debug!(worker = id, original = %task.original.display(), "processing");
        ctx.process(&task).await;
        in_flight.lock().remove(&task.original);
        status.completed.fetch_add(1, Ordering::AcqRel);
    }
    debug!(worker = id, "worker stopped");
}
