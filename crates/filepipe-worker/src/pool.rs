//! Worker pool: N independent loops pulling from one queue.
//!
//! Each loop handles one job at a time. Loops wake on the queue's notifier or
//! every `poll_interval`, then drain the queue before sleeping again.
//!
//! Shutdown: [`WorkerPool::shutdown`] stops loops from claiming new jobs; a job
//! already being handled runs to completion. [`WorkerPool::join`] waits for that.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::queue::JobQueue;
use crate::worker::{FileWorker, JobOutcome};

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub concurrency: usize,
    pub poll_interval: Duration,
    pub job_name: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            poll_interval: Duration::from_millis(1000),
            job_name: filepipe_core::models::PROCESS_FILE_JOB.to_string(),
        }
    }
}

pub struct WorkerPool {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start(
        worker: Arc<FileWorker>,
        queue: Arc<dyn JobQueue>,
        config: WorkerPoolConfig,
    ) -> Self {
        tracing::info!(
            concurrency = config.concurrency,
            poll_interval_ms = config.poll_interval.as_millis() as u64,
            job_name = %config.job_name,
            "Worker pool started"
        );

        let shutdown = CancellationToken::new();
        let handles = (0..config.concurrency)
            .map(|index| {
                tokio::spawn(worker_loop(
                    index,
                    worker.clone(),
                    queue.clone(),
                    config.clone(),
                    shutdown.clone(),
                ))
            })
            .collect();

        Self { shutdown, handles }
    }

    /// Signal all loops to stop claiming jobs. Returns immediately.
    pub fn shutdown(&self) {
        tracing::info!("Initiating worker pool shutdown");
        self.shutdown.cancel();
    }

    /// Wait for every loop to exit. Call after [`shutdown`](Self::shutdown).
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Worker loop panicked");
            }
        }
        tracing::info!("Worker pool stopped");
    }
}

async fn worker_loop(
    index: usize,
    worker: Arc<FileWorker>,
    queue: Arc<dyn JobQueue>,
    config: WorkerPoolConfig,
    shutdown: CancellationToken,
) {
    let wake = queue.wake_handle();
    tracing::debug!(worker = index, "Worker loop started");

    loop {
        drain(index, &worker, queue.as_ref(), &config.job_name, &shutdown).await;

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = wake.notified() => {}
            _ = tokio::time::sleep(config.poll_interval) => {}
        }
    }

    tracing::debug!(worker = index, "Worker loop stopped");
}

/// Handle jobs until the queue has nothing deliverable.
async fn drain(
    index: usize,
    worker: &FileWorker,
    queue: &dyn JobQueue,
    job_name: &str,
    shutdown: &CancellationToken,
) {
    while !shutdown.is_cancelled() {
        let delivery = match queue.dequeue(job_name).await {
            Ok(Some(delivery)) => delivery,
            Ok(None) => {
                tracing::trace!(worker = index, "No jobs available in queue");
                return;
            }
            Err(e) => {
                tracing::error!(worker = index, error = %e, "Failed to claim job from queue");
                return;
            }
        };

        match worker.handle(&delivery).await {
            JobOutcome::Processed(_) => {
                tracing::debug!(worker = index, job_id = %delivery.job_id, "Job processed");
            }
            JobOutcome::Failed(message) => {
                tracing::warn!(worker = index, job_id = %delivery.job_id, error = %message, "Job failed");
            }
            JobOutcome::Skipped(reason) => {
                tracing::debug!(worker = index, job_id = %delivery.job_id, reason = %reason, "Job skipped");
            }
            JobOutcome::Retry(message) => {
                tracing::warn!(worker = index, job_id = %delivery.job_id, error = %message, "Job released for retry");
            }
        }
    }
}
