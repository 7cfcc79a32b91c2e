//! In-process job queue with the same lease semantics as [`PgJobQueue`](crate::PgJobQueue).

use async_trait::async_trait;
use filepipe_core::models::JobStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use uuid::Uuid;

use crate::queue::{Delivery, Enqueued, JobQueue, QueueConfig, QueueError};

#[derive(Debug, Clone)]
struct StoredJob {
    id: Uuid,
    name: String,
    unique_key: Option<String>,
    payload: serde_json::Value,
    status: JobStatus,
    attempts: i32,
    run_at: Instant,
    locked_until: Option<Instant>,
    lease_token: Option<Uuid>,
    last_error: Option<String>,
}

impl StoredJob {
    fn holds(&self, delivery: &Delivery) -> bool {
        self.status == JobStatus::Running && self.lease_token == Some(delivery.lease_token)
    }

    fn is_open(&self) -> bool {
        matches!(self.status, JobStatus::Pending | JobStatus::Running)
    }
}

#[derive(Clone)]
pub struct InMemoryJobQueue {
    jobs: Arc<Mutex<Vec<StoredJob>>>,
    config: QueueConfig,
    notify: Arc<Notify>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryJobQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(Vec::new())),
            config,
            notify: Arc::new(Notify::new()),
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every subsequent `enqueue` fail as if the broker were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }

    pub async fn status(&self, job_id: Uuid) -> Option<JobStatus> {
        self.jobs
            .lock()
            .await
            .iter()
            .find(|j| j.id == job_id)
            .map(|j| j.status)
    }

    pub async fn last_error(&self, job_id: Uuid) -> Option<String> {
        self.jobs
            .lock()
            .await
            .iter()
            .find(|j| j.id == job_id)
            .and_then(|j| j.last_error.clone())
    }

    /// Payloads of every job that has not completed or died.
    pub async fn open_payloads(&self, name: &str) -> Vec<serde_json::Value> {
        self.jobs
            .lock()
            .await
            .iter()
            .filter(|j| j.name == name && j.is_open())
            .map(|j| j.payload.clone())
            .collect()
    }
}

impl InMemoryJobQueue {
    async fn push(
        &self,
        name: &str,
        unique_key: Option<&str>,
        payload: serde_json::Value,
    ) -> Result<Enqueued, QueueError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(QueueError::Unavailable(
                "in-memory queue marked unavailable".to_string(),
            ));
        }

        let mut jobs = self.jobs.lock().await;
        if let Some(key) = unique_key {
            let existing = jobs.iter().find(|j| {
                j.name == name && j.unique_key.as_deref() == Some(key) && j.is_open()
            });
            if let Some(job) = existing {
                tracing::debug!(job_id = %job.id, key = %key, "Open job already exists");
                return Ok(Enqueued::Existing(job.id));
            }
        }

        let id = Uuid::new_v4();
        jobs.push(StoredJob {
            id,
            name: name.to_string(),
            unique_key: unique_key.map(str::to_string),
            payload,
            status: JobStatus::Pending,
            attempts: 0,
            run_at: Instant::now(),
            locked_until: None,
            lease_token: None,
            last_error: None,
        });
        drop(jobs);
        self.notify.notify_one();

        tracing::debug!(job_id = %id, name = %name, "Job enqueued");
        Ok(Enqueued::Created(id))
    }
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, name: &str, payload: serde_json::Value) -> Result<Uuid, QueueError> {
        self.push(name, None, payload).await.map(|e| e.job_id())
    }

    async fn enqueue_unique(
        &self,
        name: &str,
        key: &str,
        payload: serde_json::Value,
    ) -> Result<Enqueued, QueueError> {
        self.push(name, Some(key), payload).await
    }

    async fn dequeue(&self, name: &str) -> Result<Option<Delivery>, QueueError> {
        let now = Instant::now();
        let mut jobs = self.jobs.lock().await;

        for job in jobs.iter_mut() {
            let expired = job.status == JobStatus::Running
                && job.locked_until.is_some_and(|until| until <= now);
            if expired && job.attempts >= self.config.max_attempts {
                tracing::warn!(job_id = %job.id, "Job lease expired on final attempt");
                job.status = JobStatus::Dead;
                job.lease_token = None;
                job.locked_until = None;
                if job.last_error.is_none() {
                    job.last_error = Some("lease expired on final attempt".to_string());
                }
            }
        }

        let next = jobs
            .iter_mut()
            .filter(|j| j.name == name)
            .filter(|j| match j.status {
                JobStatus::Pending => j.run_at <= now,
                JobStatus::Running => j.locked_until.is_some_and(|until| until <= now),
                JobStatus::Completed | JobStatus::Dead => false,
            })
            .min_by_key(|j| j.run_at);

        let Some(job) = next else {
            return Ok(None);
        };

        let lease_token = Uuid::new_v4();
        job.status = JobStatus::Running;
        job.attempts += 1;
        job.lease_token = Some(lease_token);
        job.locked_until = Some(now + self.config.visibility_timeout);

        Ok(Some(Delivery {
            job_id: job.id,
            name: job.name.clone(),
            payload: job.payload.clone(),
            attempt: job.attempts,
            lease_token,
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .iter_mut()
            .find(|j| j.id == delivery.job_id)
            .filter(|j| j.holds(delivery))
            .ok_or(QueueError::LostLease {
                job_id: delivery.job_id,
            })?;

        job.status = JobStatus::Completed;
        job.lease_token = None;
        job.locked_until = None;
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery, error: &str) -> Result<(), QueueError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .iter_mut()
            .find(|j| j.id == delivery.job_id)
            .filter(|j| j.holds(delivery))
            .ok_or(QueueError::LostLease {
                job_id: delivery.job_id,
            })?;

        job.lease_token = None;
        job.locked_until = None;
        job.last_error = Some(error.to_string());
        if job.attempts >= self.config.max_attempts {
            job.status = JobStatus::Dead;
            tracing::warn!(job_id = %job.id, attempts = job.attempts, "Job moved to dead letter");
        } else {
            job.status = JobStatus::Pending;
            job.run_at = Instant::now() + self.config.retry_delay(job.attempts);
            self.notify.notify_one();
        }
        Ok(())
    }

    fn wake_handle(&self) -> Arc<Notify> {
        self.notify.clone()
    }
}
