//! Postgres-backed job queue over the `jobs` table.

use async_trait::async_trait;
use filepipe_core::models::JobStatus;
use filepipe_db::{JobRepository, QueuedJob, JOB_NOTIFY_CHANNEL};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::queue::{Delivery, Enqueued, JobQueue, QueueConfig, QueueError};

#[derive(Clone)]
pub struct PgJobQueue {
    repository: JobRepository,
    queue: String,
    config: QueueConfig,
    notify: Arc<Notify>,
}

impl PgJobQueue {
    pub fn new(repository: JobRepository, queue: impl Into<String>, config: QueueConfig) -> Self {
        Self {
            repository,
            queue: queue.into(),
            config,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Spawn a LISTEN loop that wakes consumers when a job is enqueued on this
    /// queue, from this process or any other.
    ///
    /// Reconnects on failure; consumers still poll, so a dropped listener only
    /// adds latency.
    pub fn spawn_listener(&self) -> JoinHandle<()> {
        let pool = self.repository.pool().clone();
        let notify = self.notify.clone();
        let queue = self.queue.clone();

        tokio::spawn(async move {
            loop {
                match sqlx::postgres::PgListener::connect_with(&pool).await {
                    Ok(mut listener) => {
                        if let Err(e) = listener.listen(JOB_NOTIFY_CHANNEL).await {
                            tracing::warn!(error = %e, "LISTEN failed, will retry");
                            tokio::time::sleep(Duration::from_secs(5)).await;
                            continue;
                        }
                        tracing::debug!(channel = JOB_NOTIFY_CHANNEL, "Listening for new jobs");
                        while let Ok(notification) = listener.recv().await {
                            if notification.payload() == queue {
                                notify.notify_one();
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "PgListener connect failed, will retry");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        })
    }

    fn to_delivery(job: QueuedJob) -> Result<Delivery, QueueError> {
        let lease_token = job.lease_token.ok_or_else(|| {
            QueueError::Unavailable(format!("claimed job {} has no lease token", job.id))
        })?;
        Ok(Delivery {
            job_id: job.id,
            name: job.name,
            payload: job.payload,
            attempt: job.attempts,
            lease_token,
        })
    }
}

fn unavailable(e: anyhow::Error) -> QueueError {
    QueueError::Unavailable(format!("{:#}", e))
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(&self, name: &str, payload: serde_json::Value) -> Result<Uuid, QueueError> {
        let job = self
            .repository
            .enqueue(&self.queue, name, None, payload, self.config.max_attempts)
            .await
            .map_err(unavailable)?
            .ok_or_else(|| QueueError::Unavailable("job insert returned no row".to_string()))?;
        Ok(job.id)
    }

    async fn enqueue_unique(
        &self,
        name: &str,
        key: &str,
        payload: serde_json::Value,
    ) -> Result<Enqueued, QueueError> {
        let inserted = self
            .repository
            .enqueue(&self.queue, name, Some(key), payload, self.config.max_attempts)
            .await
            .map_err(unavailable)?;
        if let Some(job) = inserted {
            return Ok(Enqueued::Created(job.id));
        }

        // The conflicting job may have settled since the insert.
        self.repository
            .find_open_by_key(&self.queue, name, key)
            .await
            .map_err(unavailable)?
            .map(|job| Enqueued::Existing(job.id))
            .ok_or_else(|| {
                QueueError::Unavailable(format!("open job for key {} settled during enqueue", key))
            })
    }

    async fn dequeue(&self, name: &str) -> Result<Option<Delivery>, QueueError> {
        self.repository
            .claim_next(&self.queue, name, self.config.visibility_timeout)
            .await
            .map_err(unavailable)?
            .map(Self::to_delivery)
            .transpose()
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let completed = self
            .repository
            .complete(delivery.job_id, delivery.lease_token)
            .await
            .map_err(unavailable)?;
        if !completed {
            return Err(QueueError::LostLease {
                job_id: delivery.job_id,
            });
        }
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery, error: &str) -> Result<(), QueueError> {
        let retry_after = self.config.retry_delay(delivery.attempt);
        let status = self
            .repository
            .fail(delivery.job_id, delivery.lease_token, error, retry_after)
            .await
            .map_err(unavailable)?;

        match status {
            None => Err(QueueError::LostLease {
                job_id: delivery.job_id,
            }),
            Some(JobStatus::Dead) => {
                tracing::warn!(
                    job_id = %delivery.job_id,
                    attempts = delivery.attempt,
                    "Job moved to dead letter"
                );
                Ok(())
            }
            Some(_) => {
                tracing::info!(
                    job_id = %delivery.job_id,
                    attempt = delivery.attempt,
                    retry_after_secs = retry_after.as_secs(),
                    "Job scheduled for retry"
                );
                Ok(())
            }
        }
    }

    fn wake_handle(&self) -> Arc<Notify> {
        self.notify.clone()
    }
}
