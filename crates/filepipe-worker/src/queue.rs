//! Job queue contract: at-least-once delivery under a lease.
//!
//! A delivered job stays invisible to other consumers until its lease
//! (`visibility_timeout`) runs out. The holder settles it with [`JobQueue::ack`]
//! or [`JobQueue::nack`]; both are fenced by the delivery's lease token, so a
//! worker whose lease expired and was re-granted to someone else cannot settle
//! the job a second time.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

/// Maximum delay in seconds before a nacked job becomes deliverable again.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Backoff in seconds after the given attempt number (exponential with cap).
#[inline]
pub fn compute_retry_backoff_seconds(attempt: i32) -> u64 {
    2_u64
        .saturating_pow(attempt.max(0) as u32)
        .min(MAX_RETRY_BACKOFF_SECS)
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The broker could not be reached or refused the operation.
    #[error("Job queue unavailable: {0}")]
    Unavailable(String),

    /// The delivery's lease expired and the job was handed to another consumer
    /// (or already settled).
    #[error("Lease on job {job_id} was lost")]
    LostLease { job_id: Uuid },
}

/// Queue tuning shared by all implementations.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// How long a delivery stays invisible to other consumers.
    pub visibility_timeout: Duration,
    /// Deliveries before a failing job is moved to `dead`.
    pub max_attempts: i32,
    /// Multiplied by [`compute_retry_backoff_seconds`] to get the nack delay.
    pub retry_delay_unit: Duration,
}

impl QueueConfig {
    pub fn retry_delay(&self, attempt: i32) -> Duration {
        self.retry_delay_unit
            .saturating_mul(compute_retry_backoff_seconds(attempt) as u32)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(300),
            max_attempts: 3,
            retry_delay_unit: Duration::from_secs(1),
        }
    }
}

/// Result of [`JobQueue::enqueue_unique`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Created(Uuid),
    /// A pending or running job with the same key already exists.
    Existing(Uuid),
}

impl Enqueued {
    pub fn job_id(&self) -> Uuid {
        match self {
            Enqueued::Created(id) | Enqueued::Existing(id) => *id,
        }
    }
}

/// One delivery of a job to a consumer.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub job_id: Uuid,
    pub name: String,
    pub payload: serde_json::Value,
    /// 1 on first delivery, incremented on every redelivery.
    pub attempt: i32,
    pub lease_token: Uuid,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Durably accept a job. Returns the job id.
    async fn enqueue(&self, name: &str, payload: serde_json::Value) -> Result<Uuid, QueueError>;

    /// Like [`enqueue`](Self::enqueue), but at most one job per `(name, key)`
    /// is open (pending or running) at a time. Once that job completes or
    /// dies the key is free again.
    async fn enqueue_unique(
        &self,
        name: &str,
        key: &str,
        payload: serde_json::Value,
    ) -> Result<Enqueued, QueueError>;

    /// Claim the next deliverable job named `name`, if any.
    async fn dequeue(&self, name: &str) -> Result<Option<Delivery>, QueueError>;

    /// Settle a delivery as done. The job is never delivered again.
    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Settle a delivery as failed; the queue decides whether to redeliver.
    async fn nack(&self, delivery: &Delivery, error: &str) -> Result<(), QueueError>;

    /// Notified when new work may be available.
    fn wake_handle(&self) -> Arc<Notify>;
}
