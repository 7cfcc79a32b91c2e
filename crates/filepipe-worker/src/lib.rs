//! Filepipe Worker
//!
//! The durable job queue contract and its implementations, the fingerprint
//! processor, the per-delivery state machine (`FileWorker`) and the pool of
//! worker loops that drives it.

pub mod memory;
pub mod pg_queue;
pub mod pool;
pub mod processor;
pub mod queue;
pub mod worker;

pub use memory::InMemoryJobQueue;
pub use pg_queue::PgJobQueue;
pub use pool::{WorkerPool, WorkerPoolConfig};
pub use processor::{fingerprint, ProcessingError};
pub use queue::{
    compute_retry_backoff_seconds, Delivery, Enqueued, JobQueue, QueueConfig, QueueError,
    MAX_RETRY_BACKOFF_SECS,
};
pub use worker::{FileWorker, JobOutcome, SkipReason};
