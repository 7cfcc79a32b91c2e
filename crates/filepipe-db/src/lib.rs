//! Filepipe Database Layer
//!
//! The record store contract (`RecordStore`) with a Postgres implementation
//! (`FileRepository`) and an in-memory one (`InMemoryRecordStore`), plus the
//! Postgres `jobs` table repository backing the durable job queue.

pub mod file;
pub mod job;
pub mod memory;
pub mod store;

pub use file::FileRepository;
pub use job::{JobRepository, QueuedJob, JOB_NOTIFY_CHANNEL};
pub use memory::InMemoryRecordStore;
pub use store::{RecordStore, StoreError, WriteOutcome};
