//! Filepipe Services Layer
//!
//! Orchestration between the record store and the job queue: the `Producer`
//! turns an accepted upload into a record plus exactly one processing job, and
//! the `StatusReader` serves owner-scoped status lookups. HTTP handling stays
//! in filepipe-api.

pub mod error;
pub mod producer;
pub mod status;

pub use error::{ProducerError, StatusError};
pub use producer::{
    Producer, MAX_DESCRIPTION_LENGTH, MAX_FILENAME_LENGTH, MAX_TITLE_LENGTH,
};
pub use status::StatusReader;
