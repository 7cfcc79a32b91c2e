//! Data models for the application
//!
//! `file` holds the file record and its status state machine, `job` the
//! message that asks a worker to process one file.

mod file;
mod job;

pub use file::*;
pub use job::*;
