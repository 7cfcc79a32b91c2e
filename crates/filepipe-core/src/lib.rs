//! Filepipe Core Library
//!
//! Domain models, error types and configuration shared by every filepipe crate:
//! the file record and its status state machine, the processing job payload,
//! the HTTP-facing `AppError`, and environment-driven `Config`.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{Config, LogFormat};
pub use error::{AppError, ErrorMetadata, LogLevel};
