//! Filepipe API Library
//!
//! HTTP surface of the pipeline: multipart upload, status polling and
//! resubmission behind bearer-JWT auth, plus application setup.

pub mod auth;
pub mod constants;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;

pub use error::HttpAppError;
pub use state::AppState;
