//! Filepipe Infrastructure Library
//!
//! Shared plumbing for the filepipe binary:
//! - Telemetry initialization (tracing subscriber)
//! - Request ID middleware
//! - The JSON error body returned by the HTTP API

pub mod error;
pub mod middleware;
pub mod telemetry;

// Re-export commonly used types
pub use error::ErrorResponse;
pub use middleware::{get_request_id, request_id_middleware, RequestId, REQUEST_ID_HEADER};
pub use telemetry::init_telemetry;
