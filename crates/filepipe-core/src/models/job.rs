use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Queue that carries file processing jobs.
pub const FILE_PROCESSING_QUEUE: &str = "file-processing";

/// Job name for "fingerprint this uploaded file".
pub const PROCESS_FILE_JOB: &str = "process-file";

/// Payload of a [`PROCESS_FILE_JOB`] job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessFileJob {
    pub file_id: Uuid,
    pub storage_location: String,
}

impl ProcessFileJob {
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(payload.clone())
    }
}

/// Queue-side state of a job row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "job_status", rename_all = "lowercase")
)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    /// Out of attempts; kept for inspection, never delivered again.
    Dead,
}
