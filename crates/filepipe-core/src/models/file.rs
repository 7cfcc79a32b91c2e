use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

/// Lifecycle status of an uploaded file.
///
/// `uploaded → processing → processed | failed`. The two last states are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "file_status", rename_all = "lowercase")
)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Uploaded,
    Processing,
    Processed,
    Failed,
}

impl FileStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, FileStatus::Processed | FileStatus::Failed)
    }

    /// Whether `self → next` is an edge of the state machine.
    pub fn can_transition_to(self, next: FileStatus) -> bool {
        matches!(
            (self, next),
            (FileStatus::Uploaded, FileStatus::Processing)
                | (FileStatus::Processing, FileStatus::Processed)
                | (FileStatus::Processing, FileStatus::Failed)
        )
    }
}

impl Display for FileStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FileStatus::Uploaded => write!(f, "uploaded"),
            FileStatus::Processing => write!(f, "processing"),
            FileStatus::Processed => write!(f, "processed"),
            FileStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Output of a successful processing run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessingResult {
    /// Lowercase hex SHA-256 of the full file content.
    pub fingerprint: String,
    pub size: u64,
    pub processed_at: DateTime<Utc>,
}

/// Why a processing run failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessingFailure {
    pub message: String,
    pub failed_at: DateTime<Utc>,
}

/// Result-or-error of a file. Only terminal records carry a non-pending outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    #[default]
    Pending,
    Processed(ProcessingResult),
    Failed(ProcessingFailure),
}

impl Outcome {
    pub fn result(&self) -> Option<&ProcessingResult> {
        match self {
            Outcome::Processed(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ProcessingFailure> {
        match self {
            Outcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Rebuild an outcome from the two nullable storage columns, checking it
    /// agrees with `status`.
    pub fn from_columns(
        status: FileStatus,
        result: Option<ProcessingResult>,
        error: Option<ProcessingFailure>,
    ) -> Result<Self, String> {
        match (status, result, error) {
            (FileStatus::Uploaded | FileStatus::Processing, None, None) => Ok(Outcome::Pending),
            (FileStatus::Processed, Some(result), None) => Ok(Outcome::Processed(result)),
            (FileStatus::Failed, None, Some(error)) => Ok(Outcome::Failed(error)),
            (status, result, error) => Err(format!(
                "status {} inconsistent with result present={} error present={}",
                status,
                result.is_some(),
                error.is_some()
            )),
        }
    }
}

/// A status write requested against the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Processing,
    Processed(ProcessingResult),
    Failed(ProcessingFailure),
}

impl StatusUpdate {
    pub fn target_status(&self) -> FileStatus {
        match self {
            StatusUpdate::Processing => FileStatus::Processing,
            StatusUpdate::Processed(_) => FileStatus::Processed,
            StatusUpdate::Failed(_) => FileStatus::Failed,
        }
    }

    pub fn into_outcome(self) -> Outcome {
        match self {
            StatusUpdate::Processing => Outcome::Pending,
            StatusUpdate::Processed(result) => Outcome::Processed(result),
            StatusUpdate::Failed(failure) => Outcome::Failed(failure),
        }
    }
}

/// Persisted file record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub original_filename: String,
    /// Opaque blob-store key of the file bytes.
    pub storage_location: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: FileStatus,
    pub outcome: Outcome,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    /// Apply `update` in place if it is a legal transition from the current status.
    ///
    /// Returns false and leaves the record untouched otherwise.
    pub fn apply(&mut self, update: StatusUpdate, now: DateTime<Utc>) -> bool {
        let next = update.target_status();
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.outcome = update.into_outcome();
        self.updated_at = now;
        true
    }
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for FileRecord {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::types::Json;
        use sqlx::Row;

        let status: FileStatus = row.try_get("status")?;
        let result = row
            .try_get::<Option<Json<ProcessingResult>>, _>("result")?
            .map(|r| r.0);
        let error = row
            .try_get::<Option<Json<ProcessingFailure>>, _>("error")?
            .map(|e| e.0);
        let outcome = Outcome::from_columns(status, result, error)
            .map_err(|e| sqlx::Error::Decode(format!("Corrupt file row: {}", e).into()))?;

        Ok(FileRecord {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            original_filename: row.try_get("original_filename")?,
            storage_location: row.try_get("storage_location")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            status,
            outcome,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Fields supplied by the upload boundary when a file is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFileRecord {
    pub owner_id: Uuid,
    pub original_filename: String,
    pub storage_location: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Response returned to the uploader once the file is accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadAccepted {
    pub id: Uuid,
    pub status: FileStatus,
}

/// Status projection returned to the polling client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileStatusResponse {
    pub id: Uuid,
    pub original_filename: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ProcessingResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProcessingFailure>,
    pub created_at: DateTime<Utc>,
}

impl From<FileRecord> for FileStatusResponse {
    fn from(record: FileRecord) -> Self {
        let (result, error) = match record.outcome {
            Outcome::Pending => (None, None),
            Outcome::Processed(result) => (Some(result), None),
            Outcome::Failed(failure) => (None, Some(failure)),
        };
        Self {
            id: record.id,
            original_filename: record.original_filename,
            title: record.title,
            description: record.description,
            status: record.status,
            result,
            error,
            created_at: record.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: FileStatus) -> FileRecord {
        let now = Utc::now();
        FileRecord {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            original_filename: "report.pdf".to_string(),
            storage_location: "files/report.pdf".to_string(),
            title: None,
            description: None,
            status,
            outcome: Outcome::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    fn result() -> ProcessingResult {
        ProcessingResult {
            fingerprint: "ab".repeat(32),
            size: 5,
            processed_at: Utc::now(),
        }
    }

    #[test]
    fn test_only_state_machine_edges_allowed() {
        use FileStatus::*;
        let all = [Uploaded, Processing, Processed, Failed];
        let allowed = [
            (Uploaded, Processing),
            (Processing, Processed),
            (Processing, Failed),
        ];
        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!FileStatus::Uploaded.is_terminal());
        assert!(!FileStatus::Processing.is_terminal());
        assert!(FileStatus::Processed.is_terminal());
        assert!(FileStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_display_matches_wire_name() {
        for status in [
            FileStatus::Uploaded,
            FileStatus::Processing,
            FileStatus::Processed,
            FileStatus::Failed,
        ] {
            let wire = serde_json::to_value(status).unwrap();
            assert_eq!(wire, status.to_string());
        }
    }

    #[test]
    fn test_apply_cannot_skip_processing() {
        let mut rec = record(FileStatus::Uploaded);
        assert!(!rec.apply(StatusUpdate::Processed(result()), Utc::now()));
        assert_eq!(rec.status, FileStatus::Uploaded);
        assert_eq!(rec.outcome, Outcome::Pending);
    }

    #[test]
    fn test_apply_terminal_is_final() {
        let mut rec = record(FileStatus::Uploaded);
        assert!(rec.apply(StatusUpdate::Processing, Utc::now()));
        assert!(rec.apply(StatusUpdate::Processed(result()), Utc::now()));

        let failure = ProcessingFailure {
            message: "boom".to_string(),
            failed_at: Utc::now(),
        };
        assert!(!rec.apply(StatusUpdate::Failed(failure), Utc::now()));
        assert!(!rec.apply(StatusUpdate::Processing, Utc::now()));
        assert_eq!(rec.status, FileStatus::Processed);
        assert!(rec.outcome.result().is_some());
        assert!(rec.outcome.error().is_none());
    }

    #[test]
    fn test_outcome_from_columns_rejects_mismatch() {
        let failure = ProcessingFailure {
            message: "boom".to_string(),
            failed_at: Utc::now(),
        };
        assert!(Outcome::from_columns(FileStatus::Processed, None, None).is_err());
        assert!(
            Outcome::from_columns(FileStatus::Failed, Some(result()), Some(failure.clone()))
                .is_err()
        );
        assert!(Outcome::from_columns(FileStatus::Uploaded, Some(result()), None).is_err());
        assert_eq!(
            Outcome::from_columns(FileStatus::Failed, None, Some(failure.clone())).unwrap(),
            Outcome::Failed(failure)
        );
    }

    #[test]
    fn test_status_response_projects_outcome() {
        let mut rec = record(FileStatus::Processing);
        rec.status = FileStatus::Failed;
        rec.outcome = Outcome::Failed(ProcessingFailure {
            message: "File not found".to_string(),
            failed_at: Utc::now(),
        });

        let response = FileStatusResponse::from(rec);
        assert_eq!(response.status, FileStatus::Failed);
        assert!(response.result.is_none());
        assert_eq!(response.error.unwrap().message, "File not found");
    }

    #[test]
    fn test_status_response_omits_absent_fields() {
        let response = FileStatusResponse::from(record(FileStatus::Uploaded));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "uploaded");
        assert!(json.get("result").is_none());
        assert!(json.get("error").is_none());
    }
}
