//! Record store contract
//!
//! Every status write is conditional: the caller names the statuses the record
//! may currently be in, and the write only lands if that still holds. This is
//! what keeps redelivered jobs from producing duplicate terminal writes.

use async_trait::async_trait;
use filepipe_core::models::{FileRecord, FileStatus, NewFileRecord, StatusUpdate};
use filepipe_core::AppError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested write is not an edge of the status state machine.
    #[error("invalid status transition from {from:?} to {to}")]
    InvalidTransition {
        from: Vec<FileStatus>,
        to: FileStatus,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            e @ StoreError::InvalidTransition { .. } => AppError::Conflict(e.to_string()),
            StoreError::Database(e) => AppError::store("Database operation failed", e),
            StoreError::Other(e) => AppError::store("Record store operation failed", e),
        }
    }
}

/// Result of a conditional status write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write landed; the record as it is now.
    Applied(FileRecord),
    /// The precondition did not hold and nothing changed. `current` is `None`
    /// when the record does not exist.
    Rejected { current: Option<FileStatus> },
}

impl WriteOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, WriteOutcome::Applied(_))
    }
}

/// Durable storage of file records, keyed by id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new record in `uploaded` with no outcome.
    async fn create(&self, new: NewFileRecord) -> Result<FileRecord, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, StoreError>;

    /// Lookup scoped to an owner. A record owned by someone else is `None`.
    async fn find_for_owner(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<FileRecord>, StoreError>;

    /// Apply `update` only if the record's status is one of `expected`.
    async fn update_status(
        &self,
        id: Uuid,
        expected: &[FileStatus],
        update: StatusUpdate,
    ) -> Result<WriteOutcome, StoreError>;
}

/// Refuse writes that could never be legal, whatever the stored status is.
pub(crate) fn check_transition(
    expected: &[FileStatus],
    update: &StatusUpdate,
) -> Result<(), StoreError> {
    let to = update.target_status();
    if expected.is_empty() || expected.iter().any(|from| !from.can_transition_to(to)) {
        return Err(StoreError::InvalidTransition {
            from: expected.to_vec(),
            to,
        });
    }
    Ok(())
}
