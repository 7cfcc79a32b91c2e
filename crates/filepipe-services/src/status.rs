use filepipe_core::models::FileStatusResponse;
use filepipe_db::RecordStore;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::StatusError;

/// Owner-scoped, read-only view of file records.
#[derive(Clone)]
pub struct StatusReader {
    store: Arc<dyn RecordStore>,
}

impl StatusReader {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// A record owned by someone else is reported exactly like a missing one.
    #[tracing::instrument(skip(self))]
    pub async fn get(
        &self,
        file_id: Uuid,
        owner_id: Uuid,
    ) -> Result<FileStatusResponse, StatusError> {
        self.store
            .find_for_owner(file_id, owner_id)
            .await?
            .map(FileStatusResponse::from)
            .ok_or(StatusError::NotFound(file_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use filepipe_core::models::{
        FileStatus, NewFileRecord, ProcessingResult, StatusUpdate,
    };
    use filepipe_db::InMemoryRecordStore;

    async fn seeded(owner_id: Uuid) -> (InMemoryRecordStore, Uuid) {
        let store = InMemoryRecordStore::new();
        let record = store
            .create(NewFileRecord {
                owner_id,
                original_filename: "hello.txt".to_string(),
                storage_location: "files/x/hello.txt".to_string(),
                title: None,
                description: Some("A greeting".to_string()),
            })
            .await
            .unwrap();
        (store, record.id)
    }

    #[tokio::test]
    async fn test_owner_sees_projection() {
        let owner_id = Uuid::new_v4();
        let (store, id) = seeded(owner_id).await;
        let reader = StatusReader::new(Arc::new(store));

        let view = reader.get(id, owner_id).await.unwrap();
        assert_eq!(view.id, id);
        assert_eq!(view.status, FileStatus::Uploaded);
        assert_eq!(view.description.as_deref(), Some("A greeting"));
        assert!(view.result.is_none());
        assert!(view.error.is_none());
    }

    #[tokio::test]
    async fn test_foreign_owner_gets_not_found() {
        let (store, id) = seeded(Uuid::new_v4()).await;
        let reader = StatusReader::new(Arc::new(store));

        let err = reader.get(id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StatusError::NotFound(missing) if missing == id));
    }

    #[tokio::test]
    async fn test_processed_result_is_projected() {
        let owner_id = Uuid::new_v4();
        let (store, id) = seeded(owner_id).await;
        store
            .update_status(id, &[FileStatus::Uploaded], StatusUpdate::Processing)
            .await
            .unwrap();
        store
            .update_status(
                id,
                &[FileStatus::Processing],
                StatusUpdate::Processed(ProcessingResult {
                    fingerprint: "ab".repeat(32),
                    size: 5,
                    processed_at: Utc::now(),
                }),
            )
            .await
            .unwrap();

        let view = StatusReader::new(Arc::new(store))
            .get(id, owner_id)
            .await
            .unwrap();
        assert_eq!(view.status, FileStatus::Processed);
        assert_eq!(view.result.unwrap().size, 5);
        assert!(view.error.is_none());
    }
}
