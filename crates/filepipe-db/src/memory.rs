//! In-memory record store
//!
//! Same contract as [`FileRepository`](crate::FileRepository); the conditional
//! write is checked and applied under a single lock.

use async_trait::async_trait;
use chrono::Utc;
use filepipe_core::models::{FileRecord, FileStatus, NewFileRecord, Outcome, StatusUpdate};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::store::{check_transition, RecordStore, StoreError, WriteOutcome};

#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<Mutex<HashMap<Uuid, FileRecord>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Snapshot of every stored record.
    pub async fn all(&self) -> Vec<FileRecord> {
        self.records.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create(&self, new: NewFileRecord) -> Result<FileRecord, StoreError> {
        let now = Utc::now();
        let record = FileRecord {
            id: Uuid::new_v4(),
            owner_id: new.owner_id,
            original_filename: new.original_filename,
            storage_location: new.storage_location,
            title: new.title,
            description: new.description,
            status: FileStatus::Uploaded,
            outcome: Outcome::Pending,
            created_at: now,
            updated_at: now,
        };
        self.records.lock().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, StoreError> {
        Ok(self.records.lock().await.get(&id).cloned())
    }

    async fn find_for_owner(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<FileRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .await
            .get(&id)
            .filter(|r| r.owner_id == owner_id)
            .cloned())
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: &[FileStatus],
        update: StatusUpdate,
    ) -> Result<WriteOutcome, StoreError> {
        check_transition(expected, &update)?;

        let mut records = self.records.lock().await;
        let Some(record) = records.get_mut(&id) else {
            return Ok(WriteOutcome::Rejected { current: None });
        };
        if !expected.contains(&record.status) {
            return Ok(WriteOutcome::Rejected {
                current: Some(record.status),
            });
        }
        if !record.apply(update, Utc::now()) {
            return Ok(WriteOutcome::Rejected {
                current: Some(record.status),
            });
        }
        Ok(WriteOutcome::Applied(record.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filepipe_core::models::{ProcessingFailure, ProcessingResult};

    fn new_record(owner_id: Uuid) -> NewFileRecord {
        NewFileRecord {
            owner_id,
            original_filename: "hello.txt".to_string(),
            storage_location: "files/hello.txt".to_string(),
            title: Some("Hello".to_string()),
            description: None,
        }
    }

    fn processed() -> StatusUpdate {
        StatusUpdate::Processed(ProcessingResult {
            fingerprint: "ab".repeat(32),
            size: 5,
            processed_at: Utc::now(),
        })
    }

    fn failed() -> StatusUpdate {
        StatusUpdate::Failed(ProcessingFailure {
            message: "File not found".to_string(),
            failed_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_create_starts_uploaded() {
        let store = InMemoryRecordStore::new();
        let record = store.create(new_record(Uuid::new_v4())).await.unwrap();

        assert_eq!(record.status, FileStatus::Uploaded);
        assert_eq!(record.outcome, Outcome::Pending);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_find_for_owner_hides_foreign_records() {
        let store = InMemoryRecordStore::new();
        let owner = Uuid::new_v4();
        let record = store.create(new_record(owner)).await.unwrap();

        assert!(store
            .find_for_owner(record.id, owner)
            .await
            .unwrap()
            .is_some());
        assert!(store
            .find_for_owner(record.id, Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
        assert!(store.find_by_id(record.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_conditional_write_applies_once() {
        let store = InMemoryRecordStore::new();
        let record = store.create(new_record(Uuid::new_v4())).await.unwrap();

        let first = store
            .update_status(record.id, &[FileStatus::Uploaded], StatusUpdate::Processing)
            .await
            .unwrap();
        assert!(first.is_applied());

        let second = store
            .update_status(record.id, &[FileStatus::Uploaded], StatusUpdate::Processing)
            .await
            .unwrap();
        assert_eq!(
            second,
            WriteOutcome::Rejected {
                current: Some(FileStatus::Processing)
            }
        );
    }

    #[tokio::test]
    async fn test_terminal_write_cannot_be_overwritten() {
        let store = InMemoryRecordStore::new();
        let record = store.create(new_record(Uuid::new_v4())).await.unwrap();
        store
            .update_status(record.id, &[FileStatus::Uploaded], StatusUpdate::Processing)
            .await
            .unwrap();

        let done = store
            .update_status(record.id, &[FileStatus::Processing], processed())
            .await
            .unwrap();
        assert!(done.is_applied());

        let late = store
            .update_status(record.id, &[FileStatus::Processing], failed())
            .await
            .unwrap();
        assert_eq!(
            late,
            WriteOutcome::Rejected {
                current: Some(FileStatus::Processed)
            }
        );

        let stored = store.find_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, FileStatus::Processed);
        assert!(stored.outcome.result().is_some());
        assert!(stored.outcome.error().is_none());
    }

    #[tokio::test]
    async fn test_illegal_transition_is_an_error() {
        let store = InMemoryRecordStore::new();
        let record = store.create(new_record(Uuid::new_v4())).await.unwrap();

        let err = store
            .update_status(record.id, &[FileStatus::Uploaded], processed())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        let stored = store.find_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, FileStatus::Uploaded);
    }

    #[tokio::test]
    async fn test_missing_record_is_rejected() {
        let store = InMemoryRecordStore::new();
        let outcome = store
            .update_status(Uuid::new_v4(), &[FileStatus::Uploaded], StatusUpdate::Processing)
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Rejected { current: None });
    }

    #[tokio::test]
    async fn test_concurrent_terminal_writes_single_winner() {
        let store = InMemoryRecordStore::new();
        let record = store.create(new_record(Uuid::new_v4())).await.unwrap();
        store
            .update_status(record.id, &[FileStatus::Uploaded], StatusUpdate::Processing)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            let id = record.id;
            handles.push(tokio::spawn(async move {
                let update = if i % 2 == 0 { processed() } else { failed() };
                store
                    .update_status(id, &[FileStatus::Processing], update)
                    .await
                    .unwrap()
                    .is_applied()
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if handle.await.unwrap() {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
    }
}
