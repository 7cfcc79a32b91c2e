//! Upload acceptance: one record, then one job.
//!
//! The job is enqueued only after the record is committed. If the enqueue
//! fails, the record stays `uploaded` and the caller gets
//! [`ProducerError::Queue`]; [`Producer::resubmit`] is the way back.
//! Jobs are keyed by file id, so a record never has two jobs in flight.

use filepipe_core::models::{
    FileStatus, NewFileRecord, ProcessFileJob, UploadAccepted, PROCESS_FILE_JOB,
};
use filepipe_db::RecordStore;
use filepipe_worker::{Enqueued, JobQueue};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ProducerError;

pub const MAX_FILENAME_LENGTH: usize = 255;
pub const MAX_TITLE_LENGTH: usize = 255;
pub const MAX_DESCRIPTION_LENGTH: usize = 10_000;

#[derive(Clone)]
pub struct Producer {
    store: Arc<dyn RecordStore>,
    queue: Arc<dyn JobQueue>,
}

impl Producer {
    pub fn new(store: Arc<dyn RecordStore>, queue: Arc<dyn JobQueue>) -> Self {
        Self { store, queue }
    }

    #[tracing::instrument(skip(self, new), fields(owner_id = %new.owner_id))]
    pub async fn submit(&self, new: NewFileRecord) -> Result<UploadAccepted, ProducerError> {
        validate(&new)?;

        let record = self.store.create(new).await?;
        tracing::info!(
            file_id = %record.id,
            owner_id = %record.owner_id,
            filename = %record.original_filename,
            "File accepted"
        );

        self.enqueue(record.id, &record.storage_location).await?;

        Ok(UploadAccepted {
            id: record.id,
            status: record.status,
        })
    }

    /// Enqueue a fresh job for a record that is still `uploaded` and has no
    /// job in flight.
    #[tracing::instrument(skip(self))]
    pub async fn resubmit(
        &self,
        file_id: Uuid,
        owner_id: Uuid,
    ) -> Result<UploadAccepted, ProducerError> {
        let record = self
            .store
            .find_for_owner(file_id, owner_id)
            .await?
            .ok_or(ProducerError::NotFound(file_id))?;

        if record.status != FileStatus::Uploaded {
            return Err(ProducerError::Conflict {
                file_id,
                status: record.status,
            });
        }

        let enqueued = self.enqueue(record.id, &record.storage_location).await?;
        if let Enqueued::Existing(job_id) = enqueued {
            tracing::info!(
                file_id = %file_id,
                job_id = %job_id,
                "Resubmit refused, job already in flight"
            );
            return Err(ProducerError::AlreadyQueued { file_id, job_id });
        }
        tracing::info!(file_id = %file_id, "File resubmitted for processing");

        Ok(UploadAccepted {
            id: record.id,
            status: record.status,
        })
    }

    async fn enqueue(
        &self,
        file_id: Uuid,
        storage_location: &str,
    ) -> Result<Enqueued, ProducerError> {
        let job = ProcessFileJob {
            file_id,
            storage_location: storage_location.to_string(),
        };

        let result = self
            .queue
            .enqueue_unique(PROCESS_FILE_JOB, &file_id.to_string(), job.to_payload())
            .await;
        match result {
            Ok(enqueued) => {
                tracing::debug!(
                    file_id = %file_id,
                    job_id = %enqueued.job_id(),
                    "Processing job enqueued"
                );
                Ok(enqueued)
            }
            Err(source) => {
                tracing::error!(
                    file_id = %file_id,
                    error = %source,
                    "File stored but job not enqueued; resubmission required"
                );
                Err(ProducerError::Queue { file_id, source })
            }
        }
    }
}

fn validate(new: &NewFileRecord) -> Result<(), ProducerError> {
    let filename = new.original_filename.trim();
    if filename.is_empty() {
        return Err(ProducerError::Validation(
            "Filename must not be empty".to_string(),
        ));
    }
    if filename.chars().count() > MAX_FILENAME_LENGTH {
        return Err(ProducerError::Validation(format!(
            "Filename must be at most {} characters",
            MAX_FILENAME_LENGTH
        )));
    }
    if new.storage_location.trim().is_empty() {
        return Err(ProducerError::Validation(
            "Storage location must not be empty".to_string(),
        ));
    }
    if let Some(title) = &new.title {
        if title.chars().count() > MAX_TITLE_LENGTH {
            return Err(ProducerError::Validation(format!(
                "Title must be at most {} characters",
                MAX_TITLE_LENGTH
            )));
        }
    }
    if let Some(description) = &new.description {
        if description.chars().count() > MAX_DESCRIPTION_LENGTH {
            return Err(ProducerError::Validation(format!(
                "Description must be at most {} characters",
                MAX_DESCRIPTION_LENGTH
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use filepipe_db::InMemoryRecordStore;
    use filepipe_worker::{InMemoryJobQueue, QueueConfig};

    fn upload(owner_id: Uuid) -> NewFileRecord {
        NewFileRecord {
            owner_id,
            original_filename: "hello.txt".to_string(),
            storage_location: format!("files/{}/abc_hello.txt", owner_id),
            title: Some("Greeting".to_string()),
            description: None,
        }
    }

    fn producer() -> (Producer, InMemoryRecordStore, InMemoryJobQueue) {
        let store = InMemoryRecordStore::new();
        let queue = InMemoryJobQueue::new(QueueConfig::default());
        let producer = Producer::new(Arc::new(store.clone()), Arc::new(queue.clone()));
        (producer, store, queue)
    }

    #[tokio::test]
    async fn test_submit_creates_one_record_and_one_job() {
        let (producer, store, queue) = producer();
        let new = upload(Uuid::new_v4());
        let location = new.storage_location.clone();

        let accepted = producer.submit(new).await.unwrap();
        assert_eq!(accepted.status, FileStatus::Uploaded);

        assert_eq!(store.len().await, 1);
        let record = store.find_by_id(accepted.id).await.unwrap().unwrap();
        assert_eq!(record.status, FileStatus::Uploaded);
        assert!(record.outcome.result().is_none());
        assert!(record.outcome.error().is_none());

        let payloads = queue.open_payloads(PROCESS_FILE_JOB).await;
        assert_eq!(payloads.len(), 1);
        let job = ProcessFileJob::from_payload(&payloads[0]).unwrap();
        assert_eq!(job.file_id, accepted.id);
        assert_eq!(job.storage_location, location);
    }

    #[tokio::test]
    async fn test_invalid_input_creates_nothing() {
        let (producer, store, queue) = producer();

        let mut blank = upload(Uuid::new_v4());
        blank.original_filename = "   ".to_string();
        assert!(matches!(
            producer.submit(blank).await,
            Err(ProducerError::Validation(_))
        ));

        let mut long_title = upload(Uuid::new_v4());
        long_title.title = Some("t".repeat(MAX_TITLE_LENGTH + 1));
        assert!(matches!(
            producer.submit(long_title).await,
            Err(ProducerError::Validation(_))
        ));

        let mut long_description = upload(Uuid::new_v4());
        long_description.description = Some("d".repeat(MAX_DESCRIPTION_LENGTH + 1));
        assert!(matches!(
            producer.submit(long_description).await,
            Err(ProducerError::Validation(_))
        ));

        assert!(store.is_empty().await);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_enqueue_failure_leaves_record_uploaded() {
        let (producer, store, queue) = producer();
        queue.set_unavailable(true);

        let Err(ProducerError::Queue { file_id, .. }) = producer.submit(upload(Uuid::new_v4())).await
        else {
            panic!("expected queue error");
        };

        let record = store.find_by_id(file_id).await.unwrap().unwrap();
        assert_eq!(record.status, FileStatus::Uploaded);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_resubmit_after_enqueue_failure() {
        let (producer, store, queue) = producer();
        let owner_id = Uuid::new_v4();
        queue.set_unavailable(true);
        let Err(ProducerError::Queue { file_id, .. }) = producer.submit(upload(owner_id)).await
        else {
            panic!("expected queue error");
        };

        queue.set_unavailable(false);
        let accepted = producer.resubmit(file_id, owner_id).await.unwrap();
        assert_eq!(accepted.id, file_id);
        assert_eq!(store.len().await, 1);
        assert_eq!(queue.open_payloads(PROCESS_FILE_JOB).await.len(), 1);
    }

    #[tokio::test]
    async fn test_resubmit_refused_while_job_in_flight() {
        let (producer, _store, queue) = producer();
        let owner_id = Uuid::new_v4();
        let accepted = producer.submit(upload(owner_id)).await.unwrap();

        let err = producer.resubmit(accepted.id, owner_id).await.unwrap_err();
        assert!(matches!(
            err,
            ProducerError::AlreadyQueued { file_id, .. } if file_id == accepted.id
        ));
        assert_eq!(queue.open_payloads(PROCESS_FILE_JOB).await.len(), 1);

        // A leased job still counts as in flight.
        let _delivery = queue.dequeue(PROCESS_FILE_JOB).await.unwrap().unwrap();
        assert!(matches!(
            producer.resubmit(accepted.id, owner_id).await,
            Err(ProducerError::AlreadyQueued { .. })
        ));
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_resubmit_rejects_foreign_and_started_records() {
        let (producer, store, _queue) = producer();
        let owner_id = Uuid::new_v4();
        let accepted = producer.submit(upload(owner_id)).await.unwrap();

        assert!(matches!(
            producer.resubmit(accepted.id, Uuid::new_v4()).await,
            Err(ProducerError::NotFound(_))
        ));

        store
            .update_status(
                accepted.id,
                &[FileStatus::Uploaded],
                filepipe_core::models::StatusUpdate::Processing,
            )
            .await
            .unwrap();
        assert!(matches!(
            producer.resubmit(accepted.id, owner_id).await,
            Err(ProducerError::Conflict {
                status: FileStatus::Processing,
                ..
            })
        ));
    }
}
