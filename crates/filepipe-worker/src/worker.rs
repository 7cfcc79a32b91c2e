//! Per-delivery state machine.
//!
//! `uploaded → processing → processed | failed`. Every write is conditional on
//! the status the worker last observed, so redelivered copies of a job cannot
//! overwrite a terminal outcome or produce a second one.

use chrono::Utc;
use filepipe_core::models::{
    FileStatus, ProcessFileJob, ProcessingFailure, ProcessingResult, StatusUpdate,
};
use filepipe_db::{RecordStore, WriteOutcome};
use filepipe_storage::Storage;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::processor::fingerprint;
use crate::queue::{Delivery, JobQueue, QueueError};

/// Why a delivery was acknowledged without a terminal write of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    RecordMissing,
    AlreadyTerminal(FileStatus),
    /// Another delivery moved the record first.
    LostRace(Option<FileStatus>),
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SkipReason::RecordMissing => write!(f, "record missing"),
            SkipReason::AlreadyTerminal(status) => write!(f, "record already {}", status),
            SkipReason::LostRace(Some(status)) => {
                write!(f, "record moved to {} by another delivery", status)
            }
            SkipReason::LostRace(None) => write!(f, "record removed by another delivery"),
        }
    }
}

/// What handling one delivery amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Record written `processed`; job acked.
    Processed(ProcessingResult),
    /// Record written `failed`; job nacked with the message.
    Failed(String),
    /// Nothing to do; job acked.
    Skipped(SkipReason),
    /// No terminal write happened; job nacked for redelivery.
    Retry(String),
}

pub struct FileWorker {
    store: Arc<dyn RecordStore>,
    storage: Arc<dyn Storage>,
    queue: Arc<dyn JobQueue>,
}

impl FileWorker {
    pub fn new(
        store: Arc<dyn RecordStore>,
        storage: Arc<dyn Storage>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            store,
            storage,
            queue,
        }
    }

    /// Run one delivery to completion and settle it with the queue.
    #[tracing::instrument(skip(self, delivery), fields(job_id = %delivery.job_id, attempt = delivery.attempt))]
    pub async fn handle(&self, delivery: &Delivery) -> JobOutcome {
        let outcome = self.run(delivery).await;

        let settled = match &outcome {
            JobOutcome::Processed(_) | JobOutcome::Skipped(_) => self.queue.ack(delivery).await,
            JobOutcome::Failed(message) | JobOutcome::Retry(message) => {
                self.queue.nack(delivery, message).await
            }
        };
        match settled {
            Ok(()) => {}
            Err(QueueError::LostLease { job_id }) => {
                tracing::warn!(
                    job_id = %job_id,
                    "Lease lost before settling job; another delivery owns it"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to settle job with queue");
            }
        }

        outcome
    }

    async fn run(&self, delivery: &Delivery) -> JobOutcome {
        let job = match ProcessFileJob::from_payload(&delivery.payload) {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(error = %e, "Undecodable job payload");
                return JobOutcome::Retry(format!("Invalid job payload: {}", e));
            }
        };
        let file_id = job.file_id;

        let record = match self.store.find_by_id(file_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::warn!(file_id = %file_id, "File record not found, dropping job");
                return JobOutcome::Skipped(SkipReason::RecordMissing);
            }
            Err(e) => {
                tracing::error!(file_id = %file_id, error = %e, "Failed to load file record");
                return JobOutcome::Retry(e.to_string());
            }
        };

        if record.storage_location != job.storage_location {
            tracing::warn!(
                file_id = %file_id,
                job_location = %job.storage_location,
                record_location = %record.storage_location,
                "Job storage location differs from record"
            );
        }

        match record.status {
            FileStatus::Processed | FileStatus::Failed => {
                tracing::info!(file_id = %file_id, status = %record.status, "File already finalised, skipping");
                return JobOutcome::Skipped(SkipReason::AlreadyTerminal(record.status));
            }
            FileStatus::Uploaded => {
                match self
                    .store
                    .update_status(file_id, &[FileStatus::Uploaded], StatusUpdate::Processing)
                    .await
                {
                    Ok(WriteOutcome::Applied(_)) => {
                        tracing::debug!(file_id = %file_id, "File moved to processing");
                    }
                    Ok(WriteOutcome::Rejected {
                        current: Some(FileStatus::Processing),
                    }) => {
                        tracing::debug!(file_id = %file_id, "File already claimed by another delivery, redoing");
                    }
                    Ok(WriteOutcome::Rejected { current }) => {
                        return self.lost_race(file_id, current);
                    }
                    Err(e) => {
                        tracing::error!(file_id = %file_id, error = %e, "Failed to mark file processing");
                        return JobOutcome::Retry(e.to_string());
                    }
                }
            }
            FileStatus::Processing => {
                tracing::info!(file_id = %file_id, "Redelivered job for file in processing, redoing");
            }
        }

        match fingerprint(self.storage.as_ref(), &job.storage_location).await {
            Ok(result) => self.finish_processed(file_id, result).await,
            Err(e) => self.finish_failed(file_id, e.to_string()).await,
        }
    }

    async fn finish_processed(&self, file_id: uuid::Uuid, result: ProcessingResult) -> JobOutcome {
        match self
            .store
            .update_status(
                file_id,
                &[FileStatus::Processing],
                StatusUpdate::Processed(result.clone()),
            )
            .await
        {
            Ok(WriteOutcome::Applied(_)) => {
                tracing::info!(
                    file_id = %file_id,
                    size_bytes = result.size,
                    fingerprint = %result.fingerprint,
                    "File processed"
                );
                JobOutcome::Processed(result)
            }
            Ok(WriteOutcome::Rejected { current }) => self.lost_race(file_id, current),
            Err(e) => {
                tracing::error!(file_id = %file_id, error = %e, "Failed to record processing result");
                JobOutcome::Retry(e.to_string())
            }
        }
    }

    async fn finish_failed(&self, file_id: uuid::Uuid, message: String) -> JobOutcome {
        tracing::warn!(file_id = %file_id, error = %message, "File processing failed");

        let failure = ProcessingFailure {
            message: message.clone(),
            failed_at: Utc::now(),
        };
        match self
            .store
            .update_status(
                file_id,
                &[FileStatus::Processing],
                StatusUpdate::Failed(failure),
            )
            .await
        {
            Ok(WriteOutcome::Applied(_)) => JobOutcome::Failed(message),
            Ok(WriteOutcome::Rejected { current }) => self.lost_race(file_id, current),
            Err(e) => {
                tracing::error!(
                    alert = true,
                    file_id = %file_id,
                    processing_error = %message,
                    error = %e,
                    "Double failure: could not record processing failure, file left in processing"
                );
                JobOutcome::Retry(format!("{}; failed to record failure: {}", message, e))
            }
        }
    }

    fn lost_race(&self, file_id: uuid::Uuid, current: Option<FileStatus>) -> JobOutcome {
        tracing::info!(
            file_id = %file_id,
            current = ?current,
            "Conditional write rejected, another delivery finalised the file"
        );
        match current {
            None => JobOutcome::Skipped(SkipReason::RecordMissing),
            Some(_) => JobOutcome::Skipped(SkipReason::LostRace(current)),
        }
    }
}
