use filepipe_core::models::FileStatus;
use filepipe_core::AppError;
use filepipe_db::StoreError;
use filepipe_worker::QueueError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    #[error("{0}")]
    Validation(String),

    #[error("File {0} not found")]
    NotFound(Uuid),

    #[error("File {file_id} is {status} and cannot be resubmitted")]
    Conflict { file_id: Uuid, status: FileStatus },

    /// A job for the file is still pending or running.
    #[error("File {file_id} already has job {job_id} in flight")]
    AlreadyQueued { file_id: Uuid, job_id: Uuid },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The record is committed in `uploaded` but its job was not enqueued.
    #[error("Failed to enqueue job for file {file_id}: {source}")]
    Queue {
        file_id: Uuid,
        #[source]
        source: QueueError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("File {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ProducerError> for AppError {
    fn from(err: ProducerError) -> Self {
        match err {
            ProducerError::Validation(msg) => AppError::Validation(msg),
            ProducerError::NotFound(id) => AppError::NotFound(format!("File {} not found", id)),
            err @ (ProducerError::Conflict { .. } | ProducerError::AlreadyQueued { .. }) => {
                AppError::Conflict(err.to_string())
            }
            ProducerError::Store(err) => err.into(),
            ProducerError::Queue { file_id, source } => AppError::Queue {
                file_id,
                message: source.to_string(),
            },
        }
    }
}

impl From<StatusError> for AppError {
    fn from(err: StatusError) -> Self {
        match err {
            StatusError::NotFound(id) => AppError::NotFound(format!("File {} not found", id)),
            StatusError::Store(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filepipe_core::ErrorMetadata;

    #[test]
    fn test_queue_failure_maps_to_retryable_app_error() {
        let file_id = Uuid::new_v4();
        let app: AppError = ProducerError::Queue {
            file_id,
            source: QueueError::Unavailable("connection refused".to_string()),
        }
        .into();
        assert_eq!(app.http_status_code(), 503);
        assert!(app.is_recoverable());
        assert!(matches!(app, AppError::Queue { file_id: id, .. } if id == file_id));
    }

    #[test]
    fn test_status_not_found_maps_to_404() {
        let app: AppError = StatusError::NotFound(Uuid::new_v4()).into();
        assert_eq!(app.http_status_code(), 404);
    }

    #[test]
    fn test_conflict_maps_to_409() {
        let app: AppError = ProducerError::Conflict {
            file_id: Uuid::new_v4(),
            status: FileStatus::Processed,
        }
        .into();
        assert_eq!(app.http_status_code(), 409);
        assert!(app.client_message().contains("processed"));
    }
}
