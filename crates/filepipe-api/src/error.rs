//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Typed errors from
//! the pipeline crates convert into `AppError` first and render through one path
//! (status, body, logging).

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use filepipe_core::{AppError, Config, ErrorMetadata, LogLevel};
use filepipe_infra::ErrorResponse;
use filepipe_services::{ProducerError, StatusError};
use filepipe_storage::StorageError;
use std::sync::atomic::{AtomicBool, Ordering};

/// Hidden until [`configure_error_details`] runs.
static EXPOSE_ERROR_DETAILS: AtomicBool = AtomicBool::new(false);

/// Include `details` and `error_type` in error bodies unless `config` is a
/// production configuration. Sensitive errors never carry them.
pub fn configure_error_details(config: &Config) {
    EXPOSE_ERROR_DETAILS.store(!config.is_production(), Ordering::Relaxed);
}

/// Wrapper so `IntoResponse` (external trait) can be implemented for
/// `AppError` (external type from filepipe-core).
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::from(err))
    }
}

impl From<ProducerError> for HttpAppError {
    fn from(err: ProducerError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<StatusError> for HttpAppError {
    fn from(err: StatusError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        let app = match err {
            StorageError::NotFound(msg) => AppError::NotFound(msg),
            StorageError::InvalidKey(msg) => AppError::Validation(msg),
            StorageError::UploadFailed(msg)
            | StorageError::DownloadFailed(msg)
            | StorageError::DeleteFailed(msg) => AppError::Storage(msg),
            StorageError::IoError(err) => AppError::Storage(format!("IO error: {}", err)),
            StorageError::ConfigError(msg) => AppError::Internal(msg),
        };
        HttpAppError(app)
    }
}

impl From<MultipartError> for HttpAppError {
    fn from(err: MultipartError) -> Self {
        let app = if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(err.body_text())
        } else {
            AppError::Validation(format!("Invalid multipart body: {}", err.body_text()))
        };
        HttpAppError(app)
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

impl HttpAppError {
    fn render(&self, expose_details: bool) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let mut body = ErrorResponse {
            error: app_error.client_message(),
            details: None,
            error_type: None,
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
            file_id: match app_error {
                AppError::Queue { file_id, .. } => Some(*file_id),
                _ => None,
            },
        };

        if expose_details && !app_error.is_sensitive() {
            body.details = Some(app_error.detailed_message());
            body.error_type = Some(app_error.error_type().to_string());
        }

        (status, Json(body)).into_response()
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        self.render(EXPOSE_ERROR_DETAILS.load(Ordering::Relaxed))
    }
}
