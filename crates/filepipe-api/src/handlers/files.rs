use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use filepipe_core::models::NewFileRecord;
use filepipe_core::AppError;
use filepipe_services::ProducerError;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::OwnerContext;
use crate::error::HttpAppError;
use crate::state::AppState;

struct UploadForm {
    filename: String,
    data: Bytes,
    title: Option<String>,
    description: Option<String>,
}

async fn read_upload_form(
    mut multipart: Multipart,
    max_bytes: usize,
) -> Result<UploadForm, HttpAppError> {
    let mut file: Option<(String, Bytes)> = None;
    let mut title = None;
    let mut description = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .ok_or_else(|| AppError::Validation("File field has no filename".to_string()))?;
                let data = field.bytes().await?;
                if data.len() > max_bytes {
                    return Err(AppError::PayloadTooLarge(format!(
                        "{} bytes exceeds max {} bytes",
                        data.len(),
                        max_bytes
                    ))
                    .into());
                }
                file = Some((filename, data));
            }
            Some("title") => title = Some(field.text().await?),
            Some("description") => description = Some(field.text().await?),
            _ => {}
        }
    }

    let (filename, data) =
        file.ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))?;
    if data.is_empty() {
        return Err(AppError::Validation("File is empty".to_string()).into());
    }

    Ok(UploadForm {
        filename,
        data,
        title: title.filter(|t| !t.trim().is_empty()),
        description: description.filter(|d| !d.trim().is_empty()),
    })
}

/// `POST /api/v0/files`: store the bytes, then hand the record to the producer.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    owner: OwnerContext,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let form = read_upload_form(multipart, state.config.max_upload_bytes).await?;
    let size = form.data.len();

    let storage_key = state
        .storage
        .upload(owner.owner_id, &form.filename, form.data)
        .await?;

    let result = state
        .producer
        .submit(NewFileRecord {
            owner_id: owner.owner_id,
            original_filename: form.filename,
            storage_location: storage_key.clone(),
            title: form.title,
            description: form.description,
        })
        .await;

    match result {
        Ok(accepted) => {
            tracing::info!(
                file_id = %accepted.id,
                owner_id = %owner.owner_id,
                size = size,
                "Upload accepted"
            );
            Ok((StatusCode::CREATED, Json(accepted)))
        }
        // The record exists; keep its bytes for resubmission.
        Err(e @ ProducerError::Queue { .. }) => Err(e.into()),
        Err(e) => {
            if let Err(delete_err) = state.storage.delete(&storage_key).await {
                tracing::warn!(
                    storage_key = %storage_key,
                    error = %delete_err,
                    "Failed to remove blob of rejected upload"
                );
            }
            Err(e.into())
        }
    }
}

/// `GET /api/v0/files/{id}`
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    owner: OwnerContext,
    Path(file_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let view = state.status_reader.get(file_id, owner.owner_id).await?;
    Ok(Json(view))
}

/// `POST /api/v0/files/{id}/resubmit`: re-enqueue a file whose job was lost.
pub async fn resubmit_file(
    State(state): State<Arc<AppState>>,
    owner: OwnerContext,
    Path(file_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let accepted = state.producer.resubmit(file_id, owner.owner_id).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}
