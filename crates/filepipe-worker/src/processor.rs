//! The processing step run for every job: a SHA-256 fingerprint of the file.

use chrono::Utc;
use filepipe_core::models::ProcessingResult;
use filepipe_storage::{Storage, StorageError};
use futures::StreamExt;
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Failed to read file: {0}")]
    Read(String),
}

impl From<StorageError> for ProcessingError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => ProcessingError::NotFound(key),
            other => ProcessingError::Read(other.to_string()),
        }
    }
}

/// Stream the file stored under `storage_key` and compute its fingerprint and size.
///
/// Pure function of the file bytes apart from `processed_at`, so it is safe to
/// run again on redelivery.
#[tracing::instrument(skip(storage))]
pub async fn fingerprint(
    storage: &dyn Storage,
    storage_key: &str,
) -> Result<ProcessingResult, ProcessingError> {
    let mut stream = storage.download_stream(storage_key).await?;
    let mut hasher = Sha256::new();
    let mut size: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        size += chunk.len() as u64;
        hasher.update(&chunk);
        tokio::task::yield_now().await;
    }

    let fingerprint = hex::encode(hasher.finalize());
    tracing::debug!(size_bytes = size, fingerprint = %fingerprint, "File fingerprinted");

    Ok(ProcessingResult {
        fingerprint,
        size,
        processed_at: Utc::now(),
    })
}
