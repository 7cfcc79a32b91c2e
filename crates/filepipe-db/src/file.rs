use anyhow::Context;
use async_trait::async_trait;
use filepipe_core::models::{FileRecord, FileStatus, NewFileRecord, StatusUpdate};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::store::{check_transition, RecordStore, StoreError, WriteOutcome};

const FILE_COLUMNS: &str = r#"
    id,
    owner_id,
    original_filename,
    storage_location,
    title,
    description,
    status,
    result,
    error,
    created_at,
    updated_at
"#;

/// Postgres-backed record store over the `files` table.
#[derive(Clone)]
pub struct FileRepository {
    pool: PgPool,
}

impl FileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn current_status(&self, id: Uuid) -> Result<Option<FileStatus>, StoreError> {
        let status: Option<FileStatus> =
            sqlx::query_scalar::<Postgres, FileStatus>("SELECT status FROM files WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to read file status")?;
        Ok(status)
    }
}

#[async_trait]
impl RecordStore for FileRepository {
    #[tracing::instrument(skip(self, new), fields(owner_id = %new.owner_id))]
    async fn create(&self, new: NewFileRecord) -> Result<FileRecord, StoreError> {
        let record: FileRecord = sqlx::query_as::<Postgres, FileRecord>(&format!(
            r#"
            INSERT INTO files (
                owner_id, original_filename, storage_location, title, description, status
            )
            VALUES ($1, $2, $3, $4, $5, 'uploaded')
            RETURNING {}
            "#,
            FILE_COLUMNS
        ))
        .bind(new.owner_id)
        .bind(&new.original_filename)
        .bind(&new.storage_location)
        .bind(&new.title)
        .bind(&new.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(
                error = %e,
                owner_id = %new.owner_id,
                "Failed to insert file record"
            );
            StoreError::Database(e)
        })?;

        tracing::debug!(file_id = %record.id, "File record inserted");

        Ok(record)
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, StoreError> {
        let record: Option<FileRecord> = sqlx::query_as::<Postgres, FileRecord>(&format!(
            "SELECT {} FROM files WHERE id = $1",
            FILE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch file record")?;

        Ok(record)
    }

    #[tracing::instrument(skip(self))]
    async fn find_for_owner(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<FileRecord>, StoreError> {
        let record: Option<FileRecord> = sqlx::query_as::<Postgres, FileRecord>(&format!(
            "SELECT {} FROM files WHERE id = $1 AND owner_id = $2",
            FILE_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch file record for owner")?;

        Ok(record)
    }

    #[tracing::instrument(skip(self, update), fields(to = %update.target_status()))]
    async fn update_status(
        &self,
        id: Uuid,
        expected: &[FileStatus],
        update: StatusUpdate,
    ) -> Result<WriteOutcome, StoreError> {
        check_transition(expected, &update)?;

        let to = update.target_status();
        let expected_names: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
        let outcome = update.into_outcome();
        let result = outcome.result().cloned().map(Json);
        let error = outcome.error().cloned().map(Json);

        let updated: Option<FileRecord> = sqlx::query_as::<Postgres, FileRecord>(&format!(
            r#"
            UPDATE files
            SET status = $3,
                result = $4,
                error = $5,
                updated_at = NOW()
            WHERE id = $1 AND status::text = ANY($2)
            RETURNING {}
            "#,
            FILE_COLUMNS
        ))
        .bind(id)
        .bind(&expected_names)
        .bind(to)
        .bind(result)
        .bind(error)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update file status")?;

        match updated {
            Some(record) => {
                tracing::debug!(file_id = %id, status = %to, "File status updated");
                Ok(WriteOutcome::Applied(record))
            }
            None => {
                let current = self.current_status(id).await?;
                tracing::debug!(
                    file_id = %id,
                    current = ?current,
                    to = %to,
                    "Conditional status write rejected"
                );
                Ok(WriteOutcome::Rejected { current })
            }
        }
    }
}
