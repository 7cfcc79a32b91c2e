use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use filepipe_core::models::JobStatus;
use sqlx::{PgPool, Postgres};
use std::time::Duration;
use uuid::Uuid;

/// Channel notified whenever a job becomes claimable.
pub const JOB_NOTIFY_CHANNEL: &str = "filepipe_new_job";

const JOB_COLUMNS: &str = r#"
    id,
    queue,
    name,
    unique_key,
    payload,
    status,
    attempts,
    max_attempts,
    run_at,
    locked_until,
    lease_token,
    last_error,
    created_at,
    updated_at
"#;

/// Row of the `jobs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QueuedJob {
    pub id: Uuid,
    pub queue: String,
    pub name: String,
    pub unique_key: Option<String>,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub run_at: DateTime<Utc>,
    pub locked_until: Option<DateTime<Utc>>,
    pub lease_token: Option<Uuid>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a pending job and notify listeners in the same transaction.
    ///
    /// With a `unique_key`, nothing is inserted while another pending or
    /// running job holds the same key; `None` is returned in that case.
    #[tracing::instrument(skip(self, payload))]
    pub async fn enqueue(
        &self,
        queue: &str,
        name: &str,
        unique_key: Option<&str>,
        payload: serde_json::Value,
        max_attempts: i32,
    ) -> Result<Option<QueuedJob>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for job creation")?;

        let job: Option<QueuedJob> = sqlx::query_as::<Postgres, QueuedJob>(&format!(
            r#"
            INSERT INTO jobs (queue, name, unique_key, payload, status, max_attempts)
            VALUES ($1, $2, $3, $4, 'pending', $5)
            ON CONFLICT (queue, name, unique_key) WHERE status IN ('pending', 'running')
            DO NOTHING
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(queue)
        .bind(name)
        .bind(unique_key)
        .bind(payload)
        .bind(max_attempts)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, queue = %queue, name = %name, "Failed to insert job");
            anyhow::anyhow!("Failed to insert job: {}", e)
        })?;

        let Some(job) = job else {
            tx.rollback()
                .await
                .context("Failed to roll back duplicate job creation")?;
            tracing::debug!(queue = %queue, name = %name, unique_key = ?unique_key, "Open job already exists");
            return Ok(None);
        };

        // Workers fall back to polling if the notification is lost.
        if let Err(e) = sqlx::query("SELECT pg_notify($1, $2)")
            .bind(JOB_NOTIFY_CHANNEL)
            .bind(queue)
            .execute(&mut *tx)
            .await
        {
            tracing::warn!(
                error = %e,
                job_id = %job.id,
                "Failed to send pg_notify for new job, workers will discover it via polling"
            );
        }

        tx.commit()
            .await
            .context("Failed to commit job creation")?;

        tracing::debug!(job_id = %job.id, queue = %queue, name = %name, "Job enqueued");

        Ok(Some(job))
    }

    /// The pending or running job holding `unique_key`, if any.
    #[tracing::instrument(skip(self))]
    pub async fn find_open_by_key(
        &self,
        queue: &str,
        name: &str,
        unique_key: &str,
    ) -> Result<Option<QueuedJob>> {
        let job = sqlx::query_as::<Postgres, QueuedJob>(&format!(
            r#"
            SELECT {}
            FROM jobs
            WHERE queue = $1
                AND name = $2
                AND unique_key = $3
                AND status IN ('pending', 'running')
            "#,
            JOB_COLUMNS
        ))
        .bind(queue)
        .bind(name)
        .bind(unique_key)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up open job")?;

        Ok(job)
    }

    /// Claim the next runnable job under a fresh lease.
    ///
    /// A job is runnable when it is pending and due, or when it is running but
    /// its lease expired (the previous holder is presumed dead). Running jobs
    /// whose lease expired on their last attempt are moved to `dead` instead.
    #[tracing::instrument(skip(self))]
    pub async fn claim_next(
        &self,
        queue: &str,
        name: &str,
        visibility_timeout: Duration,
    ) -> Result<Option<QueuedJob>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let buried = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'dead',
                last_error = COALESCE(last_error, 'lease expired on final attempt'),
                lease_token = NULL,
                locked_until = NULL,
                updated_at = NOW()
            WHERE queue = $1
                AND status = 'running'
                AND locked_until < NOW()
                AND attempts >= max_attempts
            "#,
        )
        .bind(queue)
        .execute(&mut *tx)
        .await
        .context("Failed to bury expired jobs")?
        .rows_affected();

        if buried > 0 {
            tracing::warn!(queue = %queue, count = buried, "Jobs exhausted their attempts after lease expiry");
        }

        let job: Option<QueuedJob> = sqlx::query_as::<Postgres, QueuedJob>(&format!(
            r#"
            UPDATE jobs
            SET status = 'running',
                attempts = attempts + 1,
                lease_token = $3,
                locked_until = NOW() + make_interval(secs => $4),
                updated_at = NOW()
            WHERE id = (
                SELECT id
                FROM jobs
                WHERE queue = $1
                    AND name = $2
                    AND (
                        (status = 'pending' AND run_at <= NOW())
                        OR (status = 'running' AND locked_until < NOW())
                    )
                ORDER BY run_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(queue)
        .bind(name)
        .bind(Uuid::new_v4())
        .bind(visibility_timeout.as_secs_f64())
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to claim next job")?;

        tx.commit().await.context("Failed to commit job claim")?;

        if let Some(ref job) = job {
            tracing::debug!(
                job_id = %job.id,
                attempt = job.attempts,
                "Job claimed"
            );
        }

        Ok(job)
    }

    /// Mark a job completed. Returns false if `lease_token` no longer holds the job.
    #[tracing::instrument(skip(self))]
    pub async fn complete(&self, job_id: Uuid, lease_token: Uuid) -> Result<bool> {
        let affected = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed',
                lease_token = NULL,
                locked_until = NULL,
                updated_at = NOW()
            WHERE id = $1 AND lease_token = $2 AND status = 'running'
            "#,
        )
        .bind(job_id)
        .bind(lease_token)
        .execute(&self.pool)
        .await
        .context("Failed to complete job")?
        .rows_affected();

        Ok(affected == 1)
    }

    /// Release a failed job: back to `pending` after `retry_after`, or `dead`
    /// once it has used all its attempts.
    ///
    /// Returns the resulting status, or `None` if `lease_token` no longer holds the job.
    #[tracing::instrument(skip(self, error))]
    pub async fn fail(
        &self,
        job_id: Uuid,
        lease_token: Uuid,
        error: &str,
        retry_after: Duration,
    ) -> Result<Option<JobStatus>> {
        let status: Option<JobStatus> = sqlx::query_scalar::<Postgres, JobStatus>(
            r#"
            UPDATE jobs
            SET status = CASE
                    WHEN attempts >= max_attempts THEN 'dead'::job_status
                    ELSE 'pending'::job_status
                END,
                run_at = NOW() + make_interval(secs => $4),
                last_error = $3,
                lease_token = NULL,
                locked_until = NULL,
                updated_at = NOW()
            WHERE id = $1 AND lease_token = $2 AND status = 'running'
            RETURNING status
            "#,
        )
        .bind(job_id)
        .bind(lease_token)
        .bind(error)
        .bind(retry_after.as_secs_f64())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to release failed job")?;

        Ok(status)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, job_id: Uuid) -> Result<Option<QueuedJob>> {
        let job = sqlx::query_as::<Postgres, QueuedJob>(&format!(
            "SELECT {} FROM jobs WHERE id = $1",
            JOB_COLUMNS
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch job")?;

        Ok(job)
    }
}
