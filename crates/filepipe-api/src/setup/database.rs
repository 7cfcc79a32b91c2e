//! Postgres pool for the record store and the job queue, plus schema migrations.

use anyhow::{Context, Result};
use filepipe_core::Config;
use sqlx::postgres::{PgPoolOptions, Postgres};
use sqlx::pool::PoolOptions;
use sqlx::PgPool;
use std::path::PathBuf;
use std::time::Duration;

/// Idle connections are closed after this long.
const IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);
/// Connections are recycled after this long, busy or not.
const MAX_LIFETIME: Duration = Duration::from_secs(30 * 60);

/// Open the pool and bring the `files` and `jobs` tables up to date.
pub async fn setup_database(config: &Config) -> Result<PgPool> {
    let pool = pool_options(config)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to Postgres")?;
    tracing::info!(
        max_connections = config.db_max_connections,
        acquire_timeout_secs = config.db_timeout_seconds,
        "Postgres pool ready"
    );

    run_migrations(&pool).await?;
    Ok(pool)
}

fn pool_options(config: &Config) -> PoolOptions<Postgres> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds))
        .idle_timeout(IDLE_TIMEOUT)
        .max_lifetime(MAX_LIFETIME)
}

fn migrations_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../migrations")
}

async fn run_migrations(pool: &PgPool) -> Result<()> {
    let dir = migrations_dir();
    let migrator = sqlx::migrate::Migrator::new(dir.clone())
        .await
        .with_context(|| format!("Failed to read migrations from {}", dir.display()))?;

    migrator
        .run(pool)
        .await
        .context("Failed to apply filepipe migrations")?;
    tracing::info!(
        migrations = migrator.iter().count(),
        "Schema for files and jobs is up to date"
    );
    Ok(())
}
