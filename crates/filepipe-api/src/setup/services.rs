//! Wiring of stores, queue, storage and the in-process worker pool.

use anyhow::{Context, Result};
use filepipe_core::models::FILE_PROCESSING_QUEUE;
use filepipe_core::Config;
use filepipe_db::{FileRepository, JobRepository, RecordStore};
use filepipe_storage::{LocalStorage, Storage};
use filepipe_worker::{
    FileWorker, JobQueue, PgJobQueue, QueueConfig, WorkerPool, WorkerPoolConfig,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::state::AppState;

pub struct Services {
    pub state: Arc<AppState>,
    pub workers: Option<WorkerPool>,
}

pub fn queue_config(config: &Config) -> QueueConfig {
    QueueConfig {
        visibility_timeout: Duration::from_secs(config.queue_visibility_timeout_secs),
        max_attempts: config.queue_max_attempts,
        ..QueueConfig::default()
    }
}

pub fn worker_pool_config(config: &Config) -> WorkerPoolConfig {
    WorkerPoolConfig {
        concurrency: config.worker_concurrency,
        poll_interval: Duration::from_millis(config.worker_poll_interval_ms),
        ..WorkerPoolConfig::default()
    }
}

pub async fn initialize_services(config: &Config, pool: PgPool) -> Result<Services> {
    let storage: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(&config.storage_path)
            .await
            .context("Failed to initialize local storage")?,
    );
    tracing::info!(path = %config.storage_path, "Local storage initialized");

    let store: Arc<dyn RecordStore> = Arc::new(FileRepository::new(pool.clone()));

    let pg_queue = PgJobQueue::new(
        JobRepository::new(pool),
        FILE_PROCESSING_QUEUE,
        queue_config(config),
    );
    // Detached: the listener lives as long as the process.
    let _listener = pg_queue.spawn_listener();
    let queue: Arc<dyn JobQueue> = Arc::new(pg_queue);

    let workers = if config.worker_concurrency > 0 {
        let worker = Arc::new(FileWorker::new(
            store.clone(),
            storage.clone(),
            queue.clone(),
        ));
        Some(WorkerPool::start(
            worker,
            queue.clone(),
            worker_pool_config(config),
        ))
    } else {
        tracing::info!("WORKER_CONCURRENCY is 0, worker pool disabled");
        None
    };

    let state = Arc::new(AppState::new(config.clone(), store, queue, storage));

    Ok(Services { state, workers })
}
