//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;

use anyhow::{Context, Result};
use filepipe_core::Config;
use filepipe_worker::WorkerPool;
use std::sync::Arc;

use crate::state::AppState;

/// Everything `main` needs to serve.
pub struct Application {
    pub state: Arc<AppState>,
    pub router: axum::Router,
    pub workers: Option<WorkerPool>,
}

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<Application> {
    config.validate().context("Configuration validation failed")?;

    filepipe_infra::init_telemetry(config.log_format)
        .context("Failed to initialize telemetry")?;

    tracing::info!(
        environment = %config.environment,
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(&config).await?;
    let services = services::initialize_services(&config, pool).await?;
    let router = routes::setup_routes(&config, services.state.clone())?;

    Ok(Application {
        state: services.state,
        router,
        workers: services.workers,
    })
}
