//! Application state shared by all handlers.

use filepipe_core::Config;
use filepipe_db::RecordStore;
use filepipe_services::{Producer, StatusReader};
use filepipe_storage::Storage;
use filepipe_worker::JobQueue;
use std::sync::Arc;

use crate::auth::JwtVerifier;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn Storage>,
    pub producer: Producer,
    pub status_reader: StatusReader,
    pub jwt: Arc<JwtVerifier>,
}

impl AppState {
    /// Wire the pipeline services over the given collaborators.
    pub fn new(
        config: Config,
        store: Arc<dyn RecordStore>,
        queue: Arc<dyn JobQueue>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        let jwt = Arc::new(JwtVerifier::new(&config.jwt_secret));
        Self {
            producer: Producer::new(store.clone(), queue),
            status_reader: StatusReader::new(store),
            config,
            storage,
            jwt,
        }
    }
}
