use crate::config::AppConfig;
use crate::db::DbPool;
use std::sync::Arc;

/// Shared state handed to every HTTP handler.
/// The pricer itself is stateless; only the record store lives here.
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool) -> Arc<Self> {
        Arc::new(Self { config, db })
    }
}
