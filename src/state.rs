use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::{blob::BlobStore, config::Config};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub blobs: Arc<dyn BlobStore>,
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn BlobStore> {
    fn from_ref(state: &AppState) -> Self {
        state.blobs.clone()
    }
}
