use std::sync::Arc;

use madrasa_config::{CorsConfig, MediaConfig, StorageConfig};
use madrasa_core::{LocalObjectStorage, ObjectStorage};
use madrasa_db::{PgPool, PgSlotStore};
use madrasa_media::{
    AssetReplacementService, Clock, ReplacementPolicy, Retention, RetentionSweeper, SystemClock,
};
use madrasa_observability::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub media: Arc<AssetReplacementService>,
    pub sweeper: Arc<RetentionSweeper>,
    pub clock: Arc<dyn Clock>,
    pub media_config: MediaConfig,
    pub storage_config: StorageConfig,
    pub cors_config: CorsConfig,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wires the media services over `db` and the given storage backend.
    ///
    /// Storage and CORS settings are read from the environment; callers may
    /// overwrite the public fields afterwards.
    pub fn new(
        db: PgPool,
        storage: Arc<dyn ObjectStorage>,
        clock: Arc<dyn Clock>,
        media_config: MediaConfig,
    ) -> Self {
        let store = Arc::new(PgSlotStore::new(db.clone()));
        let policy = ReplacementPolicy {
            retention: Retention::days(media_config.retention_days),
            trash_retention_days: media_config.trash_retention_days,
            upload_timeout: media_config.upload_timeout,
        };

        let media =
            AssetReplacementService::new(storage.clone(), store.clone(), clock.clone(), policy);
        let sweeper =
            RetentionSweeper::new(store, storage).with_batch_size(media_config.sweep_batch_size);

        Self {
            db,
            media: Arc::new(media),
            sweeper: Arc::new(sweeper),
            clock,
            media_config,
            storage_config: StorageConfig::from_env(),
            cors_config: CorsConfig::from_env(),
            metrics: None,
        }
    }
}

/// State for the server: local filesystem storage and the wall clock.
pub fn init_app_state(db: PgPool, metrics: Option<PrometheusHandle>) -> AppState {
    let media_config = MediaConfig::from_env();
    let storage_config = StorageConfig::from_env();

    let storage = LocalObjectStorage::with_max_size(
        storage_config.root.clone(),
        storage_config.public_base_url.clone(),
        storage_config.bucket.clone(),
        media_config.max_upload_bytes,
    );

    AppState {
        storage_config,
        metrics,
        ..AppState::new(db, Arc::new(storage), Arc::new(SystemClock), media_config)
    }
}
