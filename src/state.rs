use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::metrics::CacheMetrics;
use crate::processors::{ProcessorRegistry, RegistryError};
use crate::store::{ContentStore, MemoryContentStore, PgContentStore, StorageError};
use crate::ws::EditingEngine;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("processor registration failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("content store unavailable: {0}")]
    Storage(#[from] StorageError),
}

/// Process-scoped state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<EditingEngine>,
    pub metrics: Arc<CacheMetrics>,
    pub store: Arc<dyn ContentStore>,
}

impl AppState {
    /// Build the state with the store selected by the configuration.
    pub async fn build(config: Config) -> Result<Self, StartupError> {
        let store: Arc<dyn ContentStore> = match &config.db_url {
            Some(db_url) => {
                let store = PgContentStore::connect(db_url).await?;
                info!("Using PostgreSQL content store");
                Arc::new(store)
            }
            None => {
                warn!("No database URL configured - design history is kept in memory only");
                Arc::new(MemoryContentStore::new())
            }
        };
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Arc<dyn ContentStore>) -> Result<Self, StartupError> {
        let metrics = Arc::new(CacheMetrics::new(Duration::from_secs(config.metrics_idle_secs)));
        let processors = ProcessorRegistry::with_defaults(store.clone(), metrics.clone())?;
        info!("Operations available: {}", processors.operation_names().join(", "));

        Ok(Self {
            config: Arc::new(config),
            engine: Arc::new(EditingEngine::new(processors)),
            metrics,
            store,
        })
    }
}
