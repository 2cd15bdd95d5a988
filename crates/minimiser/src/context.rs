//! Process-wide state, built once at startup.

use std::sync::Arc;

use carbon_client::{CarbonIntensityClient, ForecastSource};
use common::config::MinimiserConfig;
use common::Error;
use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::SnapshotCache;
use crate::optimizer::{ForecastAccess, Optimizer};
use crate::query::QueryFacade;

/// Owns the forecast source, the optional snapshot cache and the façade
/// every query goes through.
pub struct AppContext {
    config: MinimiserConfig,
    source: Arc<dyn ForecastSource>,
    cache: Option<Arc<SnapshotCache>>,
    facade: QueryFacade,
}

impl AppContext {
    pub fn new(config: MinimiserConfig, source: Arc<dyn ForecastSource>) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| Arc::new(SnapshotCache::from_config(source.clone(), &config)));

        let access = match &cache {
            Some(cache) => ForecastAccess::Cached(cache.clone()),
            None => ForecastAccess::Live(source.clone()),
        };
        let facade = QueryFacade::new(
            Optimizer::new(access),
            config.locations.clone(),
            cache.clone(),
        );

        Self {
            config,
            source,
            cache,
            facade,
        }
    }

    /// Context backed by the Carbon Intensity API client.
    pub fn from_config(config: MinimiserConfig) -> Result<Self, Error> {
        let client = CarbonIntensityClient::new(&config)?;
        Ok(Self::new(config, Arc::new(client)))
    }

    /// Start the background refresh loop, if caching is enabled.
    pub fn start(&self) -> Result<Option<JoinHandle<()>>, Error> {
        match &self.cache {
            Some(cache) => cache.spawn().map(Some),
            None => {
                info!("Caching disabled, queries go straight to {}", self.source.name());
                Ok(None)
            }
        }
    }

    /// Wait for the first snapshot; returns immediately without a cache.
    pub async fn wait_ready(&self) -> Result<(), Error> {
        if let Some(cache) = &self.cache {
            cache.wait_ready().await?;
        }
        Ok(())
    }

    pub fn facade(&self) -> &QueryFacade {
        &self.facade
    }

    pub fn cache(&self) -> Option<&Arc<SnapshotCache>> {
        self.cache.as_ref()
    }

    pub fn source(&self) -> &Arc<dyn ForecastSource> {
        &self.source
    }

    pub fn config(&self) -> &MinimiserConfig {
        &self.config
    }
}
