//! Shared state handed to every worker.

use std::sync::Arc;

use geoapi_store::PointStore;
use geoapi_terrain::TerrainSynthesizer;

use crate::config::ServerConfig;
use crate::error::{LifecycleError, ServerError, ServerResult};
use crate::lifecycle::{LifecycleManager, StoreLoader, TerrainLoader};
use crate::tile_cache::TileCache;

/// The lifecycle manager as used by the server.
pub type Lifecycle = LifecycleManager<TerrainSynthesizer, PointStore>;

/// Everything a handler can reach.
pub struct ServerContext {
    /// Effective configuration.
    pub config: ServerConfig,
    /// Terrain engine and per-worker stores.
    pub lifecycle: Lifecycle,
    /// Rendered tiles.
    pub tiles: TileCache,
}

impl ServerContext {
    /// Builds the context. Nothing expensive is loaded yet; the terrain
    /// engine and stores are created on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the cache
    /// directory cannot be created.
    pub fn new(config: ServerConfig) -> ServerResult<Arc<Self>> {
        config.validate()?;

        let terrain_config = config.terrain.clone();
        let terrain_loader: TerrainLoader<TerrainSynthesizer> = Box::new(move || {
            TerrainSynthesizer::init(terrain_config.clone()).map_err(LifecycleError::from)
        });

        let store_path = config.store.path.clone();
        let store_loader: StoreLoader<PointStore> =
            Box::new(move |_| PointStore::open_read_only(&store_path).map_err(LifecycleError::from));

        Self::with_loaders(config, terrain_loader, store_loader)
    }

    /// Builds the context around caller-supplied loaders.
    pub(crate) fn with_loaders(
        config: ServerConfig,
        terrain_loader: TerrainLoader<TerrainSynthesizer>,
        store_loader: StoreLoader<PointStore>,
    ) -> ServerResult<Arc<Self>> {
        let tiles = TileCache::new(&config.cache.dir).map_err(|e| {
            ServerError::InvalidConfig(format!(
                "cache directory {}: {e}",
                config.cache.dir.display()
            ))
        })?;

        let lifecycle = LifecycleManager::new(
            config.server.workers,
            config.lifecycle.idle_timeout(),
            terrain_loader,
            store_loader,
        );

        Ok(Arc::new(Self {
            config,
            lifecycle,
            tiles,
        }))
    }
}
