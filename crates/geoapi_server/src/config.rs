//! # Server Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file (or no file at all) yields a working local server.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8008
//! workers = 5
//!
//! [lifecycle]
//! idle_timeout_ms = 10000
//! housekeeping_interval_ms = 1000
//!
//! [cache]
//! dir = "var/cache"
//!
//! [store]
//! path = "var/mapdata.sqlite"
//!
//! [limits]
//! max_points = 50000
//! default_tile_size = 256
//! max_tile_side = 4096
//!
//! [terrain]
//! seed = 7929416046198312961    # or a string such as "0xF00DFACE00000001"
//! scale = 2.0
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use geoapi_terrain::TerrainConfig;
use serde::Deserialize;

use crate::error::{ServerError, ServerResult};

/// Full server configuration.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener and pool size.
    pub server: ListenConfig,
    /// Idle unload timing.
    pub lifecycle: LifecycleConfig,
    /// Tile cache location.
    pub cache: CacheConfig,
    /// Point store location.
    pub store: StoreConfig,
    /// Request size budgets.
    pub limits: LimitsConfig,
    /// Terrain generation parameters.
    pub terrain: TerrainConfig,
}

/// `[server]` section.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Bind host.
    pub host: String,
    /// Bind port; 0 picks a free port.
    pub port: u16,
    /// Number of worker threads.
    pub workers: usize,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8008,
            workers: 5,
        }
    }
}

/// `[lifecycle]` section.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Idle period after which shared resources are released.
    pub idle_timeout_ms: u64,
    /// Period of the housekeeping loop.
    pub housekeeping_interval_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 10_000,
            housekeeping_interval_ms: 1_000,
        }
    }
}

impl LifecycleConfig {
    /// Idle timeout as a duration.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Housekeeping interval as a duration.
    #[must_use]
    pub const fn housekeeping_interval(&self) -> Duration {
        Duration::from_millis(self.housekeeping_interval_ms)
    }
}

/// `[cache]` section.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding rendered tiles.
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("var/cache"),
        }
    }
}

/// `[store]` section.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file written by the generator.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("var/mapdata.sqlite"),
        }
    }
}

/// `[limits]` section.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Point budget for `/mapdata` rows and `/map` grids.
    pub max_points: usize,
    /// Tile width/height when the request omits them.
    pub default_tile_size: u32,
    /// Largest accepted tile width or height.
    pub max_tile_side: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_points: 50_000,
            default_tile_size: 256,
            max_tile_side: 4096,
        }
    }
}

impl ServerConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::ConfigParse`] for malformed TOML and
    /// [`ServerError::InvalidConfig`] for out-of-range values.
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::ConfigRead`] if the file cannot be read, or any
    /// error from [`ServerConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ServerError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidConfig`] naming the first bad value.
    pub fn validate(&self) -> ServerResult<()> {
        if self.server.workers == 0 {
            return Err(ServerError::InvalidConfig("server.workers must be at least 1".into()));
        }
        if self.lifecycle.housekeeping_interval_ms == 0 {
            return Err(ServerError::InvalidConfig(
                "lifecycle.housekeeping_interval_ms must be at least 1".into(),
            ));
        }
        if self.limits.max_points == 0 {
            return Err(ServerError::InvalidConfig("limits.max_points must be at least 1".into()));
        }
        if self.limits.default_tile_size == 0
            || self.limits.default_tile_size > self.limits.max_tile_side
        {
            return Err(ServerError::InvalidConfig(format!(
                "limits.default_tile_size must be in 1..={}",
                self.limits.max_tile_side
            )));
        }
        self.terrain
            .validate()
            .map_err(|e| ServerError::InvalidConfig(e.to_string()))
    }

    /// `host:port` string for the listener.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind_address(), "127.0.0.1:8008");
        assert_eq!(config.server.workers, 5);
        assert_eq!(config.lifecycle.idle_timeout(), Duration::from_secs(10));
        assert_eq!(config.limits.max_points, 50_000);
        assert_eq!(config.terrain.octaves, 6);
    }

    #[test]
    fn test_partial_sections() {
        let config = ServerConfig::from_toml_str(
            r#"
            [server]
            port = 9000

            [lifecycle]
            idle_timeout_ms = 250

            [terrain]
            seed = 42
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.lifecycle.idle_timeout_ms, 250);
        assert_eq!(config.lifecycle.housekeeping_interval_ms, 1_000);
        assert_eq!(config.terrain.seed, 42);
        assert!((config.terrain.gain - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_seed_above_signed_range_as_string() {
        let config = ServerConfig::from_toml_str("[terrain]\nseed = \"0xFFFFFFFFFFFFFFFF\"\n").unwrap();
        assert_eq!(config.terrain.seed, u64::MAX);
        let err = ServerConfig::from_toml_str("[terrain]\nseed = -3\n").unwrap_err();
        assert!(matches!(err, ServerError::ConfigParse(_)));
    }

    #[test]
    fn test_rejects_zero_workers() {
        let err = ServerConfig::from_toml_str("[server]\nworkers = 0\n").unwrap_err();
        assert!(matches!(err, ServerError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_bad_terrain() {
        let err = ServerConfig::from_toml_str("[terrain]\noctaves = 0\n").unwrap_err();
        assert!(matches!(err, ServerError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = ServerConfig::from_toml_str("[server\nport = 1").unwrap_err();
        assert!(matches!(err, ServerError::ConfigParse(_)));
    }
}
