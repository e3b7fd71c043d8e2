//! # Server Error Types
//!
//! Three layers of failure:
//!
//! - [`ServerError`]: startup and shutdown of the process itself
//! - [`LifecycleError`]: building or releasing a shared resource
//! - [`ApiError`]: the outcome of one request, mapped to a status or a
//!   closed connection

use std::io;
use std::path::PathBuf;

use geoapi_store::StoreError;
use geoapi_terrain::TerrainError;
use thiserror::Error;

use crate::lifecycle::WorkerId;

/// Errors that stop the server from starting or running.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid TOML for [`crate::ServerConfig`].
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A thread could not be spawned.
    #[error("failed to spawn {name}: {source}")]
    Spawn {
        /// Thread name.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Any other I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors from building or releasing a shared resource.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The terrain engine failed to initialize.
    #[error("terrain init failed: {0}")]
    Terrain(#[from] TerrainError),

    /// A worker's store failed to open.
    #[error("store init failed: {0}")]
    Store(#[from] StoreError),

    /// A resource failed to release cleanly.
    #[error("release failed: {0}")]
    Release(String),

    /// The worker id is outside the pool.
    #[error("unknown worker {0}")]
    UnknownWorker(WorkerId),
}

/// Outcome of a failed request.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Unparseable request line, invalid step, empty range.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request would exceed a size budget.
    #[error("too large: {0}")]
    TooLarge(String),

    /// No route for this method and path.
    #[error("not found")]
    NotFound,

    /// A resource needed by the handler could not be built.
    #[error(transparent)]
    Init(#[from] LifecycleError),

    /// Any other failure inside a handler.
    #[error("handler failed: {0}")]
    Handler(String),
}

impl ApiError {
    /// Status code to answer with, or `None` when the connection is closed
    /// without a response.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::BadRequest(_) => Some(400),
            Self::NotFound => Some(404),
            Self::TooLarge(_) => Some(413),
            Self::Init(_) | Self::Handler(_) => None,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::Handler(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::BadRequest("x".into()).status(), Some(400));
        assert_eq!(ApiError::NotFound.status(), Some(404));
        assert_eq!(ApiError::TooLarge("x".into()).status(), Some(413));
        assert_eq!(ApiError::Handler("x".into()).status(), None);
        let init = ApiError::from(LifecycleError::Release("x".into()));
        assert_eq!(init.status(), None);
    }
}
