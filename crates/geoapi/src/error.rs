//! Errors surfaced by the binaries.

use std::io;
use std::path::PathBuf;

use geoapi_server::ServerError;
use geoapi_store::StoreError;
use geoapi_terrain::TerrainError;
use thiserror::Error;

/// Anything that can stop a binary.
#[derive(Error, Debug)]
pub enum AppError {
    /// Server startup or run failure.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// Point store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Terrain engine failure.
    #[error(transparent)]
    Terrain(#[from] TerrainError),

    /// The log file could not be opened.
    #[error("failed to open log file {path}: {source}")]
    LogFile {
        /// Requested log file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The output directory could not be created.
    #[error("failed to create {path}: {source}")]
    OutputDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The log filter is invalid or a subscriber is already installed.
    #[error("logging setup failed: {0}")]
    Logging(String),

    /// Every name combination is already in use.
    #[error("region names exhausted after {used} unique names")]
    NamesExhausted {
        /// Names handed out before running dry.
        used: usize,
    },

    /// Generator option out of range.
    #[error("invalid option: {0}")]
    InvalidOption(String),
}

/// Result alias for the binaries.
pub type AppResult<T> = Result<T, AppError>;
