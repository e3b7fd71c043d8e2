//! # Store Error Types

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the point store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The database file could not be opened.
    #[error("failed to open store at {path}: {source}")]
    Open {
        /// Path that was being opened.
        path: PathBuf,
        /// Underlying SQLite error.
        #[source]
        source: rusqlite::Error,
    },

    /// A statement failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Closing the connection failed.
    #[error("failed to close store: {0}")]
    Close(rusqlite::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
