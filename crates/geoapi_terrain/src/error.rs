//! # Terrain Error Types
//!
//! Failures raised while building the terrain engine.

use thiserror::Error;

/// Errors that can occur while initializing terrain generation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TerrainError {
    /// Internal tables could not be allocated.
    #[error("terrain table allocation failed: {0}")]
    Allocation(String),

    /// The generation parameters are unusable.
    #[error("invalid terrain configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for terrain operations.
pub type TerrainResult<T> = Result<T, TerrainError>;
