//! # GeoAPI
//!
//! Glue for the two binaries:
//!
//! - `geoapi_server` runs the tile and JSON server
//! - `geoapi_generate` fills the point store the server reads
//!
//! Both install the same `tracing` subscriber through [`init_logging`].

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

pub mod error;
pub mod naming;
pub mod worldgen;

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub use error::{AppError, AppResult};
pub use naming::RegionNameComposer;
pub use worldgen::{draw_regions, generate_world, sample_grid, GenerationReport, WorldGenOptions};

/// Filter used when neither `--log-filter` nor `RUST_LOG` is given.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Installs the global subscriber.
///
/// `filter` takes precedence over `RUST_LOG`. Events go to stderr, or are
/// appended to `log_file` without colour codes.
///
/// # Errors
///
/// Returns an error if the filter does not parse, the log file cannot be
/// opened or a subscriber is already installed.
pub fn init_logging(filter: Option<&str>, log_file: Option<&Path>) -> AppResult<()> {
    let env_filter = match filter {
        Some(directives) => EnvFilter::try_new(directives).map_err(|e| AppError::Logging(e.to_string()))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| AppError::LogFile {
                    path: path.to_path_buf(),
                    source,
                })?;
            registry
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .try_init()
        }
        None => registry.with(fmt::layer().with_writer(io::stderr)).try_init(),
    };
    installed.map_err(|e| AppError::Logging(e.to_string()))
}
