//! # GeoAPI Server
//!
//! Serves the procedural planet over plain HTTP/1.1: PNG tiles rendered on
//! demand and cached on disk, a live sampling grid, and bounding-box queries
//! against the point store.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  Serve   ┌─────────────┐
//! │ accept loop  │─────────►│             │──► worker-0 ─┐
//! └──────────────┘          │  TaskQueue  │──► worker-1 ─┼─► handlers ─► LifecycleManager
//! ┌──────────────┐ Close    │   (FIFO)    │──► …         │              ├─ terrain (shared)
//! │ housekeeper  │─────────►│             │──► worker-N ─┘              └─ store per worker
//! └──────────────┘          └─────────────┘
//! ```
//!
//! ## Endpoints
//!
//! | Path             | Body                                   |
//! |------------------|----------------------------------------|
//! | `/regions_chunk` | JSON regions in a box                  |
//! | `/mapdata`       | JSON stored points in a box            |
//! | `/map`           | JSON live grid from the terrain engine |
//! | `/biome`         | PNG, RGB biome colours                 |
//! | `/clouds`        | PNG, RGBA precipitation                |
//! | `/elevation`     | PNG, grayscale elevation               |

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

pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod housekeeper;
pub mod lifecycle;
pub mod protocol;
pub mod server;
pub mod tile_cache;
pub mod worker;

pub use config::{CacheConfig, LifecycleConfig, LimitsConfig, ListenConfig, ServerConfig, StoreConfig};
pub use context::{Lifecycle, ServerContext};
pub use error::{ApiError, LifecycleError, ServerError, ServerResult};
pub use housekeeper::Housekeeper;
pub use lifecycle::{HousekeepingReport, LifecycleManager, ResourceState, Teardown, WorkerId};
pub use protocol::{parse_request, Request, Response, Route};
pub use server::{GeoServer, ShutdownHandle};
pub use tile_cache::{render_tile, CachedTile, TileCache, TileLayer, TileRequest};
pub use worker::{Task, TaskQueue, WorkerPool};
