//! # GeoAPI Store
//!
//! Persistent store of generated sample points and named regions.
//!
//! The offline generator writes it once; the server opens one read-only
//! connection per worker and queries it by bounding box.
//!
//! ## Tables
//!
//! - `mapdata(lat, lon, elevation, r, g, b, biome)`, keyed on `(lat, lon)`;
//!   `biome` may be absent in older stores and `r, g, b` may be stored as REAL
//! - `regions(id, lat, lon, lat2, lon2, elevation, population, light_pollution, name)`,
//!   keyed on `id`, `name` unique

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
mod schema;
pub mod store;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use store::PointStore;
pub use types::{NewRegion, PointRecord, Region};
