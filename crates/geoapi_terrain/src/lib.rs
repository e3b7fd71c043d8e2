//! # GeoAPI Terrain
//!
//! Deterministic procedural planet surface.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Same seed always produces the same planet
//! 2. **Seamless**: Noise is sampled on a sphere, so there is no seam at ±180°
//! 3. **Shareable**: The synthesizer is immutable once built
//!
//! ## Core Components
//!
//! - `NoiseField`: 3D improved Perlin, 2D simplex and fBm
//! - `Biome`: Elevation ladder and palette
//! - `TerrainSynthesizer`: Elevation, cold zone, climate and full point info
//! - `GeoBounds`: Normalized lat/lon boxes
//!
//! ## Example
//!
//! ```rust
//! use geoapi_terrain::{TerrainConfig, TerrainSynthesizer};
//!
//! let terrain = TerrainSynthesizer::init(TerrainConfig::default()).unwrap();
//! let point = terrain.terrain_info_at(48.85, 2.35);
//! assert!(point.elevation.is_finite());
//! terrain.shutdown();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

pub mod biome;
pub mod error;
pub mod geo;
pub mod noise;
pub mod synth;

pub use biome::{Biome, Color, Rgb8};
pub use error::{TerrainError, TerrainResult};
pub use geo::{coord_key, round2, GeoBounds, LAT_LIMIT, LON_LIMIT};
pub use noise::{NoiseField, WorldSeed};
pub use synth::{sphere_point, TerrainConfig, TerrainPoint, TerrainSynthesizer};
