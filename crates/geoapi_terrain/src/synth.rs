//! # Terrain Synthesizer
//!
//! Turns a latitude/longitude pair into a full [`TerrainPoint`].
//!
//! ## Pipeline
//!
//! ```text
//! (lat, lon) ──► unit sphere ──► fBm elevation ──┐
//!      │                                        ├──► biome ladder ──► colour
//!      └──────► cold zone (band + 2D jitter) ───┘
//!      └──────► climate (temperature band, warped fBm precipitation)
//! ```
//!
//! Sampling on the sphere instead of the flat lat/lon plane keeps the field
//! seamless across the ±180° seam and at both poles.
//!
//! The synthesizer is immutable after [`TerrainSynthesizer::init`], so one
//! instance can be shared by every worker thread without locking.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

use crate::biome::{Biome, Color, Rgb8};
use crate::error::{TerrainError, TerrainResult};
use crate::noise::{NoiseField, WorldSeed};

/// Poleward edge of the temperate band, in degrees.
const COLD_BAND_START: f64 = 68.0;
/// Latitude at which the cold zone is fully established.
const COLD_BAND_FULL: f64 = 75.0;
/// Amplitude of the cold-zone jitter.
const COLD_JITTER: f64 = 0.2;
/// Frequency of the cold-zone jitter, per degree.
const COLD_JITTER_FREQ: f64 = 0.1;

/// Noise scale of the large weather cells.
const WEATHER_SCALE: f64 = 3.0;
/// Noise scale of the warped detail layer.
const WEATHER_DETAIL_SCALE: f64 = 8.0;
/// Domain warp strength of the detail layer, in degrees.
const WEATHER_WARP: f64 = 20.0;
/// Cloud cover below this is reported as dry.
const CLOUD_CUTOFF: f64 = 0.05;

/// Parameters of the elevation field.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Noise seed.
    ///
    /// TOML integers are signed 64-bit, so seeds above `i64::MAX` are
    /// written as a string, either decimal or `0x`-prefixed hex.
    #[serde(deserialize_with = "deserialize_seed")]
    pub seed: u64,
    /// Radius of the sampling sphere; larger values give smaller continents.
    pub scale: f64,
    /// Number of fBm octaves.
    pub octaves: u32,
    /// Frequency multiplier per octave.
    pub lacunarity: f64,
    /// Amplitude multiplier per octave.
    pub gain: f64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: WorldSeed::default().value(),
            scale: 2.0,
            octaves: 6,
            lacunarity: 2.0,
            gain: 0.5,
        }
    }
}

impl TerrainConfig {
    /// Checks that the parameters describe a usable field.
    ///
    /// # Errors
    ///
    /// Returns [`TerrainError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> TerrainResult<()> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(TerrainError::InvalidConfig(format!("scale must be > 0, got {}", self.scale)));
        }
        if !(1..=16).contains(&self.octaves) {
            return Err(TerrainError::InvalidConfig(format!(
                "octaves must be in 1..=16, got {}",
                self.octaves
            )));
        }
        if !(self.lacunarity.is_finite() && self.lacunarity > 0.0) {
            return Err(TerrainError::InvalidConfig(format!(
                "lacunarity must be > 0, got {}",
                self.lacunarity
            )));
        }
        if !self.gain.is_finite() {
            return Err(TerrainError::InvalidConfig(format!("gain must be finite, got {}", self.gain)));
        }
        Ok(())
    }
}

fn deserialize_seed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    struct SeedVisitor;

    impl Visitor<'_> for SeedVisitor {
        type Value = u64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a non-negative integer or a decimal or 0x-hex string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
            u64::try_from(v).map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
            let text = v.trim().replace('_', "");
            let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                Some(hex) => u64::from_str_radix(hex, 16),
                None => text.parse(),
            };
            parsed.map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
        }
    }

    deserializer.deserialize_any(SeedVisitor)
}

/// Everything known about one surface location.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TerrainPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Raw fBm elevation, practically within [-1, 1].
    pub elevation: f64,
    /// Classified biome.
    pub biome: Biome,
    /// Surface colour.
    pub color: Rgb8,
    /// Cloud/precipitation intensity.
    pub precipitation: u8,
    /// Temperature band, 255 at the equator and 0 at the poles.
    pub temperature: u8,
}

/// Procedural planet surface.
pub struct TerrainSynthesizer {
    config: TerrainConfig,
    noise: NoiseField,
}

impl TerrainSynthesizer {
    /// Validates the configuration and builds the noise tables.
    ///
    /// # Errors
    ///
    /// Returns a [`TerrainError`] if the configuration is invalid or the
    /// tables cannot be allocated.
    pub fn init(config: TerrainConfig) -> TerrainResult<Self> {
        config.validate()?;
        let noise = NoiseField::new(WorldSeed::new(config.seed))?;
        tracing::debug!(seed = config.seed, scale = config.scale, "terrain tables built");
        Ok(Self { config, noise })
    }

    /// Releases the noise tables.
    ///
    /// Consumes the engine, so a second shutdown cannot be expressed.
    pub fn shutdown(self) {
        tracing::debug!(seed = self.config.seed, "terrain tables released");
    }

    /// The parameters this engine was built with.
    #[must_use]
    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// Elevation at a surface location.
    #[must_use]
    pub fn elevation_at(&self, lat: f64, lon: f64) -> f64 {
        self.fbm_on_sphere(lat, lon, self.config.scale)
    }

    /// Whether a location lies in the polar cold zone.
    ///
    /// The band edge is jittered with 2D noise so the ice boundary is
    /// irregular instead of a perfect circle.
    #[must_use]
    pub fn cold_zone(&self, lat: f64, lon: f64) -> bool {
        let band = (lat.abs() - COLD_BAND_START) / (COLD_BAND_FULL - COLD_BAND_START);
        let jitter =
            self.noise.sample2(lat * COLD_JITTER_FREQ, lon * COLD_JITTER_FREQ) * COLD_JITTER;
        band + jitter > 1.0
    }

    /// Classifies an elevation at a location into biome and colour.
    #[must_use]
    pub fn classify(&self, elevation: f64, lat: f64, lon: f64) -> (Biome, Color) {
        let biome = Biome::from_elevation(elevation, self.cold_zone(lat, lon));
        (biome, biome.color(elevation))
    }

    /// Temperature byte for a latitude.
    #[must_use]
    pub fn temperature_at(lat: f64) -> u8 {
        let lat_ratio = (lat.abs() / 90.0).min(1.0);
        (255.0 * (1.0 - lat_ratio)) as u8
    }

    /// Precipitation byte at a location.
    ///
    /// Banded by latitude (wet tropics and mid-latitude jets), modulated by
    /// two layers of warped weather noise.
    #[must_use]
    pub fn precipitation_at(&self, lat: f64, lon: f64) -> u8 {
        let lat_ratio = (lat.abs() / 90.0).min(1.0);
        let base = (std::f64::consts::PI * lat_ratio).sin();
        let jet = (lat.to_radians() * 6.0).cos().abs();
        let temp_factor = (f64::from(Self::temperature_at(lat)) / 256.0).clamp(0.0, 1.0);

        let cells = self.fbm_on_sphere(lat + 40.0, lon - 40.0, WEATHER_SCALE);
        let detail = self.fbm_on_sphere(
            lat + cells * WEATHER_WARP,
            lon + cells * WEATHER_WARP,
            WEATHER_DETAIL_SCALE,
        );

        let cloud = (base * jet * (cells * 0.5 + 0.5) * (detail * 0.5 + 0.5) * temp_factor * 2.0)
            .clamp(0.0, 1.0);
        if cloud > CLOUD_CUTOFF {
            (cloud.powf(1.2) * 255.0) as u8
        } else {
            0
        }
    }

    /// Full surface description of a location.
    #[must_use]
    pub fn terrain_info_at(&self, lat: f64, lon: f64) -> TerrainPoint {
        let elevation = self.elevation_at(lat, lon);
        let (biome, color) = self.classify(elevation, lat, lon);
        TerrainPoint {
            lat,
            lon,
            elevation,
            biome,
            color: color.to_rgb8(),
            precipitation: self.precipitation_at(lat, lon),
            temperature: Self::temperature_at(lat),
        }
    }

    /// fBm sampled on a sphere of radius `scale`.
    fn fbm_on_sphere(&self, lat: f64, lon: f64, scale: f64) -> f64 {
        let [x, y, z] = sphere_point(lat, lon);
        self.noise.fbm3(
            x * scale,
            y * scale,
            z * scale,
            self.config.octaves,
            self.config.lacunarity,
            self.config.gain,
        )
    }
}

/// Projects a surface location onto the unit sphere.
///
/// Uses the polar angle `phi = 90° - lat` and azimuth `theta = lon + 180°`,
/// with `y` pointing at the north pole.
#[must_use]
pub fn sphere_point(lat: f64, lon: f64) -> [f64; 3] {
    let phi = (90.0 - lat).to_radians();
    let theta = (lon + 180.0).to_radians();
    [phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin()]
}
