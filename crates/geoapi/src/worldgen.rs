//! # Offline World Generator
//!
//! Fills the point store the server reads at runtime.
//!
//! ## Passes
//!
//! 1. Recreate the schema
//! 2. Sample the globe on a regular grid into `mapdata`
//! 3. Draw land cells at random and insert them as named `regions`
//!
//! Both passes are single transactions. The region draw is seeded, so the
//! same terrain seed and region seed always give the same database.

use std::time::Instant;

use geoapi_store::{NewRegion, PointRecord, PointStore};
use geoapi_terrain::{round2, TerrainSynthesizer, LAT_LIMIT, LON_LIMIT};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{AppError, AppResult};
use crate::naming::RegionNameComposer;

/// Side of a region cell in degrees.
pub const REGION_SPAN: f64 = 0.5;

/// Generator settings.
#[derive(Clone, Debug, PartialEq)]
pub struct WorldGenOptions {
    /// Grid spacing in degrees.
    pub grid_step: f64,
    /// Regions to draw; capped at the number of land cells.
    pub regions: usize,
    /// Seed for the region draw.
    pub region_seed: u64,
}

impl Default for WorldGenOptions {
    fn default() -> Self {
        Self {
            grid_step: 0.5,
            regions: 2000,
            region_seed: 0x5EED,
        }
    }
}

impl WorldGenOptions {
    /// Checks that the grid step is usable.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidOption`] for a non-finite, non-positive
    /// or larger-than-the-globe step.
    pub fn validate(&self) -> AppResult<()> {
        if !self.grid_step.is_finite() || self.grid_step <= 0.0 || self.grid_step > LAT_LIMIT {
            return Err(AppError::InvalidOption(format!(
                "grid step must be in (0, {LAT_LIMIT}], got {}",
                self.grid_step
            )));
        }
        Ok(())
    }
}

/// What a generation run wrote.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenerationReport {
    /// Rows written to `mapdata`.
    pub points: usize,
    /// Land cells eligible for regions.
    pub candidates: usize,
    /// Rows written to `regions`.
    pub regions: usize,
}

/// Runs every pass against `store`.
///
/// # Errors
///
/// Returns an error for invalid options, store failures, or when the name
/// space runs out.
pub fn generate_world(
    terrain: &TerrainSynthesizer,
    store: &mut PointStore,
    options: &WorldGenOptions,
) -> AppResult<GenerationReport> {
    options.validate()?;
    store.create_schema()?;

    let started = Instant::now();
    let points = sample_grid(terrain, options.grid_step);
    let written = store.insert_points(&points)?;
    tracing::info!(
        target: "geoapi::system",
        client = "-",
        points = written,
        elapsed_ms = elapsed_ms(started),
        "mapdata written"
    );

    let started = Instant::now();
    let candidates = store.land_candidates()?;
    let mut rng = ChaCha8Rng::seed_from_u64(options.region_seed);
    let regions = draw_regions(&candidates, options.regions, &mut rng)?;
    let inserted = store.insert_regions(&regions)?;
    tracing::info!(
        target: "geoapi::system",
        client = "-",
        candidates = candidates.len(),
        regions = inserted,
        elapsed_ms = elapsed_ms(started),
        "regions written"
    );

    Ok(GenerationReport {
        points: written,
        candidates: candidates.len(),
        regions: inserted,
    })
}

/// Samples the globe, north to south and west to east.
#[must_use]
pub fn sample_grid(terrain: &TerrainSynthesizer, step: f64) -> Vec<PointRecord> {
    let rows = (2.0 * LAT_LIMIT / step).floor() as usize + 1;
    let cols = (2.0 * LON_LIMIT / step).floor() as usize + 1;
    let mut points = Vec::with_capacity(rows * cols);

    for i in 0..rows {
        let lat = LAT_LIMIT - i as f64 * step;
        for j in 0..cols {
            let lon = -LON_LIMIT + j as f64 * step;
            let info = terrain.terrain_info_at(lat, lon);
            points.push(PointRecord {
                lat,
                lon,
                elevation: info.elevation,
                color: info.color,
                biome: Some(info.biome.as_str().to_owned()),
            });
        }
    }
    points
}

/// Picks up to `count` distinct candidates and turns them into named
/// regions.
///
/// # Errors
///
/// Returns [`AppError::NamesExhausted`] if more regions are asked for than
/// there are names.
pub fn draw_regions<R: Rng + ?Sized>(
    candidates: &[PointRecord],
    count: usize,
    rng: &mut R,
) -> AppResult<Vec<NewRegion>> {
    let amount = count.min(candidates.len());
    let mut names = RegionNameComposer::new();
    let mut regions = Vec::with_capacity(amount);

    for picked in index::sample(rng, candidates.len(), amount) {
        let cell = &candidates[picked];
        let (lat, lon) = (round2(cell.lat), round2(cell.lon));
        regions.push(NewRegion {
            lat,
            lon,
            lat2: lat + REGION_SPAN,
            lon2: lon + REGION_SPAN,
            elevation: cell.elevation,
            population: unit_share(rng),
            light_pollution: unit_share(rng),
            name: names.compose(rng)?,
        });
    }
    Ok(regions)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Uniform in [0.1, 1.0], rounded to 3 decimals.
fn unit_share<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    (rng.gen_range(0.1..=1.0_f64) * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoapi_terrain::{Rgb8, TerrainConfig};

    fn candidate(lat: f64, lon: f64) -> PointRecord {
        PointRecord {
            lat,
            lon,
            elevation: 0.2,
            color: Rgb8 { r: 0, g: 0, b: 0 },
            biome: None,
        }
    }

    #[test]
    fn test_grid_order_and_size() {
        let terrain = TerrainSynthesizer::init(TerrainConfig::default()).unwrap();
        let points = sample_grid(&terrain, 30.0);
        assert_eq!(points.len(), 7 * 13);
        assert_eq!((points[0].lat, points[0].lon), (90.0, -180.0));
        assert_eq!((points[1].lat, points[1].lon), (90.0, -150.0));
        let last = points.last().unwrap();
        assert_eq!((last.lat, last.lon), (-90.0, 180.0));
        assert!(points.iter().all(|p| p.biome.is_some()));
    }

    #[test]
    fn test_draw_is_capped_and_distinct() {
        let candidates: Vec<_> = (0..10).map(|i| candidate(f64::from(i), 1.234)).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let regions = draw_regions(&candidates, 50, &mut rng).unwrap();
        assert_eq!(regions.len(), 10);

        let mut lats: Vec<_> = regions.iter().map(|r| r.lat as i64).collect();
        lats.sort_unstable();
        lats.dedup();
        assert_eq!(lats.len(), 10);

        for region in &regions {
            assert!((region.lon - 1.23).abs() < 1e-9);
            assert!((region.lat2 - region.lat - REGION_SPAN).abs() < 1e-9);
            assert!((region.lon2 - region.lon - REGION_SPAN).abs() < 1e-9);
            for share in [region.population, region.light_pollution] {
                assert!((0.1..=1.0).contains(&share));
                assert!(((share * 1000.0).round() - share * 1000.0).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_draw_is_seeded() {
        let candidates: Vec<_> = (0..100).map(|i| candidate(f64::from(i) * 0.5, 0.0)).collect();
        let run = || draw_regions(&candidates, 20, &mut ChaCha8Rng::seed_from_u64(7)).unwrap();
        assert_eq!(run(), run());
    }

    #[test]
    fn test_generate_into_memory_store() {
        let terrain = TerrainSynthesizer::init(TerrainConfig::default()).unwrap();
        let mut store = PointStore::in_memory().unwrap();
        let options = WorldGenOptions {
            grid_step: 5.0,
            regions: 25,
            region_seed: 1,
        };
        let report = generate_world(&terrain, &mut store, &options).unwrap();

        assert_eq!(report.points, 37 * 73);
        assert_eq!(store.count_points().unwrap(), 37 * 73);
        assert_eq!(report.regions, report.candidates.min(25));
        assert_eq!(store.count_regions().unwrap(), report.regions as u64);
    }

    #[test]
    fn test_bad_step_rejected() {
        for grid_step in [0.0, -1.0, f64::NAN, 200.0] {
            let options = WorldGenOptions {
                grid_step,
                ..WorldGenOptions::default()
            };
            assert!(matches!(options.validate(), Err(AppError::InvalidOption(_))));
        }
    }
}
