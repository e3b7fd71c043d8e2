//! # Terrain Quality Tests
//!
//! Whole-planet checks: determinism across engines, a plausible land/ocean
//! split, biome/colour agreement and climate ranges.

use geoapi_terrain::{Biome, TerrainConfig, TerrainSynthesizer};

fn engine(seed: u64) -> TerrainSynthesizer {
    let config = TerrainConfig { seed, ..TerrainConfig::default() };
    TerrainSynthesizer::init(config).expect("default config is valid")
}

/// Every 5° grid point, lat from 90 down, lon from -180.
fn globe_grid() -> impl Iterator<Item = (f64, f64)> {
    (0..=36).flat_map(|i| {
        let lat = 90.0 - f64::from(i) * 5.0;
        (0..=72).map(move |j| (lat, -180.0 + f64::from(j) * 5.0))
    })
}

#[test]
fn test_same_seed_same_planet() {
    let a = engine(7);
    let b = engine(7);
    for (lat, lon) in globe_grid() {
        assert_eq!(a.terrain_info_at(lat, lon), b.terrain_info_at(lat, lon));
    }
}

#[test]
fn test_different_seed_different_planet() {
    let a = engine(7);
    let b = engine(8);
    let differing = globe_grid()
        .filter(|&(lat, lon)| (a.elevation_at(lat, lon) - b.elevation_at(lat, lon)).abs() > 1e-6)
        .count();
    assert!(differing > 100, "only {differing} points differ between seeds");
}

#[test]
fn test_land_and_water_both_present() {
    let terrain = engine(42);
    let (mut water, mut land) = (0usize, 0usize);
    for (lat, lon) in globe_grid() {
        if terrain.terrain_info_at(lat, lon).biome.is_water() {
            water += 1;
        } else {
            land += 1;
        }
    }
    assert!(water > 0, "planet has no water");
    assert!(land > 0, "planet has no land");
}

#[test]
fn test_elevation_stays_bounded() {
    let terrain = engine(42);
    for (lat, lon) in globe_grid() {
        let e = terrain.elevation_at(lat, lon);
        assert!(e.is_finite());
        assert!(e.abs() < 2.5, "fBm with gain 0.5 stays near [-2, 2], got {e}");
    }
}

#[test]
fn test_point_biome_matches_classifier() {
    let terrain = engine(3);
    for (lat, lon) in globe_grid() {
        let point = terrain.terrain_info_at(lat, lon);
        let (biome, color) = terrain.classify(point.elevation, lat, lon);
        assert_eq!(point.biome, biome);
        assert_eq!(point.color, color.to_rgb8());
        assert_eq!(point.biome, Biome::from_elevation(point.elevation, terrain.cold_zone(lat, lon)));
    }
}

#[test]
fn test_no_temperate_biomes_near_poles() {
    let terrain = engine(11);
    for j in 0..=72 {
        let lon = -180.0 + f64::from(j) * 5.0;
        for lat in [88.0, -88.0] {
            let biome = terrain.terrain_info_at(lat, lon).biome;
            assert!(
                !matches!(biome, Biome::Grassland | Biome::Mountain),
                "{biome} at lat {lat}"
            );
        }
    }
}

#[test]
fn test_climate_bytes_follow_latitude() {
    let terrain = engine(5);
    let mut wet_points = 0usize;
    for (lat, lon) in globe_grid() {
        let point = terrain.terrain_info_at(lat, lon);
        assert_eq!(point.temperature, TerrainSynthesizer::temperature_at(lat));
        if point.precipitation > 0 {
            wet_points += 1;
        }
    }
    assert!(wet_points > 0, "no precipitation anywhere on the planet");
}
