//! # File-backed Store Tests
//!
//! Writes a store to disk the way the generator does, then reopens it
//! read-only the way each server worker does.

use std::path::PathBuf;

use geoapi_store::{NewRegion, PointRecord, PointStore, StoreError};
use geoapi_terrain::{GeoBounds, Rgb8};

fn temp_store_path(tag: &str) -> PathBuf {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("test_geoapi_store_{tag}_{id}.sqlite"))
}

fn grid_points() -> Vec<PointRecord> {
    let mut points = Vec::new();
    for i in 0..10 {
        for j in 0..10 {
            points.push(PointRecord {
                lat: f64::from(i) * 0.5,
                lon: f64::from(j) * 0.5,
                elevation: f64::from(i + j) * 0.01,
                color: Rgb8 { r: 1, g: 2, b: 3 },
                biome: None,
            });
        }
    }
    points
}

#[test]
fn test_write_then_read_only() {
    let path = temp_store_path("rw");
    {
        let mut store = PointStore::open(&path).unwrap();
        store.create_schema().unwrap();
        assert_eq!(store.insert_points(&grid_points()).unwrap(), 100);
        store
            .insert_regions(&[NewRegion {
                lat: 1.0,
                lon: 1.0,
                lat2: 1.5,
                lon2: 1.5,
                elevation: 0.02,
                population: 0.4,
                light_pollution: 0.9,
                name: "Kalenmere".to_owned(),
            }])
            .unwrap();
        store.close().unwrap();
    }

    let reader = PointStore::open_read_only(&path).unwrap();
    assert_eq!(reader.path(), Some(path.as_path()));
    assert_eq!(reader.count_points().unwrap(), 100);

    let window = GeoBounds::normalized(0.0, 1.0, 0.0, 1.0);
    assert_eq!(reader.query_points(&window, 50_000).unwrap().len(), 9);

    let regions = reader.query_regions(&GeoBounds::GLOBE).unwrap();
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].name, "Kalenmere");
    assert_eq!(regions[0].lat2, 1.5);

    // Read-only connections reject writes
    assert!(reader.create_schema().is_err());
    reader.close().unwrap();

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_missing_file_fails_read_only_open() {
    let path = temp_store_path("missing");
    match PointStore::open_read_only(&path) {
        Err(StoreError::Open { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected open error, got {other:?}"),
    }
}

#[test]
fn test_reads_store_without_biome_column() {
    let path = temp_store_path("legacy");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE mapdata (lat REAL, lon REAL, elevation REAL, r REAL, g REAL, b REAL);
             INSERT INTO mapdata VALUES (12.5, -7.5, 0.3, 10.4, 199.6, 300.0);
             INSERT INTO mapdata VALUES (75.0, 0.0, 0.3, -4.0, 0.0, 0.0);",
        )
        .unwrap();
        conn.close().unwrap();
    }

    let store = PointStore::open_read_only(&path).unwrap();
    let rows = store.query_points(&GeoBounds::GLOBE, 10).unwrap();
    assert_eq!(rows.len(), 2);
    let row = rows.iter().find(|p| p.lat == 12.5).unwrap();
    assert_eq!(row.lon, -7.5);
    assert_eq!(row.color, Rgb8 { r: 10, g: 200, b: 255 });
    assert_eq!(row.biome, None);
    let north = rows.iter().find(|p| p.lat == 75.0).unwrap();
    assert_eq!(north.color.r, 0, "negative channels clamp to zero");

    let candidates = store.land_candidates().unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].biome, None);
    store.close().unwrap();

    // Rewriting the schema through the store brings the column back
    let store = PointStore::open(&path).unwrap();
    store.create_schema().unwrap();
    assert!(store.query_points(&GeoBounds::GLOBE, 10).unwrap().is_empty());
    store.close().unwrap();

    std::fs::remove_file(&path).ok();
}
