//! Row types of the two tables.

use geoapi_terrain::Rgb8;

/// One sampled surface point (`mapdata` row).
#[derive(Clone, Debug, PartialEq)]
pub struct PointRecord {
    /// Latitude, on the 2-decimal grid.
    pub lat: f64,
    /// Longitude, on the 2-decimal grid.
    pub lon: f64,
    /// Terrain elevation.
    pub elevation: f64,
    /// Surface colour.
    pub color: Rgb8,
    /// Biome name, if the generator recorded one.
    pub biome: Option<String>,
}

/// A persisted named settlement (`regions` row).
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    /// Row id.
    pub id: i64,
    /// South-west corner latitude.
    pub lat: f64,
    /// South-west corner longitude.
    pub lon: f64,
    /// North-east corner latitude.
    pub lat2: f64,
    /// North-east corner longitude.
    pub lon2: f64,
    /// Elevation at the corner point.
    pub elevation: f64,
    /// Population density in [0, 1].
    pub population: f64,
    /// Light pollution in [0, 1].
    pub light_pollution: f64,
    /// Unique display name.
    pub name: String,
}

/// A region about to be inserted; the id is assigned by the store.
#[derive(Clone, Debug, PartialEq)]
pub struct NewRegion {
    /// South-west corner latitude.
    pub lat: f64,
    /// South-west corner longitude.
    pub lon: f64,
    /// North-east corner latitude.
    pub lat2: f64,
    /// North-east corner longitude.
    pub lon2: f64,
    /// Elevation at the corner point.
    pub elevation: f64,
    /// Population density in [0, 1].
    pub population: f64,
    /// Light pollution in [0, 1].
    pub light_pollution: f64,
    /// Unique display name.
    pub name: String,
}
