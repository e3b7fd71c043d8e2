//! SQL text for the store schema and its statements.

/// Drops and recreates both tables.
pub(crate) const CREATE_SCHEMA: &str = "
DROP TABLE IF EXISTS mapdata;
DROP TABLE IF EXISTS regions;
CREATE TABLE mapdata (
    lat REAL NOT NULL,
    lon REAL NOT NULL,
    elevation REAL NOT NULL,
    r INTEGER NOT NULL,
    g INTEGER NOT NULL,
    b INTEGER NOT NULL,
    biome TEXT,
    PRIMARY KEY (lat, lon)
);
CREATE TABLE regions (
    id INTEGER PRIMARY KEY,
    lat REAL NOT NULL,
    lon REAL NOT NULL,
    lat2 REAL NOT NULL,
    lon2 REAL NOT NULL,
    elevation REAL NOT NULL,
    population REAL NOT NULL,
    light_pollution REAL NOT NULL,
    name TEXT NOT NULL UNIQUE
);
CREATE INDEX regions_lat_lon ON regions (lat, lon);
";

pub(crate) const SELECT_POINTS: &str = "
SELECT lat, lon, elevation, r, g, b, biome FROM mapdata
WHERE lat BETWEEN ?1 AND ?2 AND lon BETWEEN ?3 AND ?4
LIMIT ?5";

/// Same as [`SELECT_POINTS`] for tables written without a `biome` column.
pub(crate) const SELECT_POINTS_NO_BIOME: &str = "
SELECT lat, lon, elevation, r, g, b, NULL FROM mapdata
WHERE lat BETWEEN ?1 AND ?2 AND lon BETWEEN ?3 AND ?4
LIMIT ?5";

pub(crate) const SELECT_REGIONS: &str = "
SELECT id, lat, lon, lat2, lon2, elevation, population, light_pollution, name FROM regions
WHERE lat >= ?1 AND lat < ?2 AND lon >= ?3 AND lon < ?4";

pub(crate) const SELECT_LAND_CANDIDATES: &str = "
SELECT lat, lon, elevation, r, g, b, biome FROM mapdata
WHERE elevation > 0 AND elevation < 0.7 AND lat > -60 AND lat < 60";

pub(crate) const SELECT_LAND_CANDIDATES_NO_BIOME: &str = "
SELECT lat, lon, elevation, r, g, b, NULL FROM mapdata
WHERE elevation > 0 AND elevation < 0.7 AND lat > -60 AND lat < 60";

/// Column names of `mapdata`, second field of each row.
pub(crate) const MAPDATA_COLUMNS: &str = "PRAGMA table_info(mapdata)";

pub(crate) const INSERT_POINT: &str = "
INSERT OR REPLACE INTO mapdata (lat, lon, elevation, r, g, b, biome)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

pub(crate) const INSERT_REGION: &str = "
INSERT INTO regions (lat, lon, lat2, lon2, elevation, population, light_pollution, name)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";
