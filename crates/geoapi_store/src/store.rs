//! # Point Store
//!
//! SQLite access layer over the `mapdata` and `regions` tables.
//!
//! ## Design
//!
//! A `PointStore` wraps exactly one connection. The server gives each worker
//! its own store, so a connection is never used from two threads at once;
//! the type is `Send` but deliberately not `Sync`.
//!
//! Every coordinate written goes through [`round2`], which makes the
//! 2-decimal grid the effective resolution of the store and keeps stored
//! keys consistent with the JSON keys built by [`geoapi_terrain::coord_key`].
//!
//! Stores written by older generators lack the `biome` column and keep
//! colours as REAL. The column set is read once when the store is opened
//! and the matching SELECT is used from then on; colours are always read
//! as floats and clamped into a byte.

use std::cell::Cell;
use std::path::{Path, PathBuf};

use geoapi_terrain::{round2, GeoBounds, Rgb8};
use rusqlite::{params, Connection, OpenFlags, Row};

use crate::error::{StoreError, StoreResult};
use crate::schema;
use crate::types::{NewRegion, PointRecord, Region};

/// Persistent point and region store.
pub struct PointStore {
    conn: Connection,
    path: Option<PathBuf>,
    has_biome: Cell<bool>,
}

impl PointStore {
    /// Opens (creating if needed) a store for reading and writing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn, path)
    }

    /// Opens an existing store without write access.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] if the file does not exist or cannot be
    /// opened.
    pub fn open_read_only(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn, path)
    }

    /// Opens a private in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn in_memory() -> StoreResult<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: None,
            has_biome: Cell::new(false),
        })
    }

    fn with_connection(conn: Connection, path: &Path) -> StoreResult<Self> {
        let has_biome = mapdata_has_biome(&conn).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), has_biome, "store opened");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
            has_biome: Cell::new(has_biome),
        })
    }

    /// Backing file, or `None` for an in-memory store.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Drops and recreates both tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is read-only or the DDL fails.
    pub fn create_schema(&self) -> StoreResult<()> {
        self.conn.execute_batch(schema::CREATE_SCHEMA)?;
        self.has_biome.set(true);
        Ok(())
    }

    /// Points inside `bounds` (inclusive on all edges), at most `limit` rows.
    ///
    /// Rows beyond `limit` are silently dropped by the query.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn query_points(&self, bounds: &GeoBounds, limit: usize) -> StoreResult<Vec<PointRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = if self.has_biome.get() {
            schema::SELECT_POINTS
        } else {
            schema::SELECT_POINTS_NO_BIOME
        };
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(
            params![bounds.lat_min, bounds.lat_max, bounds.lon_min, bounds.lon_max, limit],
            point_from_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Regions whose corner lies in `[lat_min, lat_max) × [lon_min, lon_max)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn query_regions(&self, bounds: &GeoBounds) -> StoreResult<Vec<Region>> {
        let mut stmt = self.conn.prepare_cached(schema::SELECT_REGIONS)?;
        let rows = stmt.query_map(
            params![bounds.lat_min, bounds.lat_max, bounds.lon_min, bounds.lon_max],
            |row| {
                Ok(Region {
                    id: row.get(0)?,
                    lat: row.get(1)?,
                    lon: row.get(2)?,
                    lat2: row.get(3)?,
                    lon2: row.get(4)?,
                    elevation: row.get(5)?,
                    population: row.get(6)?,
                    light_pollution: row.get(7)?,
                    name: row.get(8)?,
                })
            },
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Land points suitable for settlements: `0 < e < 0.7`, `|lat| < 60`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn land_candidates(&self) -> StoreResult<Vec<PointRecord>> {
        let sql = if self.has_biome.get() {
            schema::SELECT_LAND_CANDIDATES
        } else {
            schema::SELECT_LAND_CANDIDATES_NO_BIOME
        };
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map([], point_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Inserts points in one transaction, replacing rows on the same cell.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; nothing is committed then.
    pub fn insert_points(&mut self, points: &[PointRecord]) -> StoreResult<usize> {
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare_cached(schema::INSERT_POINT)?;
            for p in points {
                written += stmt.execute(params![
                    round2(p.lat),
                    round2(p.lon),
                    p.elevation,
                    p.color.r,
                    p.color.g,
                    p.color.b,
                    p.biome.as_deref(),
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(rows = written, "mapdata rows written");
        Ok(written)
    }

    /// Inserts regions in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails (for example a duplicate name);
    /// nothing is committed then.
    pub fn insert_regions(&mut self, regions: &[NewRegion]) -> StoreResult<usize> {
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare_cached(schema::INSERT_REGION)?;
            for r in regions {
                written += stmt.execute(params![
                    round2(r.lat),
                    round2(r.lon),
                    round2(r.lat2),
                    round2(r.lon2),
                    r.elevation,
                    r.population,
                    r.light_pollution,
                    r.name,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(rows = written, "region rows written");
        Ok(written)
    }

    /// Number of stored points.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_points(&self) -> StoreResult<u64> {
        self.count("SELECT COUNT(*) FROM mapdata")
    }

    /// Number of stored regions.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_regions(&self) -> StoreResult<u64> {
        self.count("SELECT COUNT(*) FROM regions")
    }

    fn count(&self, sql: &str) -> StoreResult<u64> {
        let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    /// Closes the connection, reporting any error SQLite returns.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Close`] if SQLite refuses to close.
    pub fn close(self) -> StoreResult<()> {
        self.conn.close().map_err(|(_, e)| StoreError::Close(e))
    }
}

impl std::fmt::Debug for PointStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointStore").field("path", &self.path).finish_non_exhaustive()
    }
}

fn point_from_row(row: &Row<'_>) -> rusqlite::Result<PointRecord> {
    Ok(PointRecord {
        lat: row.get(0)?,
        lon: row.get(1)?,
        elevation: row.get(2)?,
        color: Rgb8 {
            r: channel(row, 3)?,
            g: channel(row, 4)?,
            b: channel(row, 5)?,
        },
        biome: row.get(6)?,
    })
}

/// Reads a colour channel stored as INTEGER or REAL.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn channel(row: &Row<'_>, idx: usize) -> rusqlite::Result<u8> {
    let value: f64 = row.get(idx)?;
    Ok(value.round().clamp(0.0, 255.0) as u8)
}

fn mapdata_has_biome(conn: &Connection) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(schema::MAPDATA_COLUMNS)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name.eq_ignore_ascii_case("biome") {
            return Ok(true);
        }
    }
    Ok(false)
}
