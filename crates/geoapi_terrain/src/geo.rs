//! # Geographic Helpers
//!
//! Bounding boxes in degrees and the 2-decimal coordinate grid shared by the
//! store, the JSON keys and the tile cache names.

/// Latitude limit in degrees.
pub const LAT_LIMIT: f64 = 90.0;
/// Longitude limit in degrees.
pub const LON_LIMIT: f64 = 180.0;

/// A latitude/longitude box, always normalized.
///
/// Construct it with [`GeoBounds::normalized`]; the result satisfies
/// `-90 <= lat_min <= lat_max <= 90` and `-180 <= lon_min <= lon_max <= 180`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoBounds {
    /// Southern edge.
    pub lat_min: f64,
    /// Northern edge.
    pub lat_max: f64,
    /// Western edge.
    pub lon_min: f64,
    /// Eastern edge.
    pub lon_max: f64,
}

impl GeoBounds {
    /// The whole planet.
    pub const GLOBE: Self = Self {
        lat_min: -LAT_LIMIT,
        lat_max: LAT_LIMIT,
        lon_min: -LON_LIMIT,
        lon_max: LON_LIMIT,
    };

    /// Clamps each edge into range and swaps inverted pairs.
    ///
    /// Inputs must be finite; non-finite values are rejected upstream by
    /// the query parser.
    #[must_use]
    pub fn normalized(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Self {
        let mut lat_min = lat_min.clamp(-LAT_LIMIT, LAT_LIMIT);
        let mut lat_max = lat_max.clamp(-LAT_LIMIT, LAT_LIMIT);
        let mut lon_min = lon_min.clamp(-LON_LIMIT, LON_LIMIT);
        let mut lon_max = lon_max.clamp(-LON_LIMIT, LON_LIMIT);

        if lat_min > lat_max {
            std::mem::swap(&mut lat_min, &mut lat_max);
        }
        if lon_min > lon_max {
            std::mem::swap(&mut lon_min, &mut lon_max);
        }

        Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        }
    }

    /// Latitude extent in degrees.
    #[must_use]
    pub fn lat_span(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    /// Longitude extent in degrees.
    #[must_use]
    pub fn lon_span(&self) -> f64 {
        self.lon_max - self.lon_min
    }

    /// True when either axis has zero extent.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.lat_min >= self.lat_max || self.lon_min >= self.lon_max
    }
}

impl Default for GeoBounds {
    fn default() -> Self {
        Self::GLOBE
    }
}

/// Rounds a coordinate to the 2-decimal storage grid.
#[inline]
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Formats the `"lat,lon"` key used by every JSON point map.
///
/// ```rust
/// assert_eq!(geoapi_terrain::coord_key(12.345, -7.891), "12.35,-7.89");
/// ```
#[must_use]
pub fn coord_key(lat: f64, lon: f64) -> String {
    format!("{:.2},{:.2}", round2(lat), round2(lon))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamps_out_of_range() {
        let b = GeoBounds::normalized(-120.0, 95.0, -400.0, 181.0);
        assert_eq!(b, GeoBounds::GLOBE);
    }

    #[test]
    fn test_swaps_inverted() {
        let b = GeoBounds::normalized(40.0, 10.0, 30.0, -30.0);
        assert_eq!(b.lat_min, 10.0);
        assert_eq!(b.lat_max, 40.0);
        assert_eq!(b.lon_min, -30.0);
        assert_eq!(b.lon_max, 30.0);
    }

    #[test]
    fn test_normalized_invariant_grid() {
        let values = [-500.0, -180.0, -91.0, -45.5, 0.0, 12.25, 89.9, 90.0, 179.0, 360.0];
        for &a in &values {
            for &b in &values {
                let g = GeoBounds::normalized(a, b, b, a);
                assert!(-90.0 <= g.lat_min && g.lat_min <= g.lat_max && g.lat_max <= 90.0);
                assert!(-180.0 <= g.lon_min && g.lon_min <= g.lon_max && g.lon_max <= 180.0);
            }
        }
    }

    #[test]
    fn test_degenerate() {
        assert!(GeoBounds::normalized(5.0, 5.0, 0.0, 10.0).is_degenerate());
        assert!(!GeoBounds::GLOBE.is_degenerate());
    }

    #[test]
    fn test_coord_key() {
        assert_eq!(coord_key(12.345, -7.891), "12.35,-7.89");
        assert_eq!(coord_key(0.0, 180.0), "0.00,180.00");
        assert_eq!(coord_key(-89.999, 0.5), "-90.00,0.50");
    }
}
