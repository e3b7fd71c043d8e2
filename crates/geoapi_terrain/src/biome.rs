//! # Biome Classification
//!
//! Maps an elevation sample plus a cold-zone flag to a biome and a colour.
//!
//! The thresholds form an ordered ladder evaluated top to bottom; the first
//! match wins. Each threshold is the exclusive upper bound of the bucket it
//! closes and the inclusive lower bound of the next one, so a value sitting
//! exactly on a threshold lands in the bucket that starts there (`-0.05` is
//! shore, not ocean).
//!
//! | elevation       | warm       | cold    |
//! |-----------------|------------|---------|
//! | `< -0.05`       | ocean      | ocean   |
//! | `< 0.0`         | shore      | shore   |
//! | `< 0.4`         | grassland  | tundra  |
//! | `< 0.88`        | mountain   | iceland |
//! | otherwise       | icecap     | icecap  |

use std::fmt;

/// Upper bound (exclusive) of the ocean bucket.
pub const OCEAN_BELOW: f64 = -0.05;
/// Upper bound (exclusive) of the shore bucket.
pub const SHORE_BELOW: f64 = 0.0;
/// Upper bound (exclusive) of the lowland bucket.
pub const LOWLAND_BELOW: f64 = 0.4;
/// Upper bound (exclusive) of the highland bucket.
pub const HIGHLAND_BELOW: f64 = 0.88;

/// Biome types on the planet surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Biome {
    /// Open water.
    Ocean = 0,
    /// Coastline just below sea level.
    Shore = 1,
    /// Temperate lowland.
    Grassland = 2,
    /// Cold lowland.
    Tundra = 3,
    /// Temperate highland.
    Mountain = 4,
    /// Cold highland.
    Iceland = 5,
    /// Highest peaks, regardless of latitude.
    Icecap = 6,
}

impl Biome {
    /// All biomes in ladder order.
    pub const ALL: [Self; 7] = [
        Self::Ocean,
        Self::Shore,
        Self::Grassland,
        Self::Tundra,
        Self::Mountain,
        Self::Iceland,
        Self::Icecap,
    ];

    /// Picks the biome for an elevation.
    ///
    /// Total over every `f64`: NaN falls through to `Icecap` like any
    /// value that fails all the `<` tests.
    #[must_use]
    pub fn from_elevation(elevation: f64, cold: bool) -> Self {
        if elevation < OCEAN_BELOW {
            Self::Ocean
        } else if elevation < SHORE_BELOW {
            Self::Shore
        } else if elevation < LOWLAND_BELOW {
            if cold { Self::Tundra } else { Self::Grassland }
        } else if elevation < HIGHLAND_BELOW {
            if cold { Self::Iceland } else { Self::Mountain }
        } else {
            Self::Icecap
        }
    }

    /// Lower-case name, as stored in the `mapdata.biome` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ocean => "ocean",
            Self::Shore => "shore",
            Self::Grassland => "grassland",
            Self::Tundra => "tundra",
            Self::Mountain => "mountain",
            Self::Iceland => "iceland",
            Self::Icecap => "icecap",
        }
    }

    /// Returns true for biomes below sea level.
    #[must_use]
    pub const fn is_water(self) -> bool {
        matches!(self, Self::Ocean | Self::Shore)
    }

    /// Surface colour of this biome at the given elevation.
    ///
    /// Grassland and mountain are graded with elevation; the rest are flat.
    #[must_use]
    pub fn color(self, elevation: f64) -> Color {
        match self {
            Self::Ocean => Color::new(0.0, 0.4, 0.8),
            Self::Shore => Color::new(0.9, 0.8, 0.6),
            Self::Tundra => Color::new(0.85, 0.88, 0.85),
            Self::Grassland => {
                let t = (elevation / LOWLAND_BELOW).clamp(0.0, 1.0);
                Color::new(0.1, 0.7 - 0.3 * t, 0.2 - 0.1 * t)
            }
            Self::Iceland => Color::new(0.7, 0.7, 0.9),
            Self::Mountain => {
                let t = ((elevation - LOWLAND_BELOW) / (HIGHLAND_BELOW - LOWLAND_BELOW))
                    .clamp(0.0, 1.0);
                let gray = 0.45 + 0.4 * t;
                Color::new(gray, gray, gray)
            }
            Self::Icecap => Color::new(0.95, 0.95, 0.95),
        }
    }
}

impl fmt::Display for Biome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Linear RGB colour with channels in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    /// Red channel.
    pub r: f64,
    /// Green channel.
    pub g: f64,
    /// Blue channel.
    pub b: f64,
}

impl Color {
    /// Creates a colour from unit-range channels.
    #[must_use]
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Converts to 8-bit channels.
    #[must_use]
    pub fn to_rgb8(self) -> Rgb8 {
        Rgb8 {
            r: unit_to_byte(self.r),
            g: unit_to_byte(self.g),
            b: unit_to_byte(self.b),
        }
    }
}

/// 8-bit RGB colour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgb8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb8 {
    /// Channels as an array, in RGB order.
    #[must_use]
    pub const fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

#[inline]
fn unit_to_byte(value: f64) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}
