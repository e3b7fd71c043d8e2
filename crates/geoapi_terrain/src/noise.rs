//! # Noise Field
//!
//! Deterministic gradient noise used by the terrain synthesizer.
//!
//! - `sample3`: improved Perlin noise over R³, evaluated on the sphere
//!   surface for elevation and weather.
//! - `sample2`: 2D simplex noise, only used for secondary jitter.
//!
//! ## Determinism Guarantee
//!
//! Given the same `WorldSeed`, every sample is bit-identical on every run.
//! The permutation table is the only state and it is never mutated after
//! construction, so a `NoiseField` can be shared across threads freely.

use crate::error::{TerrainError, TerrainResult};

/// World seed for deterministic generation.
///
/// All procedural generation derives from this seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorldSeed(u64);

impl WorldSeed {
    /// Creates a new world seed.
    #[inline]
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Returns the raw seed value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Derives a sub-seed for a specific purpose (e.g., jitter noise).
    ///
    /// Uses a hash function to create independent streams from one seed.
    #[inline]
    #[must_use]
    pub const fn derive(self, purpose: u64) -> Self {
        let mut hash = self.0;
        hash ^= purpose;
        hash = hash.wrapping_mul(0x517c_c1b7_2722_0a95);
        hash ^= hash >> 32;
        Self(hash)
    }
}

impl Default for WorldSeed {
    fn default() -> Self {
        Self(0x6E0A_F1E1_D5EE_D001)
    }
}

/// Number of distinct lattice hashes.
const PERM_SIZE: usize = 256;

/// Pre-computed permutation table for noise.
///
/// Built once from the seed and reused for every sample.
struct PermutationTable {
    /// 512 entries (256 shuffled, doubled to avoid index wrapping).
    perm: Box<[u8]>,
}

impl PermutationTable {
    /// 12 gradient vectors for 2D simplex.
    const GRAD2: [[i8; 2]; 12] = [
        [1, 0], [1, 1], [0, 1], [-1, 1],
        [-1, 0], [-1, -1], [0, -1], [1, -1],
        [1, 0], [0, 1], [-1, 0], [0, -1],
    ];

    /// Creates a new permutation table from a seed.
    fn new(seed: WorldSeed) -> TerrainResult<Self> {
        let mut perm = Vec::new();
        perm.try_reserve_exact(PERM_SIZE * 2)
            .map_err(|e| TerrainError::Allocation(format!("permutation table: {e}")))?;

        perm.extend((0..PERM_SIZE).map(|i| i as u8));

        // Fisher-Yates shuffle driven by xorshift64; the state must be nonzero
        let mut rng_state = seed.derive(0x9E37_79B9_7F4A_7C15).value() | 1;
        for i in (1..PERM_SIZE).rev() {
            rng_state ^= rng_state << 13;
            rng_state ^= rng_state >> 7;
            rng_state ^= rng_state << 17;

            let j = (rng_state as usize) % (i + 1);
            perm.swap(i, j);
        }

        perm.extend_from_within(..PERM_SIZE);

        Ok(Self {
            perm: perm.into_boxed_slice(),
        })
    }

    /// Gets a permutation value (with automatic wrapping).
    #[inline]
    fn get(&self, index: usize) -> u8 {
        self.perm[index & 511]
    }

    /// Gets a 2D gradient for a given hash.
    #[inline]
    fn gradient2(hash: u8) -> [i8; 2] {
        Self::GRAD2[(hash % 12) as usize]
    }
}

/// Deterministic, continuous scalar noise over R² and R³.
///
/// # Example
///
/// ```rust
/// use geoapi_terrain::{NoiseField, WorldSeed};
///
/// let field = NoiseField::new(WorldSeed::new(42)).unwrap();
/// let a = field.sample3(0.3, 1.7, -2.2);
/// let b = field.sample3(0.3, 1.7, -2.2);
/// assert_eq!(a.to_bits(), b.to_bits());
/// ```
pub struct NoiseField {
    perm_table: PermutationTable,
}

impl NoiseField {
    /// Skewing factor for 2D simplex grid.
    const F2: f64 = 0.366_025_403_784_439; // (sqrt(3) - 1) / 2
    /// Unskewing factor for 2D simplex grid.
    const G2: f64 = 0.211_324_865_405_187; // (3 - sqrt(3)) / 6

    /// Builds the noise tables for a seed.
    ///
    /// # Errors
    ///
    /// Returns [`TerrainError::Allocation`] if the tables cannot be allocated.
    pub fn new(seed: WorldSeed) -> TerrainResult<Self> {
        Ok(Self {
            perm_table: PermutationTable::new(seed)?,
        })
    }

    /// Samples 3D improved Perlin noise.
    ///
    /// Returns a value in roughly [-1, 1].
    #[must_use]
    pub fn sample3(&self, x: f64, y: f64, z: f64) -> f64 {
        let fx = fast_floor(x);
        let fy = fast_floor(y);
        let fz = fast_floor(z);

        let xf = x - f64::from(fx);
        let yf = y - f64::from(fy);
        let zf = z - f64::from(fz);

        let xi = (fx & 255) as usize;
        let yi = (fy & 255) as usize;
        let zi = (fz & 255) as usize;

        let u = fade(xf);
        let v = fade(yf);
        let w = fade(zf);

        let p = &self.perm_table;
        let a = p.get(xi) as usize + yi;
        let aa = p.get(a) as usize + zi;
        let ab = p.get(a + 1) as usize + zi;
        let b = p.get(xi + 1) as usize + yi;
        let ba = p.get(b) as usize + zi;
        let bb = p.get(b + 1) as usize + zi;

        lerp(
            w,
            lerp(
                v,
                lerp(u, grad3(p.get(aa), xf, yf, zf), grad3(p.get(ba), xf - 1.0, yf, zf)),
                lerp(
                    u,
                    grad3(p.get(ab), xf, yf - 1.0, zf),
                    grad3(p.get(bb), xf - 1.0, yf - 1.0, zf),
                ),
            ),
            lerp(
                v,
                lerp(
                    u,
                    grad3(p.get(aa + 1), xf, yf, zf - 1.0),
                    grad3(p.get(ba + 1), xf - 1.0, yf, zf - 1.0),
                ),
                lerp(
                    u,
                    grad3(p.get(ab + 1), xf, yf - 1.0, zf - 1.0),
                    grad3(p.get(bb + 1), xf - 1.0, yf - 1.0, zf - 1.0),
                ),
            ),
        )
    }

    /// Samples 2D simplex noise.
    ///
    /// Returns a value in the range [-1, 1].
    #[must_use]
    pub fn sample2(&self, x: f64, y: f64) -> f64 {
        // Skew input coordinates to simplex grid
        let skew = (x + y) * Self::F2;
        let i = fast_floor(x + skew);
        let j = fast_floor(y + skew);

        let unskew = f64::from(i + j) * Self::G2;
        let x0 = x - (f64::from(i) - unskew);
        let y0 = y - (f64::from(j) - unskew);

        // Upper or lower triangle
        let (i1, j1) = if x0 > y0 { (1, 0) } else { (0, 1) };

        let x1 = x0 - f64::from(i1) + Self::G2;
        let y1 = y0 - f64::from(j1) + Self::G2;
        let x2 = x0 - 1.0 + 2.0 * Self::G2;
        let y2 = y0 - 1.0 + 2.0 * Self::G2;

        let ii = (i & 255) as usize;
        let jj = (j & 255) as usize;
        let p = &self.perm_table;

        let gi0 = p.get(ii + p.get(jj) as usize);
        let gi1 = p.get(ii + i1 as usize + p.get(jj + j1 as usize) as usize);
        let gi2 = p.get(ii + 1 + p.get(jj + 1) as usize);

        let n0 = Self::contribution(x0, y0, gi0);
        let n1 = Self::contribution(x1, y1, gi1);
        let n2 = Self::contribution(x2, y2, gi2);

        // 70.0 normalizes the output to [-1, 1]
        70.0 * (n0 + n1 + n2)
    }

    #[inline]
    fn contribution(x: f64, y: f64, gradient_index: u8) -> f64 {
        let t = 0.5 - x * x - y * y;
        if t < 0.0 {
            0.0
        } else {
            let grad = PermutationTable::gradient2(gradient_index);
            let t2 = t * t;
            t2 * t2 * (x * f64::from(grad[0]) + y * f64::from(grad[1]))
        }
    }

    /// Fractal Brownian motion over `sample3`.
    ///
    /// Computes `Σ_{i<octaves} sample3(p·lacunarity^i)·gain^i`. The sum is
    /// not normalized; callers tune their thresholds against the raw value.
    #[must_use]
    pub fn fbm3(&self, x: f64, y: f64, z: f64, octaves: u32, lacunarity: f64, gain: f64) -> f64 {
        let mut value = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;

        for _ in 0..octaves {
            value += self.sample3(x * frequency, y * frequency, z * frequency) * amplitude;
            frequency *= lacunarity;
            amplitude *= gain;
        }

        value
    }
}

/// Quintic fade curve `6t^5 - 15t^4 + 10t^3`.
#[inline]
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

/// Picks one of the 12 cube-edge gradients from the low hash bits.
#[inline]
fn grad3(hash: u8, x: f64, y: f64, z: f64) -> f64 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        z
    };
    (if h & 1 == 0 { u } else { -u }) + (if h & 2 == 0 { v } else { -v })
}

/// Fast floor function.
#[inline]
fn fast_floor(x: f64) -> i32 {
    let xi = x as i32;
    if x < f64::from(xi) { xi - 1 } else { xi }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(seed: u64) -> NoiseField {
        NoiseField::new(WorldSeed::new(seed)).unwrap()
    }

    #[test]
    fn test_determinism() {
        let noise1 = field(12345);
        let noise2 = field(12345);

        for i in 0..100 {
            let x = f64::from(i) * 0.1;
            let y = f64::from(i) * 0.17;
            let z = f64::from(i) * -0.23;
            assert_eq!(noise1.sample3(x, y, z).to_bits(), noise2.sample3(x, y, z).to_bits());
            assert_eq!(noise1.sample2(x, y).to_bits(), noise2.sample2(x, y).to_bits());
        }
    }

    #[test]
    fn test_different_seeds_different_results() {
        let noise1 = field(1);
        let noise2 = field(2);

        let differs = (0..50).any(|i| {
            let x = f64::from(i) * 0.37 + 0.11;
            noise1.sample3(x, x * 0.5, -x) != noise2.sample3(x, x * 0.5, -x)
        });
        assert!(differs, "Different seeds should produce different fields");
    }

    #[test]
    fn test_range() {
        let noise = field(42);

        for i in 0..10_000 {
            let x = f64::from(i) * 0.1 - 500.0;
            let y = f64::from(i) * 0.13 - 650.0;
            let z = f64::from(i) * 0.07 - 300.0;

            let v3 = noise.sample3(x, y, z);
            assert!((-1.1..=1.1).contains(&v3), "sample3 {v3} out of range at ({x}, {y}, {z})");

            let v2 = noise.sample2(x, y);
            assert!((-1.0..=1.0).contains(&v2), "sample2 {v2} out of range at ({x}, {y})");
        }
    }

    #[test]
    fn test_zero_at_lattice_points() {
        let noise = field(7);
        assert_eq!(noise.sample3(3.0, -4.0, 5.0), 0.0);
    }

    #[test]
    fn test_continuity() {
        let noise = field(42);
        let delta = 0.001;

        let v1 = noise.sample3(10.3, 20.7, -3.1);
        let v2 = noise.sample3(10.3 + delta, 20.7, -3.1);
        let v3 = noise.sample3(10.3, 20.7, -3.1 + delta);

        assert!((v1 - v2).abs() < 0.01, "sample3 should be continuous");
        assert!((v1 - v3).abs() < 0.01, "sample3 should be continuous");
    }

    #[test]
    fn test_fbm_single_octave_matches_sample() {
        let noise = field(9);
        let (x, y, z) = (0.25, -1.5, 2.75);
        assert_eq!(noise.fbm3(x, y, z, 1, 2.0, 0.5), noise.sample3(x, y, z));
    }

    #[test]
    fn test_fbm_is_weighted_sum() {
        let noise = field(9);
        let (x, y, z) = (0.4, 0.9, -0.2);
        let expected = noise.sample3(x, y, z)
            + noise.sample3(x * 2.0, y * 2.0, z * 2.0) * 0.5
            + noise.sample3(x * 4.0, y * 4.0, z * 4.0) * 0.25;
        let got = noise.fbm3(x, y, z, 3, 2.0, 0.5);
        assert!((expected - got).abs() < 1e-12);
    }

    #[test]
    fn test_seed_derivation() {
        let base = WorldSeed::new(42);
        let derived1 = base.derive(1);
        let derived2 = base.derive(2);

        assert_ne!(derived1, derived2, "Different purposes should give different seeds");
        assert_eq!(derived1, base.derive(1), "Same purpose should give same seed");
        assert_ne!(derived1, base, "Derived seed should differ from base");
    }
}
