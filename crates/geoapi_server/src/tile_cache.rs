//! # Tile Cache
//!
//! Rendered PNG tiles on disk, keyed by layer, rounded south-west corner and
//! pixel size. Entries never expire.
//!
//! ## Design
//!
//! A miss renders into memory, writes a uniquely named temporary file in the
//! cache directory and renames it into place. Rename is atomic on one file
//! system, so a concurrent reader sees either no file or the whole file, and
//! two workers rendering the same key simply race to an identical result.
//! No per-key locking.

use std::fs;
use std::io::{self, Cursor};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use geoapi_terrain::{GeoBounds, TerrainSynthesizer};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage};

use crate::error::{ApiError, LifecycleError};

/// Raster layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TileLayer {
    /// RGB biome colours.
    Biome,
    /// White RGBA with precipitation as alpha.
    Clouds,
    /// 8-bit grayscale elevation.
    Elevation,
}

impl TileLayer {
    /// Name used in cache file names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Biome => "biome",
            Self::Clouds => "clouds",
            Self::Elevation => "elevation",
        }
    }
}

/// One tile request, already validated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileRequest {
    /// Layer to render.
    pub layer: TileLayer,
    /// Normalized bounds.
    pub bounds: GeoBounds,
    /// Width in pixels, at least 1.
    pub width: u32,
    /// Height in pixels, at least 1.
    pub height: u32,
}

impl TileRequest {
    /// Stable cache file name.
    ///
    /// ```rust
    /// use geoapi_server::{TileLayer, TileRequest};
    /// use geoapi_terrain::GeoBounds;
    ///
    /// let request = TileRequest {
    ///     layer: TileLayer::Biome,
    ///     bounds: GeoBounds::normalized(10.0, 20.0, -30.456, 0.0),
    ///     width: 256,
    ///     height: 128,
    /// };
    /// assert_eq!(request.file_name(), "biome_lat10.00_lon-30.46_256x128.png");
    /// ```
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{}_lat{:.2}_lon{:.2}_{}x{}.png",
            self.layer.as_str(),
            self.bounds.lat_min,
            self.bounds.lon_min,
            self.width,
            self.height
        )
    }
}

/// A tile served from the cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedTile {
    /// Location of the cached file.
    pub path: PathBuf,
    /// PNG bytes.
    pub bytes: Vec<u8>,
    /// Whether this call rendered the tile.
    pub rendered: bool,
}

/// On-disk tile cache.
pub struct TileCache {
    dir: PathBuf,
    renders: AtomicU64,
    temp_counter: AtomicU64,
}

impl TileCache {
    /// Opens a cache rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            renders: AtomicU64::new(0),
            temp_counter: AtomicU64::new(0),
        })
    }

    /// Cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of tiles rendered by this cache instance.
    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.renders.load(Ordering::Acquire)
    }

    /// Returns the tile for `request`, rendering it on a miss.
    ///
    /// `terrain` is only called on a miss; the lease it returns is held
    /// until the rendered file is in place, so the engine cannot be unloaded
    /// between rendering and persisting a tile.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Init`] if the terrain cannot be acquired and
    /// [`ApiError::Handler`] for encode or file system failures.
    pub fn get<G, F>(&self, request: &TileRequest, terrain: F) -> Result<CachedTile, ApiError>
    where
        F: FnOnce() -> Result<G, LifecycleError>,
        G: Deref<Target = TerrainSynthesizer>,
    {
        let path = self.dir.join(request.file_name());
        match fs::read(&path) {
            Ok(bytes) => {
                return Ok(CachedTile {
                    path,
                    bytes,
                    rendered: false,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(ApiError::Handler(format!("read {}: {e}", path.display()))),
        }

        let engine = terrain()?;
        let bytes = render_tile(&engine, request)?;
        self.renders.fetch_add(1, Ordering::AcqRel);
        self.persist(&path, &bytes)
            .map_err(|e| ApiError::Handler(format!("write {}: {e}", path.display())))?;
        drop(engine);

        tracing::debug!(target: "geoapi::system", client = "-", file = %path.display(), size = bytes.len(), "tile rendered");
        Ok(CachedTile {
            path,
            bytes,
            rendered: true,
        })
    }

    fn persist(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let n = self.temp_counter.fetch_add(1, Ordering::AcqRel);
        let file_name = path.file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let temp = self.dir.join(format!(".{file_name}.{}.{n}.tmp", std::process::id()));

        fs::write(&temp, bytes)?;
        if let Err(e) = fs::rename(&temp, path) {
            fs::remove_file(&temp).ok();
            return Err(e);
        }
        Ok(())
    }
}

/// Renders a tile to PNG bytes.
///
/// Pixel `(x, y)` samples `lat = lat_min + y·(lat_span/height)` and
/// `lon = lon_min + x·(lon_span/width)`.
///
/// # Errors
///
/// Returns [`ApiError::Handler`] if PNG encoding fails.
pub fn render_tile(terrain: &TerrainSynthesizer, request: &TileRequest) -> Result<Vec<u8>, ApiError> {
    let image = match request.layer {
        TileLayer::Biome => DynamicImage::ImageRgb8(render_biome(terrain, request)),
        TileLayer::Elevation => DynamicImage::ImageLuma8(render_elevation(terrain, request)),
        TileLayer::Clouds => DynamicImage::ImageRgba8(render_clouds(terrain, request)),
    };

    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| ApiError::Handler(format!("png encode: {e}")))?;
    Ok(out.into_inner())
}

fn pixel_coords(request: &TileRequest, x: u32, y: u32) -> (f64, f64) {
    let b = &request.bounds;
    let lat = b.lat_min + f64::from(y) * (b.lat_span() / f64::from(request.height));
    let lon = b.lon_min + f64::from(x) * (b.lon_span() / f64::from(request.width));
    (lat, lon)
}

fn render_biome(terrain: &TerrainSynthesizer, request: &TileRequest) -> RgbImage {
    RgbImage::from_fn(request.width, request.height, |x, y| {
        let (lat, lon) = pixel_coords(request, x, y);
        let elevation = terrain.elevation_at(lat, lon);
        let (_, color) = terrain.classify(elevation, lat, lon);
        Rgb(color.to_rgb8().to_array())
    })
}

fn render_elevation(terrain: &TerrainSynthesizer, request: &TileRequest) -> GrayImage {
    GrayImage::from_fn(request.width, request.height, |x, y| {
        let (lat, lon) = pixel_coords(request, x, y);
        let level = ((terrain.elevation_at(lat, lon) * 255.0) as i32).clamp(0, 255);
        Luma([level as u8])
    })
}

/// Two passes: find the precipitation range over the tile, then scale each
/// pixel to `(p - min) * 255 / max`. A tile with no precipitation at all is
/// fully transparent.
fn render_clouds(terrain: &TerrainSynthesizer, request: &TileRequest) -> RgbaImage {
    let (width, height) = (request.width, request.height);
    let mut field = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            let (lat, lon) = pixel_coords(request, x, y);
            field.push(terrain.precipitation_at(lat, lon));
        }
    }
    let min = u32::from(field.iter().copied().min().unwrap_or(0));
    let max = u32::from(field.iter().copied().max().unwrap_or(0));

    RgbaImage::from_fn(width, height, |x, y| {
        let p = u32::from(field[(y * width + x) as usize]);
        let alpha = if max == 0 { 0 } else { (p - min) * 255 / max };
        Rgba([255, 255, 255, alpha as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoapi_terrain::TerrainConfig;

    fn temp_cache_dir() -> PathBuf {
        let id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("test_geoapi_tiles_{id}"))
    }

    fn terrain() -> TerrainSynthesizer {
        TerrainSynthesizer::init(TerrainConfig::default()).unwrap()
    }

    fn request(layer: TileLayer) -> TileRequest {
        TileRequest {
            layer,
            bounds: GeoBounds::normalized(-10.0, 30.0, 0.0, 40.0),
            width: 24,
            height: 16,
        }
    }

    #[test]
    fn test_hit_skips_renderer() {
        let dir = temp_cache_dir();
        let cache = TileCache::new(&dir).unwrap();
        let engine = terrain();
        let req = request(TileLayer::Biome);

        let first = cache.get(&req, || Ok::<_, LifecycleError>(&engine)).unwrap();
        assert!(first.rendered);
        assert_eq!(cache.render_count(), 1);

        let second = cache
            .get(&req, || -> Result<&'static TerrainSynthesizer, LifecycleError> {
                panic!("terrain must not be acquired on a hit")
            })
            .unwrap();
        assert!(!second.rendered);
        assert_eq!(first.bytes, second.bytes);
        assert_eq!(cache.render_count(), 1);

        fs::remove_dir_all(&dir).ok();
    }

    /// Lease stand-in that records whether the tile file existed when it
    /// was released.
    struct RecordingLease<'a> {
        engine: &'a TerrainSynthesizer,
        tile: PathBuf,
        file_present_at_release: &'a std::cell::Cell<Option<bool>>,
    }

    impl Deref for RecordingLease<'_> {
        type Target = TerrainSynthesizer;

        fn deref(&self) -> &TerrainSynthesizer {
            self.engine
        }
    }

    impl Drop for RecordingLease<'_> {
        fn drop(&mut self) {
            self.file_present_at_release.set(Some(self.tile.exists()));
        }
    }

    #[test]
    fn test_lease_held_until_tile_written() {
        let dir = temp_cache_dir();
        let cache = TileCache::new(&dir).unwrap();
        let engine = terrain();
        let req = request(TileLayer::Elevation);
        let released = std::cell::Cell::new(None);

        let tile = cache
            .get(&req, || {
                Ok::<_, LifecycleError>(RecordingLease {
                    engine: &engine,
                    tile: dir.join(req.file_name()),
                    file_present_at_release: &released,
                })
            })
            .unwrap();
        assert!(tile.rendered);
        assert_eq!(released.get(), Some(true));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_no_temp_files_left() {
        let dir = temp_cache_dir();
        let cache = TileCache::new(&dir).unwrap();
        let engine = terrain();
        for layer in [TileLayer::Biome, TileLayer::Clouds, TileLayer::Elevation] {
            cache.get(&request(layer), || Ok::<_, LifecycleError>(&engine)).unwrap();
        }
        let names: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 3);
        assert!(names.iter().all(|n| n.ends_with(".png") && !n.starts_with('.')));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_init_error_propagates() {
        let dir = temp_cache_dir();
        let cache = TileCache::new(&dir).unwrap();
        let result = cache.get(&request(TileLayer::Elevation), || {
            Err::<&TerrainSynthesizer, _>(LifecycleError::Release("down".into()))
        });
        assert!(matches!(result, Err(ApiError::Init(_))));
        assert_eq!(cache.render_count(), 0);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_layer_pixel_formats() {
        let engine = terrain();
        let req = request(TileLayer::Clouds);

        let clouds = image::load_from_memory(&render_tile(&engine, &req).unwrap()).unwrap();
        assert_eq!(clouds.color(), image::ColorType::Rgba8);
        let rgba = clouds.to_rgba8();
        assert!(rgba.pixels().all(|p| p[0] == 255 && p[1] == 255 && p[2] == 255));

        let gray = image::load_from_memory(
            &render_tile(&engine, &TileRequest { layer: TileLayer::Elevation, ..req }).unwrap(),
        )
        .unwrap();
        assert_eq!(gray.color(), image::ColorType::L8);
        assert_eq!((gray.width(), gray.height()), (24, 16));

        let biome = image::load_from_memory(
            &render_tile(&engine, &TileRequest { layer: TileLayer::Biome, ..req }).unwrap(),
        )
        .unwrap();
        assert_eq!(biome.color(), image::ColorType::Rgb8);
    }

    #[test]
    fn test_dry_tile_is_transparent() {
        let engine = terrain();
        // A one-pixel-high strip on the equator: precipitation is zero there
        let req = TileRequest {
            layer: TileLayer::Clouds,
            bounds: GeoBounds::normalized(0.0, 0.0, -20.0, 20.0),
            width: 8,
            height: 1,
        };
        let rgba = render_clouds(&engine, &req);
        assert!(rgba.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_clouds_alpha_normalized() {
        let engine = terrain();
        let req = TileRequest {
            layer: TileLayer::Clouds,
            bounds: GeoBounds::normalized(10.0, 50.0, -60.0, 60.0),
            width: 32,
            height: 32,
        };
        let rgba = render_clouds(&engine, &req);
        let max_alpha = rgba.pixels().map(|p| p[3]).max().unwrap();
        // (max - min) * 255 / max reaches 255 only when min is 0
        assert!(max_alpha > 0);
    }
}
