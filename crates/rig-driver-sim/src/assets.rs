//! Image assets served by the simulated stereo cameras.
//!
//! Every `(LightType, CameraPosition)` pair maps to one asset. The catalog is
//! either generated in memory (a fabric weave test pattern) or backed by a
//! directory of `{position}_picture_{light}.jpg` files.
//!
//! Both sources serve raw RGB8 pixels, row-major. Directory files are decoded
//! on every load, so the collector never sees an encoded file.

use bytes::Bytes;
use rig_core::{CameraPosition, DeviceError, DeviceResult, LightType};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default generated image width in pixels
pub const DEFAULT_PATTERN_WIDTH: u32 = 320;
/// Default generated image height in pixels
pub const DEFAULT_PATTERN_HEIGHT: u32 = 240;

/// Horizontal shift of the right camera image, mimics stereo disparity
const STEREO_DISPARITY_PX: usize = 6;

#[derive(Debug, Clone)]
enum Asset {
    Image(Bytes),
    File(PathBuf),
}

/// Lookup table from light and camera position to image bytes.
#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    entries: HashMap<(LightType, CameraPosition), Asset>,
}

impl AssetCatalog {
    /// Catalog with no entries. Every load fails with `AssetNotFound`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Generated weave patterns (RGB8, row-major) for all four pairs.
    pub fn generated(width: u32, height: u32) -> Self {
        let mut catalog = Self::empty();
        for light in LightType::CAPTURE_ORDER {
            for position in CameraPosition::ALL {
                let image = generate_weave_pattern(width, height, light, position);
                catalog.insert(light, position, Bytes::from(image));
            }
        }
        catalog
    }

    /// Catalog reading `{position}_picture_{light}.jpg` files under `dir`.
    ///
    /// Files are read and decoded on every load; a missing or undecodable
    /// file surfaces as `AssetNotFound` at capture time.
    pub fn directory(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let mut catalog = Self::empty();
        for light in LightType::CAPTURE_ORDER {
            for position in CameraPosition::ALL {
                catalog
                    .entries
                    .insert((light, position), Asset::File(dir.join(file_name(light, position))));
            }
        }
        catalog
    }

    /// Add or replace an in-memory image.
    pub fn insert(&mut self, light: LightType, position: CameraPosition, image: Bytes) {
        self.entries.insert((light, position), Asset::Image(image));
    }

    /// Remove an entry.
    pub fn remove(&mut self, light: LightType, position: CameraPosition) {
        self.entries.remove(&(light, position));
    }

    pub fn contains(&self, light: LightType, position: CameraPosition) -> bool {
        self.entries.contains_key(&(light, position))
    }

    /// Load the image for a light and camera position.
    pub async fn load(&self, light: LightType, position: CameraPosition) -> DeviceResult<Bytes> {
        let not_found = |detail: String| DeviceError::AssetNotFound {
            light,
            position,
            detail,
        };

        match self.entries.get(&(light, position)) {
            None => Err(not_found("no catalog entry".to_string())),
            Some(Asset::Image(image)) => Ok(image.clone()),
            Some(Asset::File(path)) => {
                let encoded = tokio::fs::read(path)
                    .await
                    .map_err(|e| not_found(format!("{}: {}", path.display(), e)))?;
                let pixels = tokio::task::spawn_blocking(move || decode_rgb8(&encoded))
                    .await
                    .map_err(|e| not_found(format!("{}: decoder task failed: {}", path.display(), e)))?
                    .map_err(|e| not_found(format!("{}: {}", path.display(), e)))?;
                Ok(Bytes::from(pixels))
            }
        }
    }
}

/// Decode any supported image format into RGB8 pixels, row-major.
pub fn decode_rgb8(encoded: &[u8]) -> image::ImageResult<Vec<u8>> {
    Ok(image::load_from_memory(encoded)?.into_rgb8().into_raw())
}

/// File name used by directory-backed catalogs.
pub fn file_name(light: LightType, position: CameraPosition) -> String {
    format!("{}_picture_{}.jpg", position.as_str(), light.as_str())
}

/// Simple pseudo-random number generator (LCG) for reproducible pixel noise.
#[inline]
fn prng(seed: u64) -> u64 {
    seed.wrapping_mul(1103515245).wrapping_add(12345) & 0x7fffffff
}

fn tint(light: LightType) -> [f64; 3] {
    match light {
        LightType::Green => [0.35, 1.0, 0.45],
        LightType::Blue => [0.30, 0.55, 1.0],
    }
}

fn pattern_seed(light: LightType, position: CameraPosition) -> u64 {
    let light_bits: u64 = match light {
        LightType::Green => 1,
        LightType::Blue => 2,
    };
    let position_bits: u64 = match position {
        CameraPosition::Left => 10,
        CameraPosition::Right => 20,
    };
    (light_bits + position_bits).wrapping_mul(2654435761)
}

/// Generates a plain-weave fabric pattern.
///
/// The pattern includes:
/// - Alternating warp/weft threads, each shaded across its width
/// - A dark gap between threads
/// - Low-amplitude pixel noise, seeded per light and camera position
/// - A horizontal shift on the right camera
///
/// # Returns
/// RGB8 pixels, row-major, `width * height * 3` bytes
pub fn generate_weave_pattern(
    width: u32,
    height: u32,
    light: LightType,
    position: CameraPosition,
) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let mut buffer = vec![0u8; w * h * 3];
    if w == 0 || h == 0 {
        return buffer;
    }

    let thread = (width.min(height) / 24).max(4) as usize;
    let shift = match position {
        CameraPosition::Left => 0,
        CameraPosition::Right => STEREO_DISPARITY_PX,
    };
    let [tr, tg, tb] = tint(light);
    let seed = pattern_seed(light, position);

    for y in 0..h {
        for x in 0..w {
            let sx = x + shift;
            let cell_x = sx / thread;
            let cell_y = y / thread;
            let local_x = (sx % thread) as f64 / thread as f64;
            let local_y = (y % thread) as f64 / thread as f64;

            // Warp on top in even cells, weft on top in odd cells
            let warp_on_top = (cell_x + cell_y) % 2 == 0;
            let across = if warp_on_top { local_x } else { local_y };
            let along = if warp_on_top { local_y } else { local_x };

            // Round thread profile, brightest at the center line
            let profile = (std::f64::consts::PI * across).sin();
            // Thread dips under its neighbour at the cell edges
            let dip = 0.75 + 0.25 * (std::f64::consts::PI * along).sin();
            let gap = if across < 0.08 || across > 0.92 { 0.2 } else { 1.0 };

            let noise_seed = prng(seed ^ ((y * w + x) as u64));
            let noise = ((noise_seed & 0xFF) as f64 - 128.0) / 128.0 * 0.04;

            let intensity = (0.15 + 0.75 * profile * dip * gap + noise).clamp(0.0, 1.0);
            let idx = (y * w + x) * 3;
            buffer[idx] = (intensity * tr * 255.0) as u8;
            buffer[idx + 1] = (intensity * tg * 255.0) as u8;
            buffer[idx + 2] = (intensity * tb * 255.0) as u8;
        }
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_sum(image: &[u8], channel: usize) -> u64 {
        image.chunks_exact(3).map(|px| u64::from(px[channel])).sum()
    }

    #[test]
    fn test_pattern_size_and_determinism() {
        let a = generate_weave_pattern(64, 48, LightType::Green, CameraPosition::Left);
        let b = generate_weave_pattern(64, 48, LightType::Green, CameraPosition::Left);
        assert_eq!(a.len(), 64 * 48 * 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_pattern_is_tinted_per_light() {
        let green = generate_weave_pattern(64, 48, LightType::Green, CameraPosition::Left);
        let blue = generate_weave_pattern(64, 48, LightType::Blue, CameraPosition::Left);
        assert!(channel_sum(&green, 1) > channel_sum(&green, 2));
        assert!(channel_sum(&blue, 2) > channel_sum(&blue, 1));
    }

    #[test]
    fn test_stereo_pair_differs() {
        let left = generate_weave_pattern(64, 48, LightType::Blue, CameraPosition::Left);
        let right = generate_weave_pattern(64, 48, LightType::Blue, CameraPosition::Right);
        assert_ne!(left, right);
    }

    #[test]
    fn test_zero_sized_pattern() {
        assert!(generate_weave_pattern(0, 10, LightType::Green, CameraPosition::Left).is_empty());
    }

    #[test]
    fn test_file_name_convention() {
        assert_eq!(
            file_name(LightType::Green, CameraPosition::Left),
            "left_picture_green_light.jpg"
        );
        assert_eq!(
            file_name(LightType::Blue, CameraPosition::Right),
            "right_picture_blue_light.jpg"
        );
    }

    #[tokio::test]
    async fn test_generated_catalog_covers_every_pair() {
        let catalog = AssetCatalog::generated(32, 24);
        for light in LightType::CAPTURE_ORDER {
            for position in CameraPosition::ALL {
                let image = catalog.load(light, position).await.unwrap();
                assert_eq!(image.len(), 32 * 24 * 3);
            }
        }
    }

    #[tokio::test]
    async fn test_missing_entry_is_asset_not_found() {
        let mut catalog = AssetCatalog::generated(8, 8);
        catalog.remove(LightType::Blue, CameraPosition::Right);
        assert!(!catalog.contains(LightType::Blue, CameraPosition::Right));

        let err = catalog
            .load(LightType::Blue, CameraPosition::Right)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeviceError::AssetNotFound {
                light: LightType::Blue,
                position: CameraPosition::Right,
                ..
            }
        ));
    }

    fn write_jpeg(dir: &Path, light: LightType, position: CameraPosition, width: u32, height: u32) {
        let pixels = generate_weave_pattern(width, height, light, position);
        let image = image::RgbImage::from_raw(width, height, pixels).unwrap();
        image
            .save_with_format(dir.join(file_name(light, position)), image::ImageFormat::Jpeg)
            .unwrap();
    }

    #[tokio::test]
    async fn test_directory_catalog_decodes_to_rgb8() {
        let dir = tempfile::tempdir().unwrap();
        write_jpeg(dir.path(), LightType::Green, CameraPosition::Left, 20, 10);

        let catalog = AssetCatalog::directory(dir.path());
        let image = catalog
            .load(LightType::Green, CameraPosition::Left)
            .await
            .unwrap();
        assert_eq!(image.len(), 20 * 10 * 3);
        assert_ne!(&image[..2], &[0xFF, 0xD8], "served the encoded file");

        let err = catalog
            .load(LightType::Green, CameraPosition::Right)
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::AssetNotFound { .. }));
    }

    #[tokio::test]
    async fn test_undecodable_file_is_asset_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(file_name(LightType::Blue, CameraPosition::Left));
        std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();

        let err = AssetCatalog::directory(dir.path())
            .load(LightType::Blue, CameraPosition::Left)
            .await
            .unwrap_err();
        match err {
            DeviceError::AssetNotFound { light, detail, .. } => {
                assert_eq!(light, LightType::Blue);
                assert!(detail.contains("blue_light"), "{detail}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_png_matches_source_pixels() {
        let pixels = generate_weave_pattern(6, 4, LightType::Blue, CameraPosition::Right);
        let image = image::RgbImage::from_raw(6, 4, pixels.clone()).unwrap();
        let mut encoded = std::io::Cursor::new(Vec::new());
        image.write_to(&mut encoded, image::ImageFormat::Png).unwrap();

        assert_eq!(decode_rgb8(encoded.get_ref()).unwrap(), pixels);
    }
}
