use image::{imageops::FilterType, DynamicImage, ImageFormat};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::state::data::{is_raw_file, Asset, AssetKind};

/// Embedded previews smaller than this are camera thumbnails, too small for the grid
const MIN_EMBEDDED_JPEG: usize = 10_000;

/// How a bitmap is scaled into the requested size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FitMode {
    /// Scale down to fit entirely inside the target, keeping the aspect ratio
    AspectFit,
    /// Scale to cover the target and crop the overflow around the center
    AspectFill,
}

impl FitMode {
    fn cache_tag(self) -> &'static str {
        match self {
            FitMode::AspectFit => "fit",
            FitMode::AspectFill => "fill",
        }
    }
}

/// Quality/speed trade-off for a request
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    #[default]
    HighQuality,
    Fast,
}

impl DeliveryMode {
    fn filter(self) -> FilterType {
        match self {
            DeliveryMode::HighQuality => FilterType::Lanczos3,
            DeliveryMode::Fast => FilterType::Triangle,
        }
    }
}

/// Requested bitmap size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub fn square(side: u32) -> Self {
        Self {
            width: side.max(1),
            height: side.max(1),
        }
    }
}

/// A decoded RGBA bitmap
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Thumbnail {
    fn from_image(img: DynamicImage) -> Self {
        let rgba = img.to_rgba8();
        Self {
            width: rgba.width(),
            height: rgba.height(),
            pixels: rgba.into_raw(),
        }
    }
}

/// Disk cache of resized bitmaps
#[derive(Debug, Clone)]
pub struct ThumbnailCache {
    dir: PathBuf,
}

impl ThumbnailCache {
    /// Use (and create) `dir` as the cache directory
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Cache in ~/.cache/album-grid/thumbnails on Linux
    pub fn in_user_cache() -> Result<Self> {
        let mut path = dirs::cache_dir()
            .or_else(dirs::home_dir)
            .ok_or(Error::NoDirectory("cache"))?;

        path.push("album-grid");
        path.push("thumbnails");
        Self::new(path)
    }

    /// The cache file for a request. The modification time is part of the
    /// key so edited files get fresh thumbnails.
    pub fn path_for(&self, asset: &Asset, target: TargetSize, fit: FitMode) -> PathBuf {
        self.dir.join(format!(
            "{}_{}_{}x{}_{}.jpg",
            asset.id,
            asset.modified_at.timestamp(),
            target.width,
            target.height,
            fit.cache_tag()
        ))
    }

    fn load(&self, path: &Path) -> Option<DynamicImage> {
        if !path.exists() {
            return None;
        }
        image::open(path).ok()
    }

    fn store(&self, path: &Path, img: &DynamicImage) -> Result<()> {
        // JPEG has no alpha channel
        DynamicImage::ImageRgb8(img.to_rgb8()).save_with_format(path, ImageFormat::Jpeg)?;
        Ok(())
    }
}

/// Produce a bitmap for `asset` at `target`, going through the cache when
/// one is given. Blocking: call from the blocking pool.
///
/// A freshly rendered bitmap is written to the cache only if `still_wanted`
/// returns true once rendering is done.
pub fn load_thumbnail(
    cache: Option<&ThumbnailCache>,
    asset: &Asset,
    target: TargetSize,
    fit: FitMode,
    delivery: DeliveryMode,
    still_wanted: impl Fn() -> bool,
) -> Result<Thumbnail> {
    let cache_path = cache.map(|c| (c, c.path_for(asset, target, fit)));

    if let Some((cache, path)) = &cache_path {
        if let Some(img) = cache.load(path) {
            debug!("Thumbnail cache hit: {}", path.display());
            return Ok(Thumbnail::from_image(img));
        }
    }

    let source = decode_source(asset)?;
    let resized = render(&source, target, fit, delivery);

    match &cache_path {
        Some((_, path)) if !still_wanted() => {
            debug!("Not caching abandoned thumbnail {}", path.display());
        }
        Some((cache, path)) => {
            if let Err(e) = cache.store(path, &resized) {
                debug!("Could not cache thumbnail {}: {}", path.display(), e);
            }
        }
        None => {}
    }

    Ok(Thumbnail::from_image(resized))
}

/// Scale `img` into `target` according to `fit`
pub fn render(
    img: &DynamicImage,
    target: TargetSize,
    fit: FitMode,
    delivery: DeliveryMode,
) -> DynamicImage {
    let filter = delivery.filter();
    match fit {
        FitMode::AspectFit => img.resize(target.width, target.height, filter),
        FitMode::AspectFill => img.resize_to_fill(target.width, target.height, filter),
    }
}

/// Decode the full-size image behind an asset
fn decode_source(asset: &Asset) -> Result<DynamicImage> {
    if asset.kind == AssetKind::Video {
        return Err(Error::NoImage(asset.path.clone()));
    }

    if is_raw_file(&asset.path) {
        let jpeg = extract_largest_jpeg(&asset.path)?
            .ok_or_else(|| Error::NoImage(asset.path.clone()))?;
        return Ok(image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)?);
    }

    Ok(image::ImageReader::open(&asset.path)?
        .with_guessed_format()?
        .decode()?)
}

/// Extract the largest decodable embedded JPEG from a RAW file
fn extract_largest_jpeg(raw_path: &Path) -> Result<Option<Vec<u8>>> {
    let mut data = Vec::new();
    fs::File::open(raw_path)?.read_to_end(&mut data)?;
    Ok(largest_jpeg_in(&data))
}

/// Scan a buffer for JPEG start/end markers and keep the biggest valid one
fn largest_jpeg_in(data: &[u8]) -> Option<Vec<u8>> {
    let jpeg_start = [0xFF, 0xD8, 0xFF];
    let jpeg_end = [0xFF, 0xD9];

    let mut candidates = Vec::new();
    let mut pos = 0;
    while pos + jpeg_start.len() <= data.len() {
        if !data[pos..].starts_with(&jpeg_start) {
            pos += 1;
            continue;
        }

        match data[pos..].windows(2).position(|w| w == jpeg_end) {
            Some(end_offset) => {
                let end = pos + end_offset + 2;
                if end - pos >= MIN_EMBEDDED_JPEG {
                    candidates.push((pos, end));
                }
                pos += jpeg_start.len();
            }
            None => break,
        }
    }

    // Try from largest to smallest
    candidates.sort_by_key(|&(start, end)| std::cmp::Reverse(end - start));
    candidates
        .into_iter()
        .map(|(start, end)| &data[start..end])
        .find(|jpeg| image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg).is_ok())
        .map(|jpeg| jpeg.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn asset_at(path: PathBuf, kind: AssetKind) -> Asset {
        Asset {
            id: 7,
            filename: path.file_name().unwrap().to_string_lossy().to_string(),
            path,
            kind,
            created_at: Utc::now(),
            modified_at: Utc::now(),
            favorite: false,
        }
    }

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    /// Busy pattern so the JPEG encoder cannot shrink it much
    fn noise(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            let v = x.wrapping_mul(7919) ^ y.wrapping_mul(104_729);
            Rgb([(v % 251) as u8, (v % 241) as u8, (v % 239) as u8])
        }))
    }

    #[test]
    fn test_render_fit_keeps_aspect() {
        let img = gradient(400, 200);
        let out = render(&img, TargetSize::square(100), FitMode::AspectFit, DeliveryMode::Fast);
        assert_eq!((out.width(), out.height()), (100, 50));
    }

    #[test]
    fn test_render_fill_covers_target() {
        let img = gradient(400, 200);
        let out = render(&img, TargetSize::square(100), FitMode::AspectFill, DeliveryMode::Fast);
        assert_eq!((out.width(), out.height()), (100, 100));
    }

    #[test]
    fn test_load_thumbnail_uses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("photo.png");
        gradient(64, 32).save(&source).unwrap();

        let cache = ThumbnailCache::new(dir.path().join("cache")).unwrap();
        let asset = asset_at(source.clone(), AssetKind::Image);
        let target = TargetSize::square(16);

        let first = load_thumbnail(
            Some(&cache),
            &asset,
            target,
            FitMode::AspectFit,
            DeliveryMode::HighQuality,
            || true,
        )
        .unwrap();
        assert_eq!((first.width, first.height), (16, 8));
        assert_eq!(first.pixels.len(), 16 * 8 * 4);
        assert!(cache.path_for(&asset, target, FitMode::AspectFit).exists());

        // Served from the cache once the source is gone
        fs::remove_file(&source).unwrap();
        let second = load_thumbnail(
            Some(&cache),
            &asset,
            target,
            FitMode::AspectFit,
            DeliveryMode::HighQuality,
            || true,
        )
        .unwrap();
        assert_eq!((second.width, second.height), (16, 8));
    }

    #[test]
    fn test_abandoned_thumbnail_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("photo.png");
        gradient(64, 32).save(&source).unwrap();

        let cache = ThumbnailCache::new(dir.path().join("cache")).unwrap();
        let asset = asset_at(source, AssetKind::Image);
        let target = TargetSize::square(16);

        let thumb = load_thumbnail(
            Some(&cache),
            &asset,
            target,
            FitMode::AspectFill,
            DeliveryMode::Fast,
            || false,
        )
        .unwrap();
        assert_eq!((thumb.width, thumb.height), (16, 16));
        assert!(!cache.path_for(&asset, target, FitMode::AspectFill).exists());
        assert_eq!(fs::read_dir(dir.path().join("cache")).unwrap().count(), 0);
    }

    #[test]
    fn test_video_has_no_image() {
        let asset = asset_at(PathBuf::from("/tmp/clip.mp4"), AssetKind::Video);
        let result = load_thumbnail(
            None,
            &asset,
            TargetSize::square(10),
            FitMode::AspectFit,
            DeliveryMode::Fast,
            || true,
        );
        assert!(matches!(result, Err(Error::NoImage(_))));
    }

    #[test]
    fn test_raw_embedded_preview() {
        let mut jpeg = Vec::new();
        noise(300, 225)
            .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .unwrap();
        assert!(jpeg.len() >= MIN_EMBEDDED_JPEG);

        // Fake RAW container: header bytes, the preview, trailing sensor data
        let mut raw = vec![0x49, 0x49, 0x2A, 0x00];
        raw.extend_from_slice(&[0u8; 512]);
        raw.extend_from_slice(&jpeg);
        raw.extend_from_slice(&[0x11u8; 256]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DSC_0001.NEF");
        fs::write(&path, &raw).unwrap();

        let asset = asset_at(path, AssetKind::Image);
        let thumb = load_thumbnail(
            None,
            &asset,
            TargetSize::square(40),
            FitMode::AspectFit,
            DeliveryMode::Fast,
            || true,
        )
        .unwrap();
        assert_eq!((thumb.width, thumb.height), (40, 30));
    }

    #[test]
    fn test_no_jpeg_in_garbage() {
        assert!(largest_jpeg_in(&[0u8; 1024]).is_none());
    }
}
