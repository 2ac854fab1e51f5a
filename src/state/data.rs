/// Shared data structures for the application state
///
/// These structs represent the data model that flows between
/// the catalog layer and the UI layer.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Camera RAW extensions (common formats)
pub const RAW_EXTENSIONS: &[&str] = &[
    "nef", "dng", "cr2", "cr3", "arw", "raf", "orf", "rw2", "pef", "srw", "erf", "kdc", "dcr",
    "mos", "raw", "rwl",
];

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff", "heic", "heif",
];

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "avi", "mkv", "webm", "3gp"];

/// Filter applied to every asset fetch
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    All,
    #[default]
    Image,
    Video,
}

impl MediaType {
    /// Title of the synthetic "all items" album for this filter
    pub fn title(self) -> &'static str {
        match self {
            MediaType::All => "Photos & Videos",
            MediaType::Image => "Photos",
            MediaType::Video => "Videos",
        }
    }

    #[cfg(test)]
    pub fn matches(self, kind: AssetKind) -> bool {
        match self {
            MediaType::All => true,
            MediaType::Image => kind == AssetKind::Image,
            MediaType::Video => kind == AssetKind::Video,
        }
    }

    /// SQL condition on the `media_type` column of the `assets` table
    pub(crate) fn sql_condition(self) -> &'static str {
        match self {
            MediaType::All => "media_type IN ('image', 'video')",
            MediaType::Image => "media_type = 'image'",
            MediaType::Video => "media_type = 'video'",
        }
    }
}

/// What a single asset actually is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Image,
    Video,
}

impl AssetKind {
    /// Classify a file by its extension. Returns None for non-media files.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        let ext = ext.as_str();

        if IMAGE_EXTENSIONS.contains(&ext) || RAW_EXTENSIONS.contains(&ext) {
            Some(AssetKind::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext) {
            Some(AssetKind::Video)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Video => "video",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "image" => Some(AssetKind::Image),
            "video" => Some(AssetKind::Video),
            _ => None,
        }
    }
}

/// Check whether a path carries a camera RAW extension
pub fn is_raw_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| RAW_EXTENSIONS.contains(&ext.to_string_lossy().to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Represents a single media item in the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    /// Unique database ID
    pub id: i64,
    /// Full path to the media file
    pub path: PathBuf,
    /// Filename only (e.g., "IMG_0001.JPG")
    pub filename: String,
    pub kind: AssetKind,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub favorite: bool,
}

/// Immutable, ordered snapshot of assets returned by a fetch.
///
/// Clones share the same backing slice.
#[derive(Debug, Clone, Default)]
pub struct AssetFetch {
    assets: Arc<[Asset]>,
}

impl AssetFetch {
    pub fn new(assets: Vec<Asset>) -> Self {
        Self {
            assets: assets.into(),
        }
    }

    pub fn count(&self) -> usize {
        self.assets.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, index: usize) -> Option<&Asset> {
        self.assets.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Asset> {
        self.assets.iter()
    }
}

/// A computed collection whose membership is a predicate over assets
#[derive(Debug, Clone, PartialEq)]
pub struct SmartAlbum {
    /// Stable identifier, e.g. "smart/favorites"
    pub id: String,
    pub title: String,
    /// Member count if the library keeps one up front. Computed albums
    /// have none; only those are listed.
    pub estimated_count: Option<usize>,
}

/// An album as presented by the picker
#[derive(Debug, Clone)]
pub struct AlbumInfo {
    /// Smart album id; None for the synthetic "all items" album
    pub id: Option<String>,
    pub name: String,
    pub count: usize,
    pub fetch: AssetFetch,
}

impl AlbumInfo {
    pub fn new(id: Option<String>, name: impl Into<String>, fetch: AssetFetch) -> Self {
        Self {
            id,
            name: name.into(),
            count: fetch.count(),
            fetch,
        }
    }
}
