/// Folder import: walks a directory tree and adds every media file to the catalog
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use walkdir::WalkDir;

use super::data::AssetKind;
use super::library::{ImportResult, Library, ScannedFile};
use crate::error::Result;

/// Collect all media files below `folder`, following symlinks
pub fn scan_folder(folder: &Path) -> Vec<ScannedFile> {
    info!("Scanning folder: {}", folder.display());

    let mut files = Vec::new();
    for entry in WalkDir::new(folder)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(kind) = AssetKind::from_path(path) else {
            continue;
        };

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        // Not every filesystem records a birth time
        let created = metadata.created().unwrap_or(modified);

        files.push(ScannedFile {
            path: path.to_path_buf(),
            kind,
            created_at: DateTime::<Utc>::from(created),
            modified_at: DateTime::<Utc>::from(modified),
        });
    }

    files
}

/// The catalog side of importing, as seen by the app shell
pub trait MediaImporter: Send + Sync {
    /// Assets currently on disk
    fn asset_count(&self) -> Result<usize>;

    /// Add every media file below `folder`. Blocking.
    fn import_folder(&self, folder: &Path) -> Result<ImportResult>;
}

impl MediaImporter for Library {
    fn asset_count(&self) -> Result<usize> {
        Library::asset_count(self)
    }

    fn import_folder(&self, folder: &Path) -> Result<ImportResult> {
        import_folder(self, folder)
    }
}

/// Scan `folder` and import what was found
pub fn import_folder(library: &Library, folder: &Path) -> Result<ImportResult> {
    let files = scan_folder(folder);
    let result = library.import_files(files)?;

    info!(
        "Import complete: {} new, {} skipped",
        result.imported_count, result.skipped_count
    );

    Ok(result)
}

/// Import a folder on the blocking pool so the UI stays responsive
pub async fn import_folder_async(
    importer: Arc<dyn MediaImporter>,
    folder: PathBuf,
) -> Result<ImportResult> {
    tokio::task::spawn_blocking(move || importer.import_folder(&folder)).await?
}
