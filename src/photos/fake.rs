//! In-memory [`PhotoLibrary`] for tests
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

use super::authorization::AuthorizationStatus;
use super::observer::{ChangeKind, LibraryChange};
use super::PhotoLibrary;
use crate::error::Result;
use crate::state::data::{Asset, AssetFetch, AssetKind, MediaType, SmartAlbum};
use crate::state::import::{scan_folder, MediaImporter};
use crate::state::library::ImportResult;

/// Build an asset whose creation time is `created` seconds after the epoch
pub fn asset(id: i64, kind: AssetKind, created: i64) -> Asset {
    let created_at = Utc.timestamp_opt(created, 0).unwrap();
    let ext = match kind {
        AssetKind::Image => "jpg",
        AssetKind::Video => "mp4",
    };
    Asset {
        id,
        path: PathBuf::from(format!("/fake/{}.{}", id, ext)),
        filename: format!("{}.{}", id, ext),
        kind,
        created_at,
        modified_at: created_at,
        favorite: false,
    }
}

pub struct FakeLibrary {
    assets: Mutex<Vec<Asset>>,
    /// (album, member ids)
    smart: Mutex<Vec<(SmartAlbum, Vec<i64>)>>,
    status: Mutex<AuthorizationStatus>,
    changes: broadcast::Sender<LibraryChange>,
}

impl Default for FakeLibrary {
    fn default() -> Self {
        Self {
            assets: Mutex::new(Vec::new()),
            smart: Mutex::new(Vec::new()),
            status: Mutex::new(AuthorizationStatus::NotDetermined),
            changes: broadcast::channel(16).0,
        }
    }
}

impl FakeLibrary {
    pub fn with_assets(assets: Vec<Asset>) -> Self {
        let library = Self::default();
        *library.assets.lock() = assets;
        library
    }

    pub fn add_smart_album(&self, id: &str, title: &str, members: Vec<i64>) {
        self.push_album(id, title, None, members);
    }

    /// A smart album that reports a member count up front
    pub fn add_counted_album(&self, id: &str, title: &str, members: Vec<i64>) {
        self.push_album(id, title, Some(members.len()), members);
    }

    fn push_album(&self, id: &str, title: &str, estimated: Option<usize>, members: Vec<i64>) {
        self.smart.lock().push((
            SmartAlbum {
                id: id.to_string(),
                title: title.to_string(),
                estimated_count: estimated,
            },
            members,
        ));
    }

    pub fn set_status(&self, status: AuthorizationStatus) {
        *self.status.lock() = status;
    }

    fn sorted(&self, media_type: MediaType, keep: impl Fn(&Asset) -> bool) -> AssetFetch {
        let mut assets: Vec<Asset> = self
            .assets
            .lock()
            .iter()
            .filter(|a| media_type.matches(a.kind) && keep(a))
            .cloned()
            .collect();
        assets.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.modified_at.cmp(&a.modified_at))
        });
        AssetFetch::new(assets)
    }
}

impl PhotoLibrary for FakeLibrary {
    fn fetch_assets(&self, media_type: MediaType) -> Result<AssetFetch> {
        Ok(self.sorted(media_type, |_| true))
    }

    fn smart_albums(&self) -> Result<Vec<SmartAlbum>> {
        Ok(self.smart.lock().iter().map(|(album, _)| album.clone()).collect())
    }

    fn fetch_assets_in(&self, album: &SmartAlbum, media_type: MediaType) -> Result<AssetFetch> {
        let members = self
            .smart
            .lock()
            .iter()
            .find(|(a, _)| a.id == album.id)
            .map(|(_, ids)| ids.clone())
            .unwrap_or_default();
        Ok(self.sorted(media_type, |a| members.contains(&a.id)))
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        *self.status.lock()
    }

    fn record_authorization(&self, status: AuthorizationStatus) -> Result<()> {
        self.set_status(status);
        Ok(())
    }

    fn set_favorite(&self, asset_id: i64, favorite: bool) -> Result<()> {
        if let Some(asset) = self.assets.lock().iter_mut().find(|a| a.id == asset_id) {
            asset.favorite = favorite;
        }
        let _ = self.changes.send(LibraryChange {
            serial: 0,
            kind: ChangeKind::FavoriteChanged { asset_id },
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<LibraryChange> {
        self.changes.subscribe()
    }
}

impl MediaImporter for FakeLibrary {
    fn asset_count(&self) -> Result<usize> {
        Ok(self.assets.lock().len())
    }

    fn import_folder(&self, folder: &Path) -> Result<ImportResult> {
        let mut assets = self.assets.lock();
        let mut result = ImportResult::default();

        for file in scan_folder(folder) {
            if assets.iter().any(|a| a.path == file.path) {
                result.skipped_count += 1;
                continue;
            }
            let filename = file
                .path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();
            let id = assets.iter().map(|a| a.id).max().unwrap_or(0) + 1;
            assets.push(Asset {
                id,
                path: file.path,
                filename,
                kind: file.kind,
                created_at: file.created_at,
                modified_at: file.modified_at,
                favorite: false,
            });
            result.imported_count += 1;
        }

        Ok(result)
    }
}
