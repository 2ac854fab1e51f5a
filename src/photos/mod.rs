/// Photo library access
///
/// Everything the UI knows about the catalog goes through the
/// [`PhotoLibrary`] trait, which is handed to each component instead of
/// being looked up globally:
/// - album enumeration (directory.rs)
/// - thumbnail requests with cancellation (loader.rs)
/// - access authorization (authorization.rs)
/// - change notifications (observer.rs)
use tokio::sync::broadcast;

use crate::error::Result;
use crate::state::data::{AssetFetch, MediaType, SmartAlbum};

pub mod authorization;
pub mod directory;
pub mod loader;
pub mod observer;

#[cfg(test)]
pub mod fake;

use authorization::AuthorizationStatus;
use observer::LibraryChange;

pub trait PhotoLibrary: Send + Sync {
    /// Every asset matching `media_type`, newest first
    fn fetch_assets(&self, media_type: MediaType) -> Result<AssetFetch>;

    /// Smart album descriptors, in display order
    fn smart_albums(&self) -> Result<Vec<SmartAlbum>>;

    /// Members of `album` matching `media_type`, newest first
    fn fetch_assets_in(&self, album: &SmartAlbum, media_type: MediaType) -> Result<AssetFetch>;

    fn authorization_status(&self) -> AuthorizationStatus;

    /// Remember the user's answer to the access prompt
    fn record_authorization(&self, status: AuthorizationStatus) -> Result<()>;

    fn set_favorite(&self, asset_id: i64, favorite: bool) -> Result<()>;

    /// Receive a token for every library mutation
    fn subscribe(&self) -> broadcast::Receiver<LibraryChange>;
}
