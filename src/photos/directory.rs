/// Album directory: the list of albums offered by the picker
use log::debug;

use super::PhotoLibrary;
use crate::error::Result;
use crate::state::data::{AlbumInfo, Asset, MediaType, SmartAlbum};

/// List the albums for `media_type`.
///
/// The first entry is always the synthetic "all items" album, even for an
/// empty library. Computed smart albums follow in the library's order,
/// including those with no matching assets. Smart albums that report an
/// estimated count up front are not listed.
pub fn list_albums(library: &dyn PhotoLibrary, media_type: MediaType) -> Result<Vec<AlbumInfo>> {
    let all = library.fetch_assets(media_type)?;
    let mut albums = vec![AlbumInfo::new(None, media_type.title(), all)];

    for smart in library.smart_albums()? {
        if smart.estimated_count.is_some() {
            debug!("Skipping counted album {}", smart.id);
            continue;
        }
        let fetch = library.fetch_assets_in(&smart, media_type)?;
        albums.push(AlbumInfo::new(Some(smart.id), smart.title, fetch));
    }

    debug!("Listed {} albums for {:?}", albums.len(), media_type);
    Ok(albums)
}

/// Fetch `album` again so membership reflects the library as it is now,
/// not as it was when the album was listed.
pub fn refetch_album(
    library: &dyn PhotoLibrary,
    album: &AlbumInfo,
    media_type: MediaType,
) -> Result<AlbumInfo> {
    let fetch = match &album.id {
        None => library.fetch_assets(media_type)?,
        Some(id) => {
            let smart = SmartAlbum {
                id: id.clone(),
                title: album.name.clone(),
                estimated_count: None,
            };
            library.fetch_assets_in(&smart, media_type)?
        }
    };
    Ok(AlbumInfo::new(album.id.clone(), album.name.clone(), fetch))
}

/// The members of `album`, in fetch order
pub fn album_assets(album: &AlbumInfo) -> Vec<Asset> {
    album.fetch.iter().cloned().collect()
}
