use crate::catalog::{AlbumId, Catalog};
use crate::error::SyncError;
use crate::metadata::PhotoMetadata;
use log::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateCheck {
    /// Same name or same checksum already stored in the target album.
    pub in_album: bool,
    /// Titles of other albums holding the same name or checksum.
    pub other_albums: Vec<String>,
}

/// Looks the file up by original file name and checksum. Matches in other
/// albums are only reported.
pub fn check(
    catalog: &dyn Catalog,
    metadata: &PhotoMetadata,
    album: AlbumId,
) -> Result<DuplicateCheck, SyncError> {
    let title = metadata.original_name.as_str();
    let checksum = metadata.checksum.as_str();

    let in_album = catalog.photo_exists(album, title, checksum)?;
    let others: Vec<AlbumId> = catalog
        .find_albums_containing(title, checksum)?
        .into_iter()
        .filter(|id| *id != album)
        .collect();
    let other_albums = if others.is_empty() {
        Vec::new()
    } else {
        catalog.album_titles(&others)?
    };

    if !other_albums.is_empty() {
        warn!(
            "{} ({}) also exists in album(s): {}",
            title,
            checksum,
            other_albums.join(", ")
        );
    }

    Ok(DuplicateCheck {
        in_album,
        other_albums,
    })
}

pub fn exists(
    catalog: &dyn Catalog,
    metadata: &PhotoMetadata,
    album: AlbumId,
) -> Result<bool, SyncError> {
    Ok(catalog.photo_exists(
        album,
        &metadata.original_name,
        metadata.checksum.as_str(),
    )?)
}
