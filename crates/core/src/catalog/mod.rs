mod json_store;
mod memory;
mod record;

pub use json_store::JsonCatalog;
#[cfg(test)]
pub(crate) use memory::testing;
pub use memory::{CatalogSnapshot, MemoryCatalog};
pub use record::{storage_url, AlbumDescriptor, AlbumId, AlbumRecord, PhotoRecord, STAMP_FORMAT};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog unreachable: {0}")]
    Connectivity(String),
    #[error("catalog write failed: {0}")]
    Write(String),
    #[error("catalog conflict: {0}")]
    Conflict(String),
    #[error("album {0} not found")]
    NotFound(AlbumId),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Persistence collaborator. Every mutation commits on return; a failed
/// mutation leaves the catalog unchanged.
pub trait Catalog {
    fn load_albums(&self) -> CatalogResult<Vec<AlbumDescriptor>>;
    fn find_album_id(&self, name: &str, parent: Option<AlbumId>) -> CatalogResult<Option<AlbumId>>;
    fn album_id_exists(&self, id: AlbumId) -> CatalogResult<bool>;
    fn album_titles(&self, ids: &[AlbumId]) -> CatalogResult<Vec<String>>;
    fn create_album(&mut self, record: AlbumRecord) -> CatalogResult<AlbumId>;

    fn photo_id_exists(&self, id: &str) -> CatalogResult<bool>;
    fn photo_exists(&self, album: AlbumId, title: &str, checksum: &str) -> CatalogResult<bool>;
    fn find_albums_containing(&self, title: &str, checksum: &str) -> CatalogResult<Vec<AlbumId>>;
    fn create_photo(&mut self, record: PhotoRecord) -> CatalogResult<()>;

    /// Removes the album's photos and returns their storage urls.
    fn erase_album_contents(&mut self, album: AlbumId) -> CatalogResult<Vec<String>>;
    fn drop_all_catalog_data(&mut self) -> CatalogResult<()>;
    /// Moves an album to a new id, together with every photo and child
    /// album that references it. All or nothing.
    fn renumber_album(&mut self, old: AlbumId, new: AlbumId) -> CatalogResult<()>;
}

impl<T: Catalog + ?Sized> Catalog for &mut T {
    fn load_albums(&self) -> CatalogResult<Vec<AlbumDescriptor>> {
        (**self).load_albums()
    }

    fn find_album_id(&self, name: &str, parent: Option<AlbumId>) -> CatalogResult<Option<AlbumId>> {
        (**self).find_album_id(name, parent)
    }

    fn album_id_exists(&self, id: AlbumId) -> CatalogResult<bool> {
        (**self).album_id_exists(id)
    }

    fn album_titles(&self, ids: &[AlbumId]) -> CatalogResult<Vec<String>> {
        (**self).album_titles(ids)
    }

    fn create_album(&mut self, record: AlbumRecord) -> CatalogResult<AlbumId> {
        (**self).create_album(record)
    }

    fn photo_id_exists(&self, id: &str) -> CatalogResult<bool> {
        (**self).photo_id_exists(id)
    }

    fn photo_exists(&self, album: AlbumId, title: &str, checksum: &str) -> CatalogResult<bool> {
        (**self).photo_exists(album, title, checksum)
    }

    fn find_albums_containing(&self, title: &str, checksum: &str) -> CatalogResult<Vec<AlbumId>> {
        (**self).find_albums_containing(title, checksum)
    }

    fn create_photo(&mut self, record: PhotoRecord) -> CatalogResult<()> {
        (**self).create_photo(record)
    }

    fn erase_album_contents(&mut self, album: AlbumId) -> CatalogResult<Vec<String>> {
        (**self).erase_album_contents(album)
    }

    fn drop_all_catalog_data(&mut self) -> CatalogResult<()> {
        (**self).drop_all_catalog_data()
    }

    fn renumber_album(&mut self, old: AlbumId, new: AlbumId) -> CatalogResult<()> {
        (**self).renumber_album(old, new)
    }
}
