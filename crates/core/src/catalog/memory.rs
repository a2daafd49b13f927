use super::{
    AlbumDescriptor, AlbumId, AlbumRecord, Catalog, CatalogError, CatalogResult, PhotoRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub albums: Vec<AlbumRecord>,
    #[serde(default)]
    pub photos: Vec<PhotoRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    data: CatalogSnapshot,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(data: CatalogSnapshot) -> Self {
        Self { data }
    }

    pub fn snapshot(&self) -> &CatalogSnapshot {
        &self.data
    }

    pub fn albums(&self) -> &[AlbumRecord] {
        &self.data.albums
    }

    pub fn photos(&self) -> &[PhotoRecord] {
        &self.data.photos
    }

    fn album_mut(&mut self, id: AlbumId) -> Option<&mut AlbumRecord> {
        self.data.albums.iter_mut().find(|a| a.id == id)
    }
}

impl Catalog for MemoryCatalog {
    fn load_albums(&self) -> CatalogResult<Vec<AlbumDescriptor>> {
        Ok(self.data.albums.iter().map(AlbumRecord::descriptor).collect())
    }

    fn find_album_id(&self, name: &str, parent: Option<AlbumId>) -> CatalogResult<Option<AlbumId>> {
        Ok(self
            .data
            .albums
            .iter()
            .find(|a| a.title == name && a.parent_id == parent)
            .map(|a| a.id))
    }

    fn album_id_exists(&self, id: AlbumId) -> CatalogResult<bool> {
        Ok(self.data.albums.iter().any(|a| a.id == id))
    }

    fn album_titles(&self, ids: &[AlbumId]) -> CatalogResult<Vec<String>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.data.albums.iter().find(|a| a.id == *id))
            .map(|a| a.title.clone())
            .collect())
    }

    fn create_album(&mut self, record: AlbumRecord) -> CatalogResult<AlbumId> {
        if self.album_id_exists(record.id)? {
            return Err(CatalogError::Conflict(format!("album id {} taken", record.id)));
        }
        if self.find_album_id(&record.title, record.parent_id)?.is_some() {
            return Err(CatalogError::Conflict(format!(
                "album '{}' already exists under that parent",
                record.title
            )));
        }
        if let Some(parent) = record.parent_id {
            if !self.album_id_exists(parent)? {
                return Err(CatalogError::NotFound(parent));
            }
        }
        let id = record.id;
        self.data.albums.push(record);
        Ok(id)
    }

    fn photo_id_exists(&self, id: &str) -> CatalogResult<bool> {
        Ok(self.data.photos.iter().any(|p| p.id == id))
    }

    fn photo_exists(&self, album: AlbumId, title: &str, checksum: &str) -> CatalogResult<bool> {
        Ok(self
            .data
            .photos
            .iter()
            .any(|p| p.album_id == album && (p.title == title || p.checksum == checksum)))
    }

    fn find_albums_containing(&self, title: &str, checksum: &str) -> CatalogResult<Vec<AlbumId>> {
        let ids: BTreeSet<AlbumId> = self
            .data
            .photos
            .iter()
            .filter(|p| p.title == title || p.checksum == checksum)
            .map(|p| p.album_id)
            .collect();
        Ok(ids.into_iter().collect())
    }

    fn create_photo(&mut self, record: PhotoRecord) -> CatalogResult<()> {
        if self.photo_id_exists(&record.id)? {
            return Err(CatalogError::Conflict(format!("photo id {} taken", record.id)));
        }
        if !self.album_id_exists(record.album_id)? {
            return Err(CatalogError::NotFound(record.album_id));
        }
        self.data.photos.push(record);
        Ok(())
    }

    fn erase_album_contents(&mut self, album: AlbumId) -> CatalogResult<Vec<String>> {
        let mut urls = Vec::new();
        self.data.photos.retain(|p| {
            if p.album_id == album {
                urls.push(p.url.clone());
                false
            } else {
                true
            }
        });
        Ok(urls)
    }

    fn drop_all_catalog_data(&mut self) -> CatalogResult<()> {
        self.data = CatalogSnapshot::default();
        Ok(())
    }

    fn renumber_album(&mut self, old: AlbumId, new: AlbumId) -> CatalogResult<()> {
        if old == new {
            return Ok(());
        }
        if self.album_id_exists(new)? {
            return Err(CatalogError::Conflict(format!("album id {} taken", new)));
        }
        let album = self.album_mut(old).ok_or(CatalogError::NotFound(old))?;
        album.id = new;
        for child in self.data.albums.iter_mut() {
            if child.parent_id == Some(old) {
                child.parent_id = Some(new);
            }
        }
        for photo in self.data.photos.iter_mut() {
            if photo.album_id == old {
                photo.album_id = new;
            }
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{album, photo};
    use super::*;

    fn seeded() -> MemoryCatalog {
        let mut catalog = MemoryCatalog::new();
        catalog.create_album(album(10, "2020", None)).expect("album");
        catalog.create_album(album(11, "Summer", Some(10))).expect("album");
        catalog.create_album(album(12, "Winter", Some(10))).expect("album");
        catalog
            .create_photo(photo("p1", 11, "a.jpg", "aaa"))
            .expect("photo");
        catalog
            .create_photo(photo("p2", 11, "b.jpg", "bbb"))
            .expect("photo");
        catalog
            .create_photo(photo("p3", 12, "c.jpg", "aaa"))
            .expect("photo");
        catalog
    }

    #[test]
    fn album_lookup_distinguishes_root_from_parent_zero() {
        let mut catalog = MemoryCatalog::new();
        catalog.create_album(album(0, "zero", None)).expect("album");
        catalog.create_album(album(5, "x", None)).expect("album");
        catalog.create_album(album(6, "x", Some(0))).expect("album");

        assert_eq!(catalog.find_album_id("x", None).expect("find"), Some(AlbumId(5)));
        assert_eq!(
            catalog.find_album_id("x", Some(AlbumId(0))).expect("find"),
            Some(AlbumId(6))
        );
    }

    #[test]
    fn duplicate_album_under_same_parent_is_rejected() {
        let mut catalog = seeded();
        let err = catalog
            .create_album(album(99, "Summer", Some(10)))
            .expect_err("conflict");
        assert!(matches!(err, CatalogError::Conflict(_)));
        let err = catalog
            .create_album(album(98, "Orphan", Some(404)))
            .expect_err("missing parent");
        assert!(matches!(err, CatalogError::NotFound(AlbumId(404))));
    }

    #[test]
    fn photo_exists_matches_title_or_checksum_within_album() {
        let catalog = seeded();
        assert!(catalog.photo_exists(AlbumId(11), "a.jpg", "zzz").expect("q"));
        assert!(catalog.photo_exists(AlbumId(11), "new.jpg", "bbb").expect("q"));
        assert!(!catalog.photo_exists(AlbumId(11), "c.jpg", "ccc").expect("q"));
        assert_eq!(
            catalog.find_albums_containing("none", "aaa").expect("q"),
            vec![AlbumId(11), AlbumId(12)]
        );
    }

    #[test]
    fn erase_returns_urls_and_keeps_other_albums() {
        let mut catalog = seeded();
        let mut urls = catalog.erase_album_contents(AlbumId(11)).expect("erase");
        urls.sort();
        assert_eq!(urls, vec!["p1.jpg".to_string(), "p2.jpg".to_string()]);
        assert_eq!(catalog.photos().len(), 1);
        assert_eq!(catalog.albums().len(), 3);
    }

    #[test]
    fn renumber_moves_photos_and_children() {
        let mut catalog = seeded();
        catalog
            .renumber_album(AlbumId(10), AlbumId(20))
            .expect("renumber");
        assert!(!catalog.album_id_exists(AlbumId(10)).expect("q"));
        assert_eq!(
            catalog.find_album_id("Summer", Some(AlbumId(20))).expect("q"),
            Some(AlbumId(11))
        );

        catalog
            .renumber_album(AlbumId(11), AlbumId(30))
            .expect("renumber");
        assert!(catalog.photo_exists(AlbumId(30), "a.jpg", "").expect("q"));
        assert!(!catalog.photo_exists(AlbumId(11), "a.jpg", "").expect("q"));
    }

    #[test]
    fn renumber_onto_taken_id_changes_nothing() {
        let mut catalog = seeded();
        let before = catalog.snapshot().clone();
        let err = catalog
            .renumber_album(AlbumId(11), AlbumId(12))
            .expect_err("taken");
        assert!(matches!(err, CatalogError::Conflict(_)));
        assert_eq!(catalog.snapshot(), &before);
    }

    #[test]
    fn drop_all_empties_everything() {
        let mut catalog = seeded();
        catalog.drop_all_catalog_data().expect("drop");
        assert!(catalog.albums().is_empty());
        assert!(catalog.photos().is_empty());
    }
}
