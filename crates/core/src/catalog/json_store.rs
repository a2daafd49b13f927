use super::{
    AlbumDescriptor, AlbumId, AlbumRecord, Catalog, CatalogError, CatalogResult, CatalogSnapshot,
    MemoryCatalog, PhotoRecord,
};
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Catalog kept in a JSON snapshot file. Each mutation is written through
/// before it returns.
#[derive(Debug)]
pub struct JsonCatalog {
    path: PathBuf,
    inner: MemoryCatalog,
}

impl JsonCatalog {
    /// Opens the snapshot at `path`. A missing file starts an empty catalog.
    pub fn open(path: &Path) -> CatalogResult<Self> {
        let inner = if path.exists() {
            let snapshot =
                read_snapshot(path).map_err(|e| CatalogError::Connectivity(format!("{e:#}")))?;
            MemoryCatalog::from_snapshot(snapshot)
        } else {
            debug!("no catalog at {}, starting empty", path.display());
            MemoryCatalog::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> &CatalogSnapshot {
        self.inner.snapshot()
    }

    fn mutate<T>(
        &mut self,
        op: impl FnOnce(&mut MemoryCatalog) -> CatalogResult<T>,
    ) -> CatalogResult<T> {
        let before = self.inner.clone();
        let value = op(&mut self.inner)?;
        if let Err(err) = write_snapshot(&self.path, self.inner.snapshot()) {
            self.inner = before;
            return Err(CatalogError::Write(format!("{err:#}")));
        }
        Ok(value)
    }
}

fn read_snapshot(path: &Path) -> Result<CatalogSnapshot> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse catalog: {}", path.display()))
}

fn write_snapshot(path: &Path, snapshot: &CatalogSnapshot) -> Result<()> {
    let body = serde_json::to_string_pretty(snapshot).context("failed to serialize catalog")?;
    let staging = staging_path(path);
    fs::write(&staging, body)
        .with_context(|| format!("failed to write catalog: {}", staging.display()))?;
    fs::rename(&staging, path).with_context(|| {
        format!(
            "failed to move catalog into place: {} -> {}",
            staging.display(),
            path.display()
        )
    })?;
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "catalog.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

impl Catalog for JsonCatalog {
    fn load_albums(&self) -> CatalogResult<Vec<AlbumDescriptor>> {
        self.inner.load_albums()
    }

    fn find_album_id(&self, name: &str, parent: Option<AlbumId>) -> CatalogResult<Option<AlbumId>> {
        self.inner.find_album_id(name, parent)
    }

    fn album_id_exists(&self, id: AlbumId) -> CatalogResult<bool> {
        self.inner.album_id_exists(id)
    }

    fn album_titles(&self, ids: &[AlbumId]) -> CatalogResult<Vec<String>> {
        self.inner.album_titles(ids)
    }

    fn create_album(&mut self, record: AlbumRecord) -> CatalogResult<AlbumId> {
        self.mutate(|c| c.create_album(record))
    }

    fn photo_id_exists(&self, id: &str) -> CatalogResult<bool> {
        self.inner.photo_id_exists(id)
    }

    fn photo_exists(&self, album: AlbumId, title: &str, checksum: &str) -> CatalogResult<bool> {
        self.inner.photo_exists(album, title, checksum)
    }

    fn find_albums_containing(&self, title: &str, checksum: &str) -> CatalogResult<Vec<AlbumId>> {
        self.inner.find_albums_containing(title, checksum)
    }

    fn create_photo(&mut self, record: PhotoRecord) -> CatalogResult<()> {
        self.mutate(|c| c.create_photo(record))
    }

    fn erase_album_contents(&mut self, album: AlbumId) -> CatalogResult<Vec<String>> {
        self.mutate(|c| c.erase_album_contents(album))
    }

    fn drop_all_catalog_data(&mut self) -> CatalogResult<()> {
        self.mutate(|c| c.drop_all_catalog_data())
    }

    fn renumber_album(&mut self, old: AlbumId, new: AlbumId) -> CatalogResult<()> {
        self.mutate(|c| c.renumber_album(old, new))
    }
}
