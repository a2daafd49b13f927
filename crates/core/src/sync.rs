use crate::album::{
    AlbumIndex, AlbumResolver, AlbumSettings, CreationPolicy, Resolution, SortOutcome,
};
use crate::catalog::{AlbumId, Catalog, PhotoRecord};
use crate::duplicate;
use crate::error::SyncError;
use crate::geo::{self, Geocoder};
use crate::identity::{IdentityEngine, Namespace};
use crate::metadata::{now_local, MediaKind, PhotoMetadata};
use crate::normalize::{normalize_file, NormalizeOptions};
use crate::tags::TagDecoder;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    #[default]
    Normal,
    /// Erase an album's contents when a file is already stored there.
    Replace,
    /// Clear the whole catalog once, before anything else happens.
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    Create,
    SkipExisting,
    ReplaceAndCreate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub path: PathBuf,
    pub album: String,
    pub checksum: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<FailureRecord>,
    pub erased_urls: Vec<String>,
    pub albums_renumbered: usize,
    pub renumber_failures: usize,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    pub fn summary(&self) -> String {
        if self.is_clean() {
            "clean".to_string()
        } else {
            format!("completed with {} failures", self.failed)
        }
    }

    fn record(&mut self, outcome: &SyncOutcome) {
        match outcome {
            SyncOutcome::Created => self.created += 1,
            SyncOutcome::Skipped => self.skipped += 1,
            SyncOutcome::Failed(_) => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    pub mode: SyncMode,
    pub public: bool,
    pub sort_album_by_name: bool,
    pub albums: AlbumSettings,
    pub normalize: NormalizeOptions,
}

enum Stage {
    Discovered,
    MetadataExtracted(Box<PhotoMetadata>),
    IdentityAssigned(Box<PhotoMetadata>, String),
    Classified(SyncDecision, Box<PhotoMetadata>, String),
    Finished(SyncOutcome),
}

/// Drives one run: owns the album index and identity engine for its whole
/// lifetime and folds every recoverable error into a per-file outcome.
pub struct SyncOrchestrator<C: Catalog> {
    catalog: C,
    decoder: Box<dyn TagDecoder>,
    geocoder: Option<Box<dyn Geocoder>>,
    identity: IdentityEngine,
    index: AlbumIndex,
    options: SyncOptions,
    report: RunReport,
}

impl<C: Catalog> SyncOrchestrator<C> {
    pub fn new(
        catalog: C,
        decoder: Box<dyn TagDecoder>,
        options: SyncOptions,
    ) -> Result<Self, SyncError> {
        Self::with_identity(catalog, decoder, options, IdentityEngine::new())
    }

    pub fn with_identity(
        mut catalog: C,
        decoder: Box<dyn TagDecoder>,
        options: SyncOptions,
        identity: IdentityEngine,
    ) -> Result<Self, SyncError> {
        if options.mode == SyncMode::Delete {
            warn!("dropping all albums and photos from the catalog");
            catalog.drop_all_catalog_data()?;
        }
        let index = AlbumIndex::load(&catalog)?;
        Ok(Self {
            catalog,
            decoder,
            geocoder: None,
            identity,
            index,
            options,
            report: RunReport::default(),
        })
    }

    pub fn with_geocoder(mut self, geocoder: Box<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn mode(&self) -> SyncMode {
        self.options.mode
    }

    pub fn album_path(&self, album: AlbumId) -> String {
        let path = self.index.path_of(album);
        if path.is_empty() {
            album.to_string()
        } else {
            path.join("/")
        }
    }

    pub fn resolve_album(
        &mut self,
        segments: &[String],
        policy: CreationPolicy,
    ) -> Result<Resolution, SyncError> {
        self.resolver().resolve(segments, policy)
    }

    fn resolver(&mut self) -> AlbumResolver<'_> {
        AlbumResolver::new(
            &mut self.index,
            &mut self.identity,
            &mut self.catalog,
            self.options.albums,
        )
    }

    /// Runs one file through extraction, identity, classification and
    /// persistence. Only fatal errors are returned as `Err`.
    pub fn process_file(
        &mut self,
        path: &Path,
        album: AlbumId,
        mode: SyncMode,
    ) -> Result<SyncOutcome, SyncError> {
        let mut stage = Stage::Discovered;
        let mut checksum: Option<String> = None;

        let outcome = loop {
            let step = match stage {
                Stage::Discovered => self
                    .extract(path)
                    .map(|meta| Stage::MetadataExtracted(Box::new(meta))),
                Stage::MetadataExtracted(meta) => {
                    checksum = Some(meta.checksum.to_string());
                    self.assign_identity()
                        .map(|id| Stage::IdentityAssigned(meta, id))
                }
                Stage::IdentityAssigned(meta, id) => self
                    .classify(&meta, album, mode)
                    .map(|decision| Stage::Classified(decision, meta, id)),
                Stage::Classified(decision, meta, id) => self
                    .persist(decision, &meta, &id, album)
                    .map(Stage::Finished),
                Stage::Finished(outcome) => break outcome,
            };
            stage = match step {
                Ok(next) => next,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => Stage::Finished(self.fail(path, album, checksum.clone(), err)),
            };
        };

        self.report.record(&outcome);
        Ok(outcome)
    }

    fn extract(&mut self, path: &Path) -> Result<PhotoMetadata, SyncError> {
        let kind = MediaKind::from_path(path).ok_or_else(|| SyncError::MetadataUnreadable {
            path: path.to_path_buf(),
            reason: "unsupported file type".to_string(),
        })?;
        let normalized = normalize_file(
            self.decoder.as_mut(),
            path,
            kind,
            self.options.normalize,
            now_local(),
        )?;
        let mut metadata = normalized.metadata;
        if let Some(geocoder) = self.geocoder.as_mut() {
            geo::annotate(geocoder.as_mut(), &mut metadata);
        }
        Ok(metadata)
    }

    fn assign_identity(&mut self) -> Result<String, SyncError> {
        let catalog = &self.catalog;
        self.identity
            .get_unique(Namespace::Photo, |token| Ok(catalog.photo_id_exists(token)?))
    }

    fn classify(
        &self,
        metadata: &PhotoMetadata,
        album: AlbumId,
        mode: SyncMode,
    ) -> Result<SyncDecision, SyncError> {
        let found = duplicate::check(&self.catalog, metadata, album)?;
        Ok(match (found.in_album, mode) {
            (false, _) => SyncDecision::Create,
            (true, SyncMode::Replace) => SyncDecision::ReplaceAndCreate,
            (true, SyncMode::Normal | SyncMode::Delete) => SyncDecision::SkipExisting,
        })
    }

    fn persist(
        &mut self,
        decision: SyncDecision,
        metadata: &PhotoMetadata,
        id: &str,
        album: AlbumId,
    ) -> Result<SyncOutcome, SyncError> {
        match decision {
            SyncDecision::SkipExisting => {
                info!(
                    "{} already in album {}, skipped",
                    metadata.original_name,
                    self.album_path(album)
                );
                return Ok(SyncOutcome::Skipped);
            }
            SyncDecision::ReplaceAndCreate => {
                let urls = self.catalog.erase_album_contents(album)?;
                info!(
                    "erased {} photo(s) from album {}",
                    urls.len(),
                    self.album_path(album)
                );
                self.report.erased_urls.extend(urls);
            }
            SyncDecision::Create => {}
        }

        let record = PhotoRecord::from_metadata(id, metadata, album, self.options.public, now_local());
        self.catalog.create_photo(record)?;
        info!(
            "added {} to album {} as {}",
            metadata.original_name,
            self.album_path(album),
            id
        );
        Ok(SyncOutcome::Created)
    }

    fn fail(
        &mut self,
        path: &Path,
        album: AlbumId,
        checksum: Option<String>,
        err: SyncError,
    ) -> SyncOutcome {
        let album = self.album_path(album);
        self.record_failure(path, album, checksum, &err)
    }

    /// Books a failure for a file that never reached `process_file`, e.g.
    /// because its album could not be created.
    pub fn fail_unplaced(&mut self, path: &Path, album: String, err: &SyncError) -> SyncOutcome {
        let outcome = self.record_failure(path, album, None, err);
        self.report.record(&outcome);
        outcome
    }

    fn record_failure(
        &mut self,
        path: &Path,
        album: String,
        checksum: Option<String>,
        err: &SyncError,
    ) -> SyncOutcome {
        error!(
            "failed to sync {} (album: {}, checksum: {}): {}",
            path.display(),
            album,
            checksum.as_deref().unwrap_or("-"),
            err
        );
        let reason = err.to_string();
        self.report.failures.push(FailureRecord {
            path: path.to_path_buf(),
            album,
            checksum,
            reason: reason.clone(),
        });
        SyncOutcome::Failed(reason)
    }

    /// Runs the name-sort post pass when enabled and hands back the report.
    pub fn finish(mut self) -> Result<RunReport, SyncError> {
        if self.options.sort_album_by_name {
            let SortOutcome { moved, failures } = self.resolver().sort_by_name()?;
            self.report.albums_renumbered = moved;
            self.report.renumber_failures = failures.len();
        }
        info!(
            "sync {}: {} created, {} skipped, {} failed",
            self.report.summary(),
            self.report.created,
            self.report.skipped,
            self.report.failed
        );
        Ok(self.report)
    }
}
