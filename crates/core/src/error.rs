use crate::catalog::CatalogError;
use crate::geo::GeocodeError;
use crate::tags::DecodeError;
use std::path::PathBuf;
use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("catalog unreachable: {0}")]
    Connectivity(String),
    #[error("metadata unreadable for {path}: {reason}")]
    MetadataUnreadable { path: PathBuf, reason: String },
    #[error("tag {tag} could not be decoded: {reason}")]
    TagDecode { tag: String, reason: String },
    #[error("no unique {namespace} identity after {attempts} attempts")]
    IdentityExhausted {
        namespace: &'static str,
        attempts: usize,
    },
    #[error("reverse geocoding failed: {0}")]
    Geocode(#[from] GeocodeError),
    #[error("catalog write failed: {0}")]
    PersistenceWrite(String),
    #[error("album {old} could not be renumbered to {new}: {reason}")]
    AlbumRenumber { old: u64, new: u64, reason: String },
}

impl SyncError {
    /// Fatal errors abort the whole run; everything else is folded into a
    /// per-file outcome.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Config(_) | SyncError::Connectivity(_))
    }

    pub fn metadata_unreadable(path: impl Into<PathBuf>, err: DecodeError) -> Self {
        SyncError::MetadataUnreadable {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}

impl From<CatalogError> for SyncError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Connectivity(msg) => SyncError::Connectivity(msg),
            other => SyncError::PersistenceWrite(other.to_string()),
        }
    }
}
