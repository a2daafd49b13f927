mod album;
mod catalog;
mod config;
mod decoder;
mod duplicate;
mod error;
mod exif_reader;
mod geo;
mod identity;
mod metadata;
mod normalize;
mod scan;
mod sync;
mod tags;

pub use album::{
    album_title, AlbumIndex, AlbumResolver, AlbumSettings, CreationPolicy, Resolution,
    SortOutcome, DEFAULT_ALBUM_NAME_MAX_LEN,
};
pub use catalog::{
    storage_url, AlbumDescriptor, AlbumId, AlbumRecord, Catalog, CatalogError, CatalogResult,
    CatalogSnapshot, JsonCatalog, MemoryCatalog, PhotoRecord,
};
pub use config::{app_paths, load_config, save_config, AppPaths, GeocodingConfig, SyncConfig};
pub use decoder::SystemDecoder;
pub use duplicate::{check as check_duplicate, exists as is_duplicate, DuplicateCheck};
pub use error::{SyncError, SyncResult};
pub use geo::{annotate, country_name, AddressComponents, GeocodeError, Geocoder, NominatimGeocoder};
pub use identity::{IdentityEngine, Namespace, IDENTITY_WIDTH, MAX_ATTEMPTS};
pub use metadata::{
    Checksum, DescriptiveTags, GeoCoordinates, MediaKind, PhotoMetadata, TimestampSource,
};
pub use normalize::{normalize_file, NormalizeOptions, Normalized};
pub use scan::{collect_batches, sync_tree, AlbumBatch, ScanStats};
pub use sync::{
    FailureRecord, RunReport, SyncDecision, SyncMode, SyncOptions, SyncOrchestrator, SyncOutcome,
};
pub use tags::{DecodeError, ImageTags, IptcMap, Rational, TagDecoder, TagMap, TagValue, VideoProbe};
