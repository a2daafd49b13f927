use crate::album::{AlbumSettings, DEFAULT_ALBUM_NAME_MAX_LEN};
use crate::error::SyncError;
use crate::normalize::NormalizeOptions;
use crate::sync::{SyncMode, SyncOptions};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub catalog_path: Option<PathBuf>,
    pub public_album: bool,
    pub sort_album_by_name: bool,
    pub album_name_max_len: usize,
    pub ffprobe_path: PathBuf,
    pub read_iptc: bool,
    pub geocoding: GeocodingConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            public_album: false,
            sort_album_by_name: false,
            album_name_max_len: DEFAULT_ALBUM_NAME_MAX_LEN,
            ffprobe_path: PathBuf::from("ffprobe"),
            read_iptc: true,
            geocoding: GeocodingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub language: Option<String>,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!("lychee-sync/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 10,
            language: None,
        }
    }
}

impl GeocodingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.album_name_max_len == 0 {
            return Err(SyncError::Config(
                "album_name_max_len must be greater than zero".to_string(),
            ));
        }
        if self.geocoding.enabled && self.geocoding.endpoint.trim().is_empty() {
            return Err(SyncError::Config(
                "geocoding.endpoint must be set when geocoding is enabled".to_string(),
            ));
        }
        if self.geocoding.enabled && self.geocoding.timeout_secs == 0 {
            return Err(SyncError::Config(
                "geocoding.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sync_options(&self, mode: SyncMode) -> SyncOptions {
        SyncOptions {
            mode,
            public: self.public_album,
            sort_album_by_name: self.sort_album_by_name,
            albums: AlbumSettings {
                name_max_len: self.album_name_max_len,
                public: self.public_album,
            },
            normalize: NormalizeOptions {
                read_iptc: self.read_iptc,
            },
        }
    }

    /// Configured catalog file, or `catalog.json` in the data directory.
    pub fn resolve_catalog_path(&self) -> Result<PathBuf, SyncError> {
        match &self.catalog_path {
            Some(path) => Ok(path.clone()),
            None => app_paths()
                .map(|paths| paths.catalog_path)
                .map_err(|e| SyncError::Config(format!("{e:#}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
    pub data_dir: PathBuf,
    pub catalog_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("org", "lychee", "lychee-sync")
        .context("could not determine the user's configuration directory")?;
    let config_dir = proj.config_dir().to_path_buf();
    let data_dir = proj.data_dir().to_path_buf();
    Ok(AppPaths {
        config_path: config_dir.join("config.toml"),
        catalog_path: data_dir.join("catalog.json"),
        config_dir,
        data_dir,
    })
}

/// Loads and validates the configuration. Without an explicit path a missing
/// default file means defaults; an explicit path must exist.
pub fn load_config(explicit: Option<&Path>) -> Result<(SyncConfig, PathBuf), SyncError> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => (
            app_paths()
                .map_err(|e| SyncError::Config(format!("{e:#}")))?
                .config_path,
            false,
        ),
    };

    if !required && !path.exists() {
        return Ok((SyncConfig::default(), path));
    }
    let config = read_config(&path).map_err(|e| SyncError::Config(format!("{e:#}")))?;
    config.validate()?;
    Ok((config, path))
}

fn read_config(path: &Path) -> Result<SyncConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    toml::from_str::<SyncConfig>(&raw)
        .with_context(|| format!("failed to parse config file: {}", path.display()))
}

pub fn save_config(config: &SyncConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory: {}", dir.display()))?;
    }
    let body = toml::to_string_pretty(config).context("failed to serialize config")?;
    fs::write(path, body)
        .with_context(|| format!("failed to write config file: {}", path.display()))?;
    Ok(())
}
