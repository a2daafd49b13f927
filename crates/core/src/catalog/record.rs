use crate::metadata::{MediaKind, PhotoMetadata};
use chrono::NaiveDateTime;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlbumId(pub u64);

impl fmt::Display for AlbumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Album identity plus its place in the hierarchy. `parent == None` is the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumDescriptor {
    pub id: AlbumId,
    pub name: String,
    pub parent: Option<AlbumId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumRecord {
    pub id: AlbumId,
    pub title: String,
    pub parent_id: Option<AlbumId>,
    pub created_at: String,
    pub public: u8,
    pub description: String,
}

impl AlbumRecord {
    pub fn new(descriptor: &AlbumDescriptor, public: bool, now: NaiveDateTime) -> Self {
        Self {
            id: descriptor.id,
            title: descriptor.name.clone(),
            parent_id: descriptor.parent,
            created_at: now.format(STAMP_FORMAT).to_string(),
            public: u8::from(public),
            description: String::new(),
        }
    }

    pub fn descriptor(&self) -> AlbumDescriptor {
        AlbumDescriptor {
            id: self.id,
            name: self.title.clone(),
            parent: self.parent_id,
        }
    }
}

/// Row written to the application's `photos` table; field names are fixed by
/// its schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub tags: String,
    pub public: u8,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub size: String,
    pub iso: String,
    pub aperture: String,
    pub make: String,
    pub model: String,
    pub lens: String,
    pub shutter: String,
    pub focal: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    #[serde(rename = "imgDirection")]
    pub img_direction: Option<f64>,
    pub takestamp: String,
    pub star: u8,
    #[serde(rename = "thumbUrl")]
    pub thumb_url: String,
    pub album_id: AlbumId,
    pub checksum: String,
    pub created_at: String,
    pub updated_at: String,
    pub medium: String,
    pub small: String,
    pub thumb2x: u8,
}

impl PhotoRecord {
    pub fn from_metadata(
        id: &str,
        meta: &PhotoMetadata,
        album_id: AlbumId,
        public: bool,
        now: NaiveDateTime,
    ) -> Self {
        let url = storage_url(id, &meta.source_path);
        let thumb_url = match meta.kind {
            MediaKind::Photo => url.clone(),
            MediaKind::Video => thumbnail_url(&url),
        };
        let stamp = now.format(STAMP_FORMAT).to_string();

        Self {
            id: id.to_string(),
            title: meta.title.clone(),
            description: meta.description.clone(),
            url,
            tags: meta.tags.joined(),
            public: u8::from(public),
            mime_type: meta.mime_type.clone(),
            width: meta.width,
            height: meta.height,
            size: meta.size_label.clone(),
            iso: meta.iso.clone(),
            aperture: meta.aperture.clone(),
            make: meta.make.clone(),
            model: meta.model.clone(),
            lens: meta.lens.clone(),
            shutter: meta.shutter_column().to_string(),
            focal: meta.focal.clone(),
            latitude: meta.geo.latitude,
            longitude: meta.geo.longitude,
            altitude: meta.geo.altitude,
            img_direction: meta.geo.direction,
            takestamp: meta.captured_at.format(STAMP_FORMAT).to_string(),
            star: u8::from(meta.star),
            thumb_url,
            album_id,
            checksum: meta.checksum.to_string(),
            created_at: stamp.clone(),
            updated_at: stamp,
            medium: String::new(),
            small: String::new(),
            thumb2x: 0,
        }
    }
}

/// `md5(id)` in lower-case hex followed by the source extension.
pub fn storage_url(id: &str, source: &Path) -> String {
    let digest = hex::encode(Md5::digest(id.as_bytes()));
    let ext = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    format!("{}{}", digest, ext).to_lowercase()
}

fn thumbnail_url(url: &str) -> String {
    let stem = Path::new(url)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| url.to_string());
    format!("{}.jpg", stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn storage_url_is_md5_of_id_with_lowercase_extension() {
        let url = storage_url("15000000001234", Path::new("/p/IMG_1.JPG"));
        assert!(url.ends_with(".jpg"));
        assert_eq!(url.len(), 32 + 4);
        assert_eq!(storage_url("abc", Path::new("x.png")), "900150983cd24fb0d6963f7d28e17f72.png");
    }

    #[test]
    fn video_thumbnail_is_jpeg() {
        assert_eq!(thumbnail_url("abcdef.mp4"), "abcdef.jpg");
    }

    #[test]
    fn album_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&AlbumId(15000000001234)).expect("json");
        assert_eq!(json, "15000000001234");
    }

    #[test]
    fn photo_record_uses_schema_field_names() {
        let record = PhotoRecord {
            id: "1".to_string(),
            title: String::new(),
            description: String::new(),
            url: String::new(),
            tags: String::new(),
            public: 0,
            mime_type: "image/jpeg".to_string(),
            width: 0,
            height: 0,
            size: String::new(),
            iso: String::new(),
            aperture: String::new(),
            make: String::new(),
            model: String::new(),
            lens: String::new(),
            shutter: String::new(),
            focal: String::new(),
            latitude: None,
            longitude: None,
            altitude: None,
            img_direction: Some(1.5),
            takestamp: String::new(),
            star: 0,
            thumb_url: String::new(),
            album_id: AlbumId(2),
            checksum: String::new(),
            created_at: String::new(),
            updated_at: String::new(),
            medium: String::new(),
            small: String::new(),
            thumb2x: 0,
        };
        let value = serde_json::to_value(&record).expect("json");
        let Value::Object(map) = value else {
            panic!("record should serialize to an object");
        };
        for key in ["type", "imgDirection", "thumbUrl", "album_id", "thumb2x", "takestamp"] {
            assert!(map.contains_key(key), "missing {key}");
        }
        assert_eq!(map.len(), 31);
    }
}
