use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "gif", "png"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
        if PHOTO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Photo)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimestampSource {
    Tag,
    ProcessTime,
}

/// Hex SHA-1 of the file content. Only constructible from bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    pub fn of_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("could not open for checksum: {}", path.display()))?;
        let mut reader = BufReader::new(file);
        let mut hasher = Sha1::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = reader
                .read(&mut buf)
                .with_context(|| format!("could not read for checksum: {}", path.display()))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Self(hex::encode(hasher.finalize())))
    }

    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha1::digest(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinates {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub direction: Option<f64>,
}

impl GeoCoordinates {
    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

/// Ordered tag list that never holds the same tag twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptiveTags(Vec<String>);

impl DescriptiveTags {
    pub fn push_unique(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.contains(tag) {
            return false;
        }
        self.0.push(tag.to_string());
        true
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn joined(&self) -> String {
        self.0.join(", ")
    }
}

impl<'a> FromIterator<&'a str> for DescriptiveTags {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut tags = DescriptiveTags::default();
        for tag in iter {
            tags.push_unique(tag);
        }
        tags
    }
}

/// Canonical per-file record produced by the normalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoMetadata {
    pub original_name: String,
    pub source_path: PathBuf,
    pub checksum: Checksum,
    pub kind: MediaKind,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub size_label: String,
    pub orientation: i64,
    pub iso: String,
    pub aperture: String,
    pub shutter_speed: String,
    pub exposure: String,
    pub focal: String,
    pub lens: String,
    pub make: String,
    pub model: String,
    pub captured_at: NaiveDateTime,
    pub capture_source: TimestampSource,
    pub geo: GeoCoordinates,
    pub tags: DescriptiveTags,
    pub title: String,
    pub description: String,
    pub star: bool,
}

impl PhotoMetadata {
    /// Value stored in the catalog's `shutter` column.
    pub fn shutter_column(&self) -> &str {
        if self.exposure.is_empty() {
            &self.shutter_speed
        } else {
            &self.exposure
        }
    }
}

/// Fields gathered by the tag passes before defaults are applied.
#[derive(Debug, Clone, Default)]
pub struct PartialMetadata {
    pub dimensions: Option<(u32, u32)>,
    pub orientation: Option<i64>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub iso: Option<String>,
    pub aperture: Option<String>,
    pub shutter_speed: Option<String>,
    pub exposure: Option<String>,
    pub focal: Option<String>,
    pub lens: Option<String>,
    pub take_date: Option<String>,
    pub take_time: Option<String>,
    pub geo: GeoCoordinates,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: DescriptiveTags,
}

impl PartialMetadata {
    pub fn merge_missing_from(&mut self, fallback: &PartialMetadata) {
        if self.dimensions.is_none() {
            self.dimensions = fallback.dimensions;
        }
        if self.orientation.is_none() {
            self.orientation = fallback.orientation;
        }
        fill(&mut self.make, &fallback.make);
        fill(&mut self.model, &fallback.model);
        fill(&mut self.iso, &fallback.iso);
        fill(&mut self.aperture, &fallback.aperture);
        fill(&mut self.shutter_speed, &fallback.shutter_speed);
        fill(&mut self.exposure, &fallback.exposure);
        fill(&mut self.focal, &fallback.focal);
        fill(&mut self.lens, &fallback.lens);
        fill(&mut self.take_date, &fallback.take_date);
        fill(&mut self.take_time, &fallback.take_time);
        fill(&mut self.title, &fallback.title);
        fill(&mut self.description, &fallback.description);
        if self.geo.latitude.is_none() && self.geo.longitude.is_none() {
            self.geo = fallback.geo;
        }
        for tag in fallback.tags.iter() {
            self.tags.push_unique(tag);
        }
    }
}

fn fill(slot: &mut Option<String>, fallback: &Option<String>) {
    if slot.is_none() {
        slot.clone_from(fallback);
    }
}

pub fn resolve_capture_time(
    take_date: Option<&str>,
    take_time: Option<&str>,
    now: NaiveDateTime,
) -> (NaiveDateTime, TimestampSource) {
    let Some(date) = take_date
        .map(|d| d.trim().replace(':', "-"))
        .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok())
    else {
        return (now, TimestampSource::ProcessTime);
    };

    let time = take_time
        .and_then(parse_time)
        .unwrap_or(NaiveTime::MIN);
    (date.and_time(time), TimestampSource::Tag)
}

fn parse_time(input: &str) -> Option<NaiveTime> {
    let trimmed = input.trim();
    let candidates = ["%H:%M:%S", "%H:%M:%S%.f", "%H:%M"];
    for fmt in candidates {
        if let Ok(t) = NaiveTime::parse_from_str(trimmed, fmt) {
            return Some(t);
        }
    }
    trimmed.get(..8).and_then(|head| NaiveTime::parse_from_str(head, "%H:%M:%S").ok())
}

pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

pub fn size_label(bytes: u64) -> String {
    let size_kb = bytes / 1024;
    if size_kb > 1024 {
        format!("{:.2} MB", size_kb as f64 / 1024.0)
    } else {
        format!("{} KB", size_kb)
    }
}

pub fn guess_mime(path: &Path) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
    .to_string()
}

pub fn is_starred(file_name: &str) -> bool {
    file_name.contains("star") || file_name.contains("cover")
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5))
            .expect("valid date")
    }

    #[test]
    fn media_kind_is_case_insensitive() {
        assert_eq!(
            MediaKind::from_path(Path::new("/a/IMG_1.JPG")),
            Some(MediaKind::Photo)
        );
        assert_eq!(
            MediaKind::from_path(Path::new("clip.MOV")),
            Some(MediaKind::Video)
        );
        assert_eq!(MediaKind::from_path(Path::new("notes.txt")), None);
        assert_eq!(MediaKind::from_path(Path::new("README")), None);
    }

    #[test]
    fn checksum_matches_known_sha1() {
        let sum = Checksum::of_bytes(b"abc");
        assert_eq!(sum.as_str(), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn checksum_of_file_equals_checksum_of_bytes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("a.jpg");
        std::fs::write(&path, b"payload").expect("write");
        let from_file = Checksum::of_file(&path).expect("checksum");
        assert_eq!(from_file, Checksum::of_bytes(b"payload"));
    }

    #[test]
    fn descriptive_tags_drop_duplicates_and_blanks() {
        let tags: DescriptiveTags = ["beach", "sun", "beach", " ", "sun "].into_iter().collect();
        assert_eq!(tags.joined(), "beach, sun");
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn capture_time_prefers_tag_values() {
        let (at, source) =
            resolve_capture_time(Some("2020:07:14"), Some("10:22:01"), fixed_now());
        assert_eq!(source, TimestampSource::Tag);
        assert_eq!(at.format("%Y-%m-%d %H:%M:%S").to_string(), "2020-07-14 10:22:01");
    }

    #[test]
    fn capture_time_without_time_is_midnight() {
        let (at, source) = resolve_capture_time(Some("2020-07-14"), None, fixed_now());
        assert_eq!(source, TimestampSource::Tag);
        assert_eq!(at.format("%H:%M:%S").to_string(), "00:00:00");
    }

    #[test]
    fn capture_time_accepts_video_suffixes() {
        let (at, _) = resolve_capture_time(
            Some("2019-06-01"),
            Some("12:30:45.000000Z"),
            fixed_now(),
        );
        assert_eq!(at.format("%H:%M:%S").to_string(), "12:30:45");
    }

    #[test]
    fn capture_time_falls_back_to_now() {
        let (at, source) = resolve_capture_time(Some("garbage"), Some("10:00:00"), fixed_now());
        assert_eq!(source, TimestampSource::ProcessTime);
        assert_eq!(at, fixed_now());

        let (_, source) = resolve_capture_time(None, None, fixed_now());
        assert_eq!(source, TimestampSource::ProcessTime);
    }

    #[test]
    fn size_label_switches_to_megabytes() {
        assert_eq!(size_label(500 * 1024), "500 KB");
        assert_eq!(size_label(1024 * 1024), "1024 KB");
        assert_eq!(size_label(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn merge_missing_from_only_fills_missing_fields() {
        let mut base = PartialMetadata {
            make: Some("SONY".to_string()),
            ..PartialMetadata::default()
        };
        base.tags.push_unique("a");
        let mut fallback = PartialMetadata {
            make: Some("FUJIFILM".to_string()),
            model: Some("X-T5".to_string()),
            ..PartialMetadata::default()
        };
        fallback.tags.push_unique("a");
        fallback.tags.push_unique("b");

        base.merge_missing_from(&fallback);
        assert_eq!(base.make.as_deref(), Some("SONY"));
        assert_eq!(base.model.as_deref(), Some("X-T5"));
        assert_eq!(base.tags.joined(), "a, b");
    }

    #[test]
    fn star_from_file_name() {
        assert!(is_starred("cover_photo.jpg"));
        assert!(is_starred("IMG_star.jpg"));
        assert!(!is_starred("IMG_0001.jpg"));
    }
}
