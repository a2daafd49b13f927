mod exif_rules;
mod iptc;
mod video;

use exif_rules::apply_exif_rules;
use iptc::apply_iptc_rules;
use video::apply_video_probe;

use crate::error::SyncError;
use crate::metadata::{
    guess_mime, is_starred, resolve_capture_time, size_label, Checksum, MediaKind,
    PartialMetadata, PhotoMetadata,
};
use crate::tags::TagDecoder;
use chrono::NaiveDateTime;
use log::{debug, warn};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    pub read_iptc: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self { read_iptc: true }
    }
}

/// Result of a normalization pass. `issues` holds the recovered errors
/// (unreadable metadata, single tags that failed to decode).
#[derive(Debug)]
pub struct Normalized {
    pub metadata: PhotoMetadata,
    pub issues: Vec<SyncError>,
}

/// Turns a media file into its canonical record. Only a file that cannot be
/// read at all is an error; tag problems fall back to defaults.
pub fn normalize_file(
    decoder: &mut dyn TagDecoder,
    path: &Path,
    kind: MediaKind,
    options: NormalizeOptions,
    now: NaiveDateTime,
) -> Result<Normalized, SyncError> {
    let unreadable = |reason: String| SyncError::MetadataUnreadable {
        path: path.to_path_buf(),
        reason,
    };

    let file_name = path
        .file_name()
        .map(|v| v.to_string_lossy().to_string())
        .ok_or_else(|| unreadable("path has no file name".to_string()))?;
    let bytes = fs::metadata(path)
        .map_err(|e| unreadable(e.to_string()))?
        .len();
    let checksum = Checksum::of_file(path).map_err(|e| unreadable(format!("{e:#}")))?;

    let mut issues = Vec::new();
    let partial = match kind {
        MediaKind::Photo => photo_pass(decoder, path, &file_name, options, &mut issues),
        MediaKind::Video => video_pass(decoder, path, &file_name, &mut issues),
    };

    let (captured_at, capture_source) =
        resolve_capture_time(partial.take_date.as_deref(), partial.take_time.as_deref(), now);
    let (width, height) = partial.dimensions.unwrap_or((0, 0));

    debug!(
        "normalized {} ({:?}, {} issue(s))",
        path.display(),
        kind,
        issues.len()
    );

    let metadata = PhotoMetadata {
        star: is_starred(&file_name),
        title: partial.title.unwrap_or_else(|| file_name.clone()),
        mime_type: guess_mime(path),
        source_path: path.to_path_buf(),
        original_name: file_name,
        checksum,
        kind,
        width,
        height,
        size_label: size_label(bytes),
        orientation: partial.orientation.unwrap_or(1),
        iso: partial.iso.unwrap_or_default(),
        aperture: partial.aperture.unwrap_or_default(),
        shutter_speed: partial.shutter_speed.unwrap_or_default(),
        exposure: partial.exposure.unwrap_or_default(),
        focal: partial.focal.unwrap_or_default(),
        lens: partial.lens.unwrap_or_default(),
        make: partial.make.unwrap_or_default(),
        model: partial.model.unwrap_or_default(),
        captured_at,
        capture_source,
        geo: partial.geo,
        tags: partial.tags,
        description: partial.description.unwrap_or_default(),
    };

    Ok(Normalized { metadata, issues })
}

fn photo_pass(
    decoder: &mut dyn TagDecoder,
    path: &Path,
    file_name: &str,
    options: NormalizeOptions,
    issues: &mut Vec<SyncError>,
) -> PartialMetadata {
    let mut merged = PartialMetadata::default();

    if options.read_iptc {
        match decoder.decode_iptc(path) {
            Ok(iptc) => {
                let (partial, rule_issues) = apply_iptc_rules(&iptc, file_name, path);
                merged = partial;
                issues.extend(rule_issues);
            }
            Err(err) => {
                warn!("some IPTC data won't be available for {}: {}", path.display(), err);
                issues.push(SyncError::metadata_unreadable(path, err));
            }
        }
    }

    match decoder.decode_image_tags(path) {
        Ok(image) => {
            let (mut partial, rule_issues) = apply_exif_rules(&image.tags, path);
            partial.dimensions = image.dimensions;
            merged.merge_missing_from(&partial);
            issues.extend(rule_issues);
        }
        Err(err) => {
            warn!("some exif data won't be available for {}: {}", path.display(), err);
            issues.push(SyncError::metadata_unreadable(path, err));
        }
    }

    merged
}

fn video_pass(
    decoder: &mut dyn TagDecoder,
    path: &Path,
    file_name: &str,
    issues: &mut Vec<SyncError>,
) -> PartialMetadata {
    let probed = decoder
        .probe_video(path)
        .map_err(|err| SyncError::metadata_unreadable(path, err))
        .and_then(|probe| apply_video_probe(&probe, file_name));

    match probed {
        Ok(partial) => partial,
        Err(err) => {
            warn!("video metadata not available for {}: {}", path.display(), err);
            issues.push(err);
            PartialMetadata {
                title: Some(file_name.to_string()),
                ..PartialMetadata::default()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::tags::{DecodeError, ImageTags, IptcMap, TagDecoder, VideoProbe};
    use std::path::Path;

    /// Decoder returning canned maps; `None` simulates a decode failure.
    #[derive(Default, Clone)]
    pub struct ScriptedDecoder {
        pub image: Option<ImageTags>,
        pub iptc: Option<IptcMap>,
        pub video: Option<VideoProbe>,
    }

    impl TagDecoder for ScriptedDecoder {
        fn decode_image_tags(&mut self, _: &Path) -> Result<ImageTags, DecodeError> {
            self.image
                .clone()
                .ok_or_else(|| DecodeError::Unreadable("scripted".to_string()))
        }

        fn decode_iptc(&mut self, _: &Path) -> Result<IptcMap, DecodeError> {
            self.iptc
                .clone()
                .ok_or_else(|| DecodeError::Unreadable("scripted".to_string()))
        }

        fn probe_video(&mut self, _: &Path) -> Result<VideoProbe, DecodeError> {
            self.video
                .clone()
                .ok_or_else(|| DecodeError::Tool("scripted".to_string()))
        }
    }
}
