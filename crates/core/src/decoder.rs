use crate::exif_reader::read_image_tags;
use crate::tags::{DecodeError, ImageTags, IptcMap, TagDecoder, VideoProbe};
use exiftool::ExifTool;
use log::debug;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Decoder backed by kamadak-exif for EXIF, a long-lived exiftool process
/// for IPTC and the ffprobe binary for videos.
pub struct SystemDecoder {
    exiftool: Option<ExifTool>,
    ffprobe: PathBuf,
}

impl SystemDecoder {
    pub fn new(ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            exiftool: None,
            ffprobe: ffprobe.into(),
        }
    }

    fn exiftool(&mut self) -> Result<&mut ExifTool, DecodeError> {
        if self.exiftool.is_none() {
            let tool = ExifTool::new().map_err(|e| DecodeError::Tool(format!("exiftool: {e}")))?;
            debug!("exiftool process started");
            self.exiftool = Some(tool);
        }
        self.exiftool
            .as_mut()
            .ok_or_else(|| DecodeError::Tool("exiftool unavailable".to_string()))
    }
}

impl TagDecoder for SystemDecoder {
    fn decode_image_tags(&mut self, path: &Path) -> Result<ImageTags, DecodeError> {
        read_image_tags(path).map_err(|e| DecodeError::Unreadable(format!("{e:#}")))
    }

    fn decode_iptc(&mut self, path: &Path) -> Result<IptcMap, DecodeError> {
        let value = self
            .exiftool()?
            .json(path, &["-IPTC:all"])
            .map_err(|e| DecodeError::Tool(format!("exiftool {}: {e}", path.display())))?;
        Ok(iptc_from_json(value))
    }

    fn probe_video(&mut self, path: &Path) -> Result<VideoProbe, DecodeError> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "quiet", "-print_format", "json", "-show_streams", "-show_format"])
            .arg(path)
            .output()
            .map_err(|e| DecodeError::Tool(format!("{}: {e}", self.ffprobe.display())))?;
        if !output.status.success() {
            return Err(DecodeError::Tool(format!(
                "ffprobe exited with {} for {}",
                output.status,
                path.display()
            )));
        }
        parse_probe(&output.stdout)
    }
}

fn parse_probe(stdout: &[u8]) -> Result<VideoProbe, DecodeError> {
    serde_json::from_slice(stdout).map_err(|e| DecodeError::Unreadable(format!("ffprobe output: {e}")))
}

/// exiftool answers with one object per file, sometimes wrapped in an array.
fn iptc_from_json(value: Value) -> IptcMap {
    let object = match value {
        Value::Array(items) => items.into_iter().next(),
        other => Some(other),
    };
    let Some(Value::Object(map)) = object else {
        return IptcMap::new();
    };

    map.into_iter()
        .filter(|(key, _)| key != "SourceFile")
        .filter_map(|(key, value)| {
            let values = match value {
                Value::Array(items) => items.into_iter().filter_map(scalar_text).collect(),
                other => scalar_text(other).into_iter().collect::<Vec<_>>(),
            };
            (!values.is_empty()).then_some((key, values))
        })
        .collect()
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
