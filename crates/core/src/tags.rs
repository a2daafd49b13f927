use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub num: i64,
    pub denom: i64,
}

impl Rational {
    pub fn new(num: i64, denom: i64) -> Self {
        Self { num, denom }
    }

    pub fn to_f64(self) -> Option<f64> {
        if self.denom == 0 {
            None
        } else {
            Some(self.num as f64 / self.denom as f64)
        }
    }
}

/// Decoded tag payload, as handed over by the decoding collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Text(String),
    Integers(Vec<i64>),
    Rationals(Vec<Rational>),
    Floats(Vec<f64>),
    Bytes(Vec<u8>),
}

impl TagValue {
    pub fn first_integer(&self) -> Option<i64> {
        match self {
            TagValue::Integers(v) => v.first().copied(),
            TagValue::Bytes(v) => v.first().map(|b| i64::from(*b)),
            TagValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

pub type TagMap = BTreeMap<String, TagValue>;

pub type IptcMap = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Default)]
pub struct ImageTags {
    pub dimensions: Option<(u32, u32)>,
    pub tags: TagMap,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoProbe {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    #[serde(default)]
    pub format: ProbeFormat,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeStream {
    #[serde(default)]
    pub codec_type: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub side_data_list: Vec<SideData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SideData {
    #[serde(default)]
    pub rotation: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeFormat {
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl VideoProbe {
    pub fn first_video_stream(&self) -> Option<&ProbeStream> {
        self.streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("could not open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no readable tags: {0}")]
    Unreadable(String),
    #[error("decoder tool failed: {0}")]
    Tool(String),
}

/// Seam to the byte-level decoding libraries. Only the resulting maps cross it.
pub trait TagDecoder {
    fn decode_image_tags(&mut self, path: &Path) -> Result<ImageTags, DecodeError>;
    fn decode_iptc(&mut self, path: &Path) -> Result<IptcMap, DecodeError>;
    fn probe_video(&mut self, path: &Path) -> Result<VideoProbe, DecodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_denominator_has_no_value() {
        assert_eq!(Rational::new(1, 0).to_f64(), None);
        assert_eq!(Rational::new(28, 10).to_f64(), Some(2.8));
    }

    #[test]
    fn probe_json_picks_first_video_stream() {
        let json = r#"{
            "streams": [
                {"codec_type": "audio"},
                {"codec_type": "video", "width": 1920, "height": 1080,
                 "tags": {"rotate": "90"},
                 "side_data_list": [{"rotation": -90}]}
            ],
            "format": {"tags": {"location": "+48.8577+002.2950/"}}
        }"#;
        let probe: VideoProbe = serde_json::from_str(json).expect("parse probe");
        let stream = probe.first_video_stream().expect("video stream");
        assert_eq!(stream.width, Some(1920));
        assert_eq!(stream.tags.get("rotate").map(String::as_str), Some("90"));
        assert_eq!(stream.side_data_list[0].rotation, Some(-90.0));
        assert!(probe.format.tags.contains_key("location"));
    }

    #[test]
    fn first_integer_reads_bytes_and_text() {
        assert_eq!(TagValue::Bytes(vec![1]).first_integer(), Some(1));
        assert_eq!(TagValue::Text(" 200 ".to_string()).first_integer(), Some(200));
        assert_eq!(TagValue::Rationals(vec![]).first_integer(), None);
    }
}
