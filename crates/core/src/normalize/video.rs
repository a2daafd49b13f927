use crate::error::SyncError;
use crate::metadata::{GeoCoordinates, PartialMetadata};
use crate::tags::{ProbeStream, VideoProbe};
use std::collections::BTreeMap;

const CREATION_KEYS: &[&str] = &["creation_time", "com.apple.quicktime.creationdate"];
const MAKE_KEYS: &[&str] = &["com.apple.quicktime.make", "make"];
const MODEL_KEYS: &[&str] = &["com.apple.quicktime.model", "model"];
const LOCATION_KEYS: &[&str] = &[
    "com.apple.quicktime.location.ISO6709",
    "location",
    "location-eng",
];

pub fn apply_video_probe(probe: &VideoProbe, file_name: &str) -> Result<PartialMetadata, SyncError> {
    let stream = probe
        .first_video_stream()
        .ok_or_else(|| SyncError::TagDecode {
            tag: "streams".to_string(),
            reason: "no video stream".to_string(),
        })?;

    let mut out = PartialMetadata {
        title: Some(file_name.to_string()),
        ..PartialMetadata::default()
    };

    if let (Some(width), Some(height)) = (stream.width, stream.height) {
        out.dimensions = Some(if is_rotated_sideways(stream) {
            (height, width)
        } else {
            (width, height)
        });
    }

    let tags = [&stream.tags, &probe.format.tags];

    if let Some(created) = lookup(&tags, CREATION_KEYS) {
        let mut split = created.splitn(2, 'T');
        out.take_date = split.next().map(str::to_string);
        out.take_time = split.next().map(str::to_string);
    }
    out.make = lookup(&tags, MAKE_KEYS).map(str::to_string);
    out.model = lookup(&tags, MODEL_KEYS).map(str::to_string);
    if let Some(geo) = lookup(&tags, LOCATION_KEYS).and_then(parse_iso6709) {
        out.geo = geo;
    }

    Ok(out)
}

fn lookup<'a>(maps: &[&'a BTreeMap<String, String>], keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| {
        maps.iter()
            .find_map(|m| m.get(*key))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    })
}

fn is_rotated_sideways(stream: &ProbeStream) -> bool {
    if let Some(rotate) = stream.tags.get("rotate") {
        return rotate == "90" || rotate == "270";
    }
    stream
        .side_data_list
        .iter()
        .filter_map(|d| d.rotation)
        .any(|r| matches!(r.abs().round() as i64, 90 | 270))
}

/// Parses ISO 6709 point strings such as `+48.8577+002.2950+035.000/`.
/// Degree, degree-minute and degree-minute-second forms are accepted.
pub fn parse_iso6709(input: &str) -> Option<GeoCoordinates> {
    let body = input.trim();
    let body = body.split("CRS").next().unwrap_or(body).trim_end_matches('/');

    let mut parts = Vec::new();
    let mut start: Option<usize> = None;
    for (i, ch) in body.char_indices() {
        if ch == '+' || ch == '-' {
            if let Some(s) = start {
                parts.push(&body[s..i]);
            }
            start = Some(i);
        } else if start.is_none() {
            return None;
        }
    }
    if let Some(s) = start {
        parts.push(&body[s..]);
    }
    if parts.len() < 2 {
        return None;
    }

    Some(GeoCoordinates {
        latitude: Some(parse_angle(parts[0], 2)?),
        longitude: Some(parse_angle(parts[1], 3)?),
        altitude: parts.get(2).and_then(|p| p.parse::<f64>().ok()),
        direction: None,
    })
}

fn parse_angle(part: &str, degree_digits: usize) -> Option<f64> {
    let (sign, digits) = match part.as_bytes().first()? {
        b'-' => (-1.0, &part[1..]),
        b'+' => (1.0, &part[1..]),
        _ => (1.0, part),
    };
    if !digits.is_ascii() {
        return None;
    }
    let int_len = digits.find('.').unwrap_or(digits.len());
    let value = match int_len.checked_sub(degree_digits)? {
        0 => digits.parse::<f64>().ok()?,
        2 => {
            let deg = digits[..degree_digits].parse::<f64>().ok()?;
            let min = digits[degree_digits..].parse::<f64>().ok()?;
            deg + min / 60.0
        }
        4 => {
            let deg = digits[..degree_digits].parse::<f64>().ok()?;
            let min = digits[degree_digits..degree_digits + 2].parse::<f64>().ok()?;
            let sec = digits[degree_digits + 2..].parse::<f64>().ok()?;
            deg + min / 60.0 + sec / 3600.0
        }
        _ => return None,
    };
    let factor = 1e8;
    Some(sign * (value * factor).round() / factor)
}
