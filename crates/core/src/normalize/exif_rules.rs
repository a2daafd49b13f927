use crate::error::SyncError;
use crate::metadata::PartialMetadata;
use crate::tags::{TagMap, TagValue};
use log::warn;
use std::path::Path;

pub type ExifRule = fn(&TagMap, &mut PartialMetadata) -> Result<(), SyncError>;

/// Rules run in order; each one reads only the tags it names, so a failure in
/// one never hides the others.
pub const EXIF_RULES: &[(&str, ExifRule)] = &[
    ("Orientation", orientation),
    ("Make", make),
    ("Model", model),
    ("FNumber", aperture),
    ("FocalLength", focal_length),
    ("ISOSpeedRatings", iso),
    ("ExposureTime", exposure_time),
    ("ShutterSpeedValue", shutter_speed),
    ("Lens", lens),
    ("DateTimeOriginal", take_date_time),
    ("GPSLatitude", latitude),
    ("GPSLongitude", longitude),
    ("GPSAltitude", altitude),
    ("GPSImgDirection", img_direction),
];

// LensModel is listed twice on purpose: the first slot only takes a non-empty
// value, the last one is the final fallback after the vendor tags.
pub const LENS_CANDIDATES: &[&str] = &["LensModel", "0xA434", "LensType", "LensModel"];

const EXPOSURE_MAX_DENOMINATOR: u64 = 1_000_000;

pub fn apply_exif_rules(tags: &TagMap, path: &Path) -> (PartialMetadata, Vec<SyncError>) {
    let mut out = PartialMetadata::default();
    let mut issues = Vec::new();
    for (name, rule) in EXIF_RULES {
        if let Err(err) = rule(tags, &mut out) {
            warn!("{} not readable for {}: {}", name, path.display(), err);
            issues.push(err);
        }
    }
    (out, issues)
}

fn failure(tag: &str, reason: impl Into<String>) -> SyncError {
    SyncError::TagDecode {
        tag: tag.to_string(),
        reason: reason.into(),
    }
}

fn text_of(value: &TagValue) -> Option<String> {
    let raw = match value {
        TagValue::Text(s) => s.clone(),
        TagValue::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        _ => return None,
    };
    Some(raw.trim_matches(|c: char| c == '\0' || c.is_whitespace()).to_string())
}

fn single_number(tag: &str, value: &TagValue) -> Result<f64, SyncError> {
    match value {
        TagValue::Rationals(v) => v
            .first()
            .ok_or_else(|| failure(tag, "empty rational"))?
            .to_f64()
            .ok_or_else(|| failure(tag, "zero denominator")),
        TagValue::Floats(v) => v.first().copied().ok_or_else(|| failure(tag, "empty value")),
        TagValue::Integers(v) => v
            .first()
            .map(|n| *n as f64)
            .ok_or_else(|| failure(tag, "empty value")),
        TagValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| failure(tag, e.to_string())),
        TagValue::Bytes(_) => Err(failure(tag, "unexpected byte value")),
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn orientation(tags: &TagMap, out: &mut PartialMetadata) -> Result<(), SyncError> {
    let Some(value) = tags.get("Orientation") else {
        return Ok(());
    };
    let n = value
        .first_integer()
        .ok_or_else(|| failure("Orientation", "not an integer"))?;
    out.orientation = Some(n);
    Ok(())
}

fn make(tags: &TagMap, out: &mut PartialMetadata) -> Result<(), SyncError> {
    if let Some(value) = tags.get("Make") {
        out.make = Some(text_of(value).ok_or_else(|| failure("Make", "not text"))?);
    }
    Ok(())
}

fn model(tags: &TagMap, out: &mut PartialMetadata) -> Result<(), SyncError> {
    if let Some(value) = tags.get("Model") {
        out.model = Some(text_of(value).ok_or_else(|| failure("Model", "not text"))?);
    }
    Ok(())
}

fn aperture(tags: &TagMap, out: &mut PartialMetadata) -> Result<(), SyncError> {
    let Some(value) = tags.get("FNumber") else {
        return Ok(());
    };
    let formatted = match value {
        TagValue::Integers(v) if v.len() == 1 => v[0].to_string(),
        TagValue::Text(s) => s.trim().to_string(),
        other => format!("{:.1}", single_number("FNumber", other)?),
    };
    if !formatted.is_empty() {
        out.aperture = Some(format!("f/{}", formatted));
    }
    Ok(())
}

fn focal_length(tags: &TagMap, out: &mut PartialMetadata) -> Result<(), SyncError> {
    let Some(value) = tags.get("FocalLength") else {
        return Ok(());
    };
    let formatted = match value {
        TagValue::Integers(v) => v
            .first()
            .map(ToString::to_string)
            .ok_or_else(|| failure("FocalLength", "empty value"))?,
        other => format!("{:.1}", single_number("FocalLength", other)?),
    };
    out.focal = Some(format!("{} mm", formatted));
    Ok(())
}

fn iso(tags: &TagMap, out: &mut PartialMetadata) -> Result<(), SyncError> {
    let Some(value) = tags.get("ISOSpeedRatings") else {
        return Ok(());
    };
    let formatted = match value {
        TagValue::Integers(v) => v
            .first()
            .map(ToString::to_string)
            .ok_or_else(|| failure("ISOSpeedRatings", "empty sequence"))?,
        TagValue::Text(s) => s.trim().to_string(),
        other => {
            let n = single_number("ISOSpeedRatings", other)?;
            format!("{}", n.round() as i64)
        }
    };
    out.iso = Some(formatted);
    Ok(())
}

fn exposure_time(tags: &TagMap, out: &mut PartialMetadata) -> Result<(), SyncError> {
    let Some(value) = tags.get("ExposureTime") else {
        return Ok(());
    };
    let formatted = match value {
        TagValue::Rationals(v) => {
            let r = v
                .first()
                .ok_or_else(|| failure("ExposureTime", "empty rational"))?;
            format!("{}/{}", r.num, r.denom)
        }
        TagValue::Integers(v) if v.len() == 1 => v[0].to_string(),
        other => {
            let seconds = single_number("ExposureTime", other)?;
            if seconds < 1.0 {
                let (num, den) = limit_denominator(seconds, EXPOSURE_MAX_DENOMINATOR);
                format!("{}/{}", num, den)
            } else {
                format!("{:?}", seconds)
            }
        }
    };
    out.exposure = Some(format!("{} s", formatted));
    Ok(())
}

fn shutter_speed(tags: &TagMap, out: &mut PartialMetadata) -> Result<(), SyncError> {
    let Some(value) = tags.get("ShutterSpeedValue") else {
        return Ok(());
    };
    let apex = single_number("ShutterSpeedValue", value)?;
    let seconds = 2f64.powf(-apex);
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(failure("ShutterSpeedValue", "out of range"));
    }
    out.shutter_speed = Some(if seconds < 1.0 {
        format!("1/{} s", (1.0 / seconds).round() as i64)
    } else {
        format!("{:.1} s", seconds)
    });
    Ok(())
}

fn lens(tags: &TagMap, out: &mut PartialMetadata) -> Result<(), SyncError> {
    out.lens = LENS_CANDIDATES
        .iter()
        .filter_map(|key| tags.get(*key))
        .filter_map(text_of)
        .find(|v| !v.is_empty());
    Ok(())
}

fn take_date_time(tags: &TagMap, out: &mut PartialMetadata) -> Result<(), SyncError> {
    let (key, value) = match tags.get("DateTimeOriginal") {
        Some(v) => ("DateTimeOriginal", v),
        None => match tags.get("DateTime") {
            Some(v) => ("DateTime", v),
            None => return Ok(()),
        },
    };
    let raw = text_of(value).ok_or_else(|| failure(key, "not text"))?;
    let mut parts = raw.split_whitespace();
    let date = parts
        .next()
        .ok_or_else(|| failure(key, format!("invalid takedate: {raw}")))?;
    out.take_date = Some(date.replace(':', "-"));
    out.take_time = parts.next().map(str::to_string);
    Ok(())
}

fn dms_to_decimal(tag: &str, value: &TagValue) -> Result<f64, SyncError> {
    let parts: Vec<f64> = match value {
        TagValue::Rationals(v) => v
            .iter()
            .map(|r| r.to_f64().ok_or_else(|| failure(tag, "zero denominator")))
            .collect::<Result<_, _>>()?,
        TagValue::Floats(v) => v.clone(),
        _ => return Err(failure(tag, "not a coordinate triple")),
    };
    if parts.len() < 3 {
        return Err(failure(tag, format!("expected 3 components, got {}", parts.len())));
    }
    Ok(round_to(parts[0] + parts[1] / 60.0 + parts[2] / 3600.0, 8))
}

fn reference_is(tags: &TagMap, key: &str, negative: &str) -> bool {
    tags.get(key)
        .and_then(text_of)
        .map(|r| r.eq_ignore_ascii_case(negative))
        .unwrap_or(false)
}

fn latitude(tags: &TagMap, out: &mut PartialMetadata) -> Result<(), SyncError> {
    let Some(value) = tags.get("GPSLatitude") else {
        return Ok(());
    };
    let mut lat = dms_to_decimal("GPSLatitude", value)?;
    if reference_is(tags, "GPSLatitudeRef", "S") {
        lat = -lat;
    }
    out.geo.latitude = Some(lat);
    Ok(())
}

fn longitude(tags: &TagMap, out: &mut PartialMetadata) -> Result<(), SyncError> {
    let Some(value) = tags.get("GPSLongitude") else {
        return Ok(());
    };
    let mut lon = dms_to_decimal("GPSLongitude", value)?;
    if reference_is(tags, "GPSLongitudeRef", "W") {
        lon = -lon;
    }
    out.geo.longitude = Some(lon);
    Ok(())
}

fn altitude(tags: &TagMap, out: &mut PartialMetadata) -> Result<(), SyncError> {
    let Some(value) = tags.get("GPSAltitude") else {
        return Ok(());
    };
    let mut alt = round_to(single_number("GPSAltitude", value)?, 4);
    let below_sea_level = tags
        .get("GPSAltitudeRef")
        .and_then(TagValue::first_integer)
        == Some(1);
    if below_sea_level {
        alt = -alt;
    }
    out.geo.altitude = Some(alt);
    Ok(())
}

fn img_direction(tags: &TagMap, out: &mut PartialMetadata) -> Result<(), SyncError> {
    if let Some(value) = tags.get("GPSImgDirection") {
        out.geo.direction = Some(round_to(single_number("GPSImgDirection", value)?, 4));
    }
    Ok(())
}

/// Closest fraction to `value` whose denominator does not exceed `max_den`,
/// from the continued-fraction convergents.
pub fn limit_denominator(value: f64, max_den: u64) -> (i64, u64) {
    let (mut p0, mut q0, mut p1, mut q1) = (0i64, 1u64, 1i64, 0u64);
    let mut x = value;
    for _ in 0..64 {
        let a = x.floor();
        let q2 = q0 + (a as u64) * q1;
        if q2 > max_den {
            break;
        }
        let p2 = p0 + (a as i64) * p1;
        (p0, q0, p1, q1) = (p1, q1, p2, q2);
        let frac = x - a;
        if frac < 1e-9 {
            break;
        }
        x = 1.0 / frac;
    }
    if q1 == 0 {
        return (value.round() as i64, 1);
    }
    (p1, q1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::Rational;

    fn map(entries: &[(&str, TagValue)]) -> TagMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn run(entries: &[(&str, TagValue)]) -> (PartialMetadata, Vec<SyncError>) {
        apply_exif_rules(&map(entries), Path::new("/photos/test.jpg"))
    }

    fn rationals(values: &[(i64, i64)]) -> TagValue {
        TagValue::Rationals(values.iter().map(|(n, d)| Rational::new(*n, *d)).collect())
    }

    #[test]
    fn fnumber_becomes_aperture_with_one_decimal() {
        let (meta, issues) = run(&[("FNumber", rationals(&[(28, 10)]))]);
        assert!(issues.is_empty());
        assert_eq!(meta.aperture.as_deref(), Some("f/2.8"));
    }

    #[test]
    fn exposure_rational_keeps_both_components() {
        let (meta, _) = run(&[("ExposureTime", rationals(&[(1, 500)]))]);
        assert_eq!(meta.exposure.as_deref(), Some("1/500 s"));

        let (meta, _) = run(&[("ExposureTime", rationals(&[(10, 5000)]))]);
        assert_eq!(meta.exposure.as_deref(), Some("10/5000 s"));
    }

    #[test]
    fn exposure_single_value_below_one_is_reduced() {
        let (meta, _) = run(&[("ExposureTime", TagValue::Floats(vec![0.002]))]);
        assert_eq!(meta.exposure.as_deref(), Some("1/500 s"));

        let (meta, _) = run(&[("ExposureTime", TagValue::Floats(vec![2.0]))]);
        assert_eq!(meta.exposure.as_deref(), Some("2.0 s"));

        let (meta, _) = run(&[("ExposureTime", TagValue::Integers(vec![4]))]);
        assert_eq!(meta.exposure.as_deref(), Some("4 s"));
    }

    #[test]
    fn focal_length_uses_numerator_without_denominator() {
        let (meta, _) = run(&[("FocalLength", rationals(&[(350, 10)]))]);
        assert_eq!(meta.focal.as_deref(), Some("35.0 mm"));

        let (meta, _) = run(&[("FocalLength", TagValue::Integers(vec![50]))]);
        assert_eq!(meta.focal.as_deref(), Some("50 mm"));
    }

    #[test]
    fn iso_unwraps_single_element_sequence() {
        let (meta, _) = run(&[("ISOSpeedRatings", TagValue::Integers(vec![200]))]);
        assert_eq!(meta.iso.as_deref(), Some("200"));
    }

    #[test]
    fn make_model_and_orientation_are_copied() {
        let (meta, _) = run(&[
            ("Make", TagValue::Text("Canon".to_string())),
            ("Model", TagValue::Text("EOS 5D\0".to_string())),
            ("Orientation", TagValue::Integers(vec![6])),
        ]);
        assert_eq!(meta.make.as_deref(), Some("Canon"));
        assert_eq!(meta.model.as_deref(), Some("EOS 5D"));
        assert_eq!(meta.orientation, Some(6));
    }

    #[test]
    fn lens_follows_candidate_precedence() {
        let (meta, _) = run(&[
            ("LensModel", TagValue::Text(String::new())),
            ("0xA434", TagValue::Text("Vendor 24-70".to_string())),
            ("LensType", TagValue::Text("Type lens".to_string())),
        ]);
        assert_eq!(meta.lens.as_deref(), Some("Vendor 24-70"));

        let (meta, _) = run(&[("LensType", TagValue::Text("Type lens".to_string()))]);
        assert_eq!(meta.lens.as_deref(), Some("Type lens"));

        let (meta, _) = run(&[]);
        assert_eq!(meta.lens, None);
    }

    #[test]
    fn date_time_original_wins_over_date_time() {
        let (meta, _) = run(&[
            ("DateTimeOriginal", TagValue::Text("2020:07:14 10:22:01".to_string())),
            ("DateTime", TagValue::Text("2021:01:01 00:00:00".to_string())),
        ]);
        assert_eq!(meta.take_date.as_deref(), Some("2020-07-14"));
        assert_eq!(meta.take_time.as_deref(), Some("10:22:01"));

        let (meta, _) = run(&[("DateTime", TagValue::Text("2021:01:01 08:00:00".to_string()))]);
        assert_eq!(meta.take_date.as_deref(), Some("2021-01-01"));
        assert_eq!(meta.take_time.as_deref(), Some("08:00:00"));
    }

    #[test]
    fn gps_triple_respects_hemisphere() {
        let triple = rationals(&[(40, 1), (0, 1), (0, 1)]);
        let (meta, _) = run(&[
            ("GPSLatitude", triple.clone()),
            ("GPSLatitudeRef", TagValue::Text("N".to_string())),
        ]);
        assert_eq!(meta.geo.latitude, Some(40.0));

        let (meta, _) = run(&[
            ("GPSLatitude", triple.clone()),
            ("GPSLatitudeRef", TagValue::Text("S".to_string())),
            ("GPSLongitude", rationals(&[(73, 1), (58, 1), (30, 1)])),
            ("GPSLongitudeRef", TagValue::Text("W".to_string())),
        ]);
        assert_eq!(meta.geo.latitude, Some(-40.0));
        assert_eq!(meta.geo.longitude, Some(-73.975));
    }

    #[test]
    fn gps_altitude_and_direction_are_rounded() {
        let (meta, _) = run(&[
            ("GPSAltitude", rationals(&[(123456789, 1000000)])),
            ("GPSAltitudeRef", TagValue::Bytes(vec![1])),
            ("GPSImgDirection", rationals(&[(1800001, 10000)])),
        ]);
        assert_eq!(meta.geo.altitude, Some(-123.4568));
        assert_eq!(meta.geo.direction, Some(180.0001));
    }

    #[test]
    fn broken_tag_is_isolated() {
        let (meta, issues) = run(&[
            ("FNumber", rationals(&[(28, 0)])),
            ("GPSLatitude", rationals(&[(40, 1)])),
            ("Make", TagValue::Text("Nikon".to_string())),
        ]);
        assert_eq!(issues.len(), 2);
        assert!(issues
            .iter()
            .all(|e| matches!(e, SyncError::TagDecode { .. })));
        assert_eq!(meta.aperture, None);
        assert_eq!(meta.geo.latitude, None);
        assert_eq!(meta.make.as_deref(), Some("Nikon"));
    }

    #[test]
    fn shutter_speed_from_apex_value() {
        let (meta, _) = run(&[("ShutterSpeedValue", rationals(&[(8965784, 1000000)]))]);
        assert_eq!(meta.shutter_speed.as_deref(), Some("1/500 s"));
    }

    #[test]
    fn limit_denominator_finds_simple_fractions() {
        assert_eq!(limit_denominator(0.002, 1_000_000), (1, 500));
        assert_eq!(limit_denominator(1.0 / 3.0, 1_000_000), (1, 3));
        assert_eq!(limit_denominator(0.125, 1_000_000), (1, 8));
    }
}
