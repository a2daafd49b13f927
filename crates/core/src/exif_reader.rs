use crate::tags::{ImageTags, Rational, TagMap, TagValue};
use anyhow::{bail, Context, Result};
use exif::{Field, In, Reader, Tag, Value};
use log::debug;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub fn read_image_tags(path: &Path) -> Result<ImageTags> {
    let file = File::open(path)
        .with_context(|| format!("failed to open image: {}", path.display()))?;
    let mut buf = BufReader::new(file);

    let tags = match Reader::new().read_from_container(&mut buf) {
        Ok(exif) => exif
            .fields()
            .filter(|field| field.ifd_num == In::PRIMARY)
            .map(|field| (tag_key(field.tag), tag_value(field)))
            .collect::<TagMap>(),
        Err(err) => {
            debug!("no EXIF in {}: {}", path.display(), err);
            TagMap::new()
        }
    };

    let dimensions = image::image_dimensions(path)
        .ok()
        .or_else(|| exif_dimensions(&tags));

    if tags.is_empty() && dimensions.is_none() {
        bail!("neither EXIF nor an image header could be read: {}", path.display());
    }
    Ok(ImageTags { dimensions, tags })
}

fn tag_key(tag: Tag) -> String {
    if tag == Tag::PhotographicSensitivity {
        return "ISOSpeedRatings".to_string();
    }
    if tag.description().is_some() {
        tag.to_string()
    } else {
        format!("0x{:04X}", tag.number())
    }
}

fn tag_value(field: &Field) -> TagValue {
    match &field.value {
        Value::Ascii(parts) => TagValue::Text(
            parts
                .iter()
                .map(|p| String::from_utf8_lossy(p).trim_end_matches('\0').to_string())
                .collect::<Vec<_>>()
                .join(" "),
        ),
        Value::Byte(v) => TagValue::Bytes(v.clone()),
        Value::Undefined(v, _) => TagValue::Bytes(v.clone()),
        Value::Short(v) => TagValue::Integers(v.iter().map(|n| i64::from(*n)).collect()),
        Value::Long(v) => TagValue::Integers(v.iter().map(|n| i64::from(*n)).collect()),
        Value::SByte(v) => TagValue::Integers(v.iter().map(|n| i64::from(*n)).collect()),
        Value::SShort(v) => TagValue::Integers(v.iter().map(|n| i64::from(*n)).collect()),
        Value::SLong(v) => TagValue::Integers(v.iter().map(|n| i64::from(*n)).collect()),
        Value::Rational(v) => TagValue::Rationals(
            v.iter()
                .map(|r| Rational::new(i64::from(r.num), i64::from(r.denom)))
                .collect(),
        ),
        Value::SRational(v) => TagValue::Rationals(
            v.iter()
                .map(|r| Rational::new(i64::from(r.num), i64::from(r.denom)))
                .collect(),
        ),
        Value::Float(v) => TagValue::Floats(v.iter().map(|n| f64::from(*n)).collect()),
        Value::Double(v) => TagValue::Floats(v.clone()),
        Value::Unknown(..) => TagValue::Bytes(Vec::new()),
    }
}

fn exif_dimensions(tags: &TagMap) -> Option<(u32, u32)> {
    let width = tags.get("PixelXDimension")?.first_integer()?;
    let height = tags.get("PixelYDimension")?.first_integer()?;
    Some((u32::try_from(width).ok()?, u32::try_from(height).ok()?))
}
