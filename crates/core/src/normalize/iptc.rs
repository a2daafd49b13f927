use crate::error::SyncError;
use crate::metadata::PartialMetadata;
use crate::tags::IptcMap;
use log::warn;
use std::path::Path;

type IptcRule = fn(&IptcMap, &str, &mut PartialMetadata) -> Result<(), SyncError>;

const IPTC_RULES: &[(&str, IptcRule)] = &[
    ("Headline", title),
    ("Caption-Abstract", description),
    ("Keywords", keywords),
];

pub fn apply_iptc_rules(
    iptc: &IptcMap,
    file_name: &str,
    path: &Path,
) -> (PartialMetadata, Vec<SyncError>) {
    let mut out = PartialMetadata::default();
    let mut issues = Vec::new();
    for (name, rule) in IPTC_RULES {
        if let Err(err) = rule(iptc, file_name, &mut out) {
            warn!("IPTC {} not readable for {}: {}", name, path.display(), err);
            issues.push(err);
        }
    }
    (out, issues)
}

fn first_value<'a>(iptc: &'a IptcMap, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| iptc.get(*key))
        .filter_map(|values| values.first())
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

fn title(iptc: &IptcMap, file_name: &str, out: &mut PartialMetadata) -> Result<(), SyncError> {
    let value = first_value(iptc, &["Headline"])
        .or_else(|| first_value(iptc, &["ObjectName"]))
        .unwrap_or(file_name);
    out.title = Some(value.to_string());
    Ok(())
}

fn description(iptc: &IptcMap, _: &str, out: &mut PartialMetadata) -> Result<(), SyncError> {
    if let Some(value) = first_value(iptc, &["Caption-Abstract", "Caption/Abstract"]) {
        out.description = Some(value.to_string());
    }
    Ok(())
}

fn keywords(iptc: &IptcMap, _: &str, out: &mut PartialMetadata) -> Result<(), SyncError> {
    let Some(values) = iptc.get("Keywords") else {
        return Ok(());
    };
    for keyword in values {
        if keyword.contains('\u{FFFD}') {
            return Err(SyncError::TagDecode {
                tag: "Keywords".to_string(),
                reason: format!("keyword is not valid UTF-8: {keyword}"),
            });
        }
        out.tags.push_unique(keyword);
    }
    Ok(())
}
