mod countries;
mod nominatim;

pub use countries::country_name;
pub use nominatim::NominatimGeocoder;

use crate::metadata::PhotoMetadata;
use log::{debug, warn};
use std::collections::BTreeMap;
use thiserror::Error;

pub type AddressComponents = BTreeMap<String, String>;

/// Administrative levels turned into tags, in the order they are appended.
pub const PLACE_KEYS: &[&str] = &[
    "island",
    "archipelago",
    "region",
    "state",
    "state_district",
    "county",
    "municipality",
    "city",
    "town",
    "village",
    "suburb",
    "road",
];

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Request(String),
    #[error("unexpected geocoding response: {0}")]
    Response(String),
}

pub trait Geocoder {
    fn reverse_geocode(&mut self, lat: f64, lon: f64) -> Result<AddressComponents, GeocodeError>;
}

/// Appends place names for photos that carry a position. Best effort only.
pub fn annotate(geocoder: &mut dyn Geocoder, metadata: &mut PhotoMetadata) -> usize {
    let Some((lat, lon)) = metadata.geo.position() else {
        return 0;
    };

    let address = match geocoder.reverse_geocode(lat, lon) {
        Ok(address) => address,
        Err(err) => {
            warn!(
                "no place tags for {} ({}, {}): {}",
                metadata.source_path.display(),
                lat,
                lon,
                err
            );
            return 0;
        }
    };

    let before = metadata.tags.len();
    for key in PLACE_KEYS {
        if let Some(place) = address.get(*key) {
            metadata.tags.push_unique(place);
        }
    }
    // Always added, but a country already present as a place tag is not repeated.
    if let Some(code) = address.get("country_code") {
        metadata.tags.push_unique(&country_name(code));
    }

    let added = metadata.tags.len() - before;
    debug!(
        "{} place tag(s) added to {}",
        added,
        metadata.source_path.display()
    );
    added
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{AddressComponents, GeocodeError, Geocoder};

    #[derive(Default)]
    pub struct ScriptedGeocoder {
        pub address: Option<AddressComponents>,
        pub calls: usize,
    }

    impl Geocoder for ScriptedGeocoder {
        fn reverse_geocode(&mut self, _: f64, _: f64) -> Result<AddressComponents, GeocodeError> {
            self.calls += 1;
            self.address
                .clone()
                .ok_or_else(|| GeocodeError::Request("offline".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedGeocoder;
    use super::*;
    use crate::metadata::{
        Checksum, DescriptiveTags, GeoCoordinates, MediaKind, TimestampSource,
    };
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn photo(geo: GeoCoordinates, tags: &[&str]) -> PhotoMetadata {
        PhotoMetadata {
            original_name: "a.jpg".to_string(),
            source_path: PathBuf::from("/p/a.jpg"),
            checksum: Checksum::of_bytes(b"a"),
            kind: MediaKind::Photo,
            mime_type: "image/jpeg".to_string(),
            width: 1,
            height: 1,
            size_label: "0 KB".to_string(),
            orientation: 1,
            iso: String::new(),
            aperture: String::new(),
            shutter_speed: String::new(),
            exposure: String::new(),
            focal: String::new(),
            lens: String::new(),
            make: String::new(),
            model: String::new(),
            captured_at: NaiveDate::from_ymd_opt(2020, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .expect("date"),
            capture_source: TimestampSource::Tag,
            geo,
            tags: tags.iter().copied().collect::<DescriptiveTags>(),
            title: "a.jpg".to_string(),
            description: String::new(),
            star: false,
        }
    }

    fn located() -> GeoCoordinates {
        GeoCoordinates {
            latitude: Some(43.7),
            longitude: Some(7.26),
            ..GeoCoordinates::default()
        }
    }

    #[test]
    fn place_keys_are_appended_without_duplicates() {
        let mut geocoder = ScriptedGeocoder {
            address: Some(
                [
                    ("city", "Nice"),
                    ("state", "Provence-Alpes-Côte d'Azur"),
                    ("postcode", "06000"),
                    ("country_code", "fr"),
                ]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ),
            calls: 0,
        };
        let mut meta = photo(located(), &["Nice"]);

        let added = annotate(&mut geocoder, &mut meta);
        assert_eq!(added, 2);
        assert_eq!(meta.tags.joined(), "Nice, Provence-Alpes-Côte d'Azur, France");
    }

    #[test]
    fn country_is_added_once() {
        let mut geocoder = ScriptedGeocoder {
            address: Some(
                [("village", "Monaco"), ("country_code", "mc")]
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            calls: 0,
        };
        let mut meta = photo(located(), &["Monaco"]);
        assert_eq!(annotate(&mut geocoder, &mut meta), 0);
        assert_eq!(meta.tags.joined(), "Monaco");
    }

    #[test]
    fn no_position_means_no_lookup() {
        let mut geocoder = ScriptedGeocoder::default();
        let mut meta = photo(
            GeoCoordinates {
                latitude: Some(1.0),
                ..GeoCoordinates::default()
            },
            &[],
        );
        assert_eq!(annotate(&mut geocoder, &mut meta), 0);
        assert_eq!(geocoder.calls, 0);
    }

    #[test]
    fn geocoder_failure_is_ignored() {
        let mut geocoder = ScriptedGeocoder::default();
        let mut meta = photo(located(), &["kept"]);
        assert_eq!(annotate(&mut geocoder, &mut meta), 0);
        assert_eq!(geocoder.calls, 1);
        assert_eq!(meta.tags.joined(), "kept");
    }
}
