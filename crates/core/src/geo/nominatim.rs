use super::{AddressComponents, GeocodeError, Geocoder};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    error: Option<String>,
}

pub struct NominatimGeocoder {
    client: Client,
    endpoint: String,
    language: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(
        endpoint: &str,
        user_agent: &str,
        timeout: Duration,
        language: Option<String>,
    ) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| GeocodeError::Request(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            language,
        })
    }

    fn reverse_url(&self) -> String {
        format!("{}/reverse", self.endpoint)
    }
}

impl Geocoder for NominatimGeocoder {
    fn reverse_geocode(&mut self, lat: f64, lon: f64) -> Result<AddressComponents, GeocodeError> {
        let mut query = vec![
            ("format", "jsonv2".to_string()),
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("addressdetails", "1".to_string()),
        ];
        if let Some(lang) = &self.language {
            query.push(("accept-language", lang.clone()));
        }

        let response = self
            .client
            .get(self.reverse_url())
            .query(&query)
            .send()
            .map_err(|e| GeocodeError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| GeocodeError::Request(e.to_string()))?;

        let body: ReverseResponse = response
            .json()
            .map_err(|e| GeocodeError::Response(e.to_string()))?;
        address_from_response(body)
    }
}

fn address_from_response(body: ReverseResponse) -> Result<AddressComponents, GeocodeError> {
    if let Some(error) = body.error {
        return Err(GeocodeError::Response(error));
    }
    let address = body
        .address
        .ok_or_else(|| GeocodeError::Response("missing address".to_string()))?;
    Ok(address
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::String(s) => Some((key, s)),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_strings_are_kept() {
        let body: ReverseResponse = serde_json::from_str(
            r#"{"display_name": "x", "address": {"city": "Lyon", "country_code": "fr", "ISO3166-2-lvl4": "FR-ARA", "n": 3}}"#,
        )
        .expect("parse");
        let address = address_from_response(body).expect("address");
        assert_eq!(address.get("city").map(String::as_str), Some("Lyon"));
        assert_eq!(address.get("country_code").map(String::as_str), Some("fr"));
        assert!(!address.contains_key("n"));
    }

    #[test]
    fn error_payload_is_reported() {
        let body: ReverseResponse =
            serde_json::from_str(r#"{"error": "Unable to geocode"}"#).expect("parse");
        assert!(matches!(
            address_from_response(body),
            Err(GeocodeError::Response(_))
        ));
    }

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let geocoder = NominatimGeocoder::new(
            "https://nominatim.example.org/",
            "lychee-sync-test",
            Duration::from_secs(1),
            None,
        )
        .expect("client");
        assert_eq!(geocoder.reverse_url(), "https://nominatim.example.org/reverse");
    }
}
