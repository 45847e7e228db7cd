//! Forward geocoding: free-text place name to coordinates.
//! Uses the OpenWeather direct geocoding endpoint with `limit=1`.

use serde::Deserialize;

use crate::error::ForecastError;
use crate::types::Location;

pub(crate) const GEOCODE_PATH: &str = "/geo/1.0/direct";

#[derive(Debug, Deserialize)]
struct GeocodeEntry {
    name: String,
    lat: f64,
    lon: f64,
    #[allow(dead_code)]
    #[serde(default)]
    country: Option<String>,
}

/// Decode a geocoding response and keep the best-ranked match.
///
/// # Errors
/// [`ForecastError::NotFound`] on an empty array, [`ForecastError::Decode`] on
/// a malformed body.
pub fn decode_geocode(query: &str, body: &[u8]) -> Result<Location, ForecastError> {
    let entries: Vec<GeocodeEntry> = serde_json::from_slice(body)?;
    let best = entries
        .into_iter()
        .next()
        .ok_or_else(|| ForecastError::NotFound(query.to_string()))?;

    tracing::info!("Geocoded {:?} to: {} ({}, {})", query, best.name, best.lat, best.lon);
    Ok(Location::new(best.name, best.lat, best.lon))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_first_match() {
        let body = br#"[
            {"name": "Beijing", "lat": 39.9057, "lon": 116.3913, "country": "CN"},
            {"name": "Beijing Shi", "lat": 40.0, "lon": 116.0}
        ]"#;
        let loc = decode_geocode("beijing", body).unwrap();
        assert_eq!(loc.name, "Beijing");
        assert_eq!(loc.latitude, 39.9057);
        assert_eq!(loc.longitude, 116.3913);
    }

    #[test]
    fn test_empty_result_is_not_found() {
        let err = decode_geocode("Atlantis", b"[]").unwrap_err();
        assert!(matches!(err, ForecastError::NotFound(q) if q == "Atlantis"));
    }

    #[test]
    fn test_malformed_body_is_decode_error() {
        let err = decode_geocode("Rio", br#"{"cod": 401}"#).unwrap_err();
        assert!(matches!(err, ForecastError::Decode(_)));
    }
}
