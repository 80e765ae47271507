//! Nominatim / OpenStreetMap geocoder client.
//!
//! Keyless alternative to Google. The public instance allows at most
//! **1 request per second**; the cache's rate limiter enforces the
//! `rate_limit_ms` from `services/nominatim.toml`.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use async_trait::async_trait;
use wildfire_map_incident_models::Coordinate;

use crate::{GeocodeError, GeocodeProvider};

/// Geocoder backed by a Nominatim free-form search endpoint.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
    country_code: String,
}

impl NominatimGeocoder {
    /// Creates a client restricted to `country_code`.
    #[must_use]
    pub const fn new(client: reqwest::Client, base_url: String, country_code: String) -> Self {
        Self {
            client,
            base_url,
            country_code,
        }
    }
}

#[async_trait]
impl GeocodeProvider for NominatimGeocoder {
    fn id(&self) -> &'static str {
        "nominatim"
    }

    async fn lookup(&self, address: &str) -> Result<Option<Coordinate>, GeocodeError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", address),
                ("countrycodes", self.country_code.as_str()),
                ("format", "jsonv2"),
                ("limit", "1"),
            ])
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimitExceeded);
        }

        let body: serde_json::Value = resp.json().await?;
        parse_response(&body)
    }
}

/// Parses a Nominatim JSON response.
fn parse_response(body: &serde_json::Value) -> Result<Option<Coordinate>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let lat = first["lat"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lat in Nominatim response".to_string(),
        })?;

    let lon = first["lon"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lon in Nominatim response".to_string(),
        })?;

    Coordinate::new(lat, lon)
        .map(Some)
        .ok_or_else(|| GeocodeError::Parse {
            message: format!("Nominatim returned out-of-range coordinate ({lat}, {lon})"),
        })
}
