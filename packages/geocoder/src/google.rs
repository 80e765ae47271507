//! Google Geocoding web service client.
//!
//! See <https://developers.google.com/maps/documentation/geocoding/requests-geocoding>

use async_trait::async_trait;
use wildfire_map_incident_models::Coordinate;

use crate::{GeocodeError, GeocodeProvider};

/// Geocoder backed by the Google Geocoding JSON endpoint.
pub struct GoogleGeocoder {
    client: reqwest::Client,
    base_url: String,
    region: String,
    language: String,
    api_key: Option<String>,
}

impl GoogleGeocoder {
    /// Creates a client. Without `api_key` every lookup fails with
    /// [`GeocodeError::Unconfigured`].
    #[must_use]
    pub const fn new(
        client: reqwest::Client,
        base_url: String,
        region: String,
        language: String,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url,
            region,
            language,
            api_key,
        }
    }
}

#[async_trait]
impl GeocodeProvider for GoogleGeocoder {
    fn id(&self) -> &'static str {
        "google"
    }

    async fn lookup(&self, address: &str) -> Result<Option<Coordinate>, GeocodeError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(GeocodeError::Unconfigured);
        };

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("address", address),
                ("region", self.region.as_str()),
                ("language", self.language.as_str()),
                ("key", key),
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

/// Parses a Google Geocoding JSON response.
///
/// The `status` field drives the outcome: `OK` yields the first result's
/// location, `ZERO_RESULTS` is a definitive miss, quota statuses map to
/// [`GeocodeError::RateLimitExceeded`], and anything else is a provider
/// error.
fn parse_response(body: &serde_json::Value) -> Result<Option<Coordinate>, GeocodeError> {
    let status = body["status"].as_str().ok_or_else(|| GeocodeError::Parse {
        message: "Google response has no status".to_string(),
    })?;

    match status {
        "OK" => {}
        "ZERO_RESULTS" => return Ok(None),
        "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => return Err(GeocodeError::RateLimitExceeded),
        other => {
            if let Some(message) = body["error_message"].as_str() {
                log::debug!("Google geocoder {other}: {message}");
            }
            return Err(GeocodeError::Provider {
                status: other.to_string(),
            });
        }
    }

    let Some(first) = body["results"].as_array().and_then(|r| r.first()) else {
        return Ok(None);
    };

    let location = &first["geometry"]["location"];
    let lat = location["lat"].as_f64().ok_or_else(|| GeocodeError::Parse {
        message: "Missing lat in Google response".to_string(),
    })?;
    let lng = location["lng"].as_f64().ok_or_else(|| GeocodeError::Parse {
        message: "Missing lng in Google response".to_string(),
    })?;

    Coordinate::new(lat, lng)
        .map(Some)
        .ok_or_else(|| GeocodeError::Parse {
            message: format!("Google returned out-of-range coordinate ({lat}, {lng})"),
        })
}
