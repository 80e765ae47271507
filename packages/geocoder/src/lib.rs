#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geocoding for wildfire incident addresses.
//!
//! Converts free-text Korean addresses to WGS84 coordinates through an
//! external provider configured via TOML files in `services/`:
//!
//! 1. **Google Geocoding API** (priority 1): needs an API key, region
//!    biased to Korea, short 25 ms spacing between calls.
//! 2. **Nominatim / OpenStreetMap** (opt-in): no key, 1 req/sec.
//!
//! All lookups go through [`cache::GeocodeCache`], which remembers hits and
//! definitive misses, persists them to a [`KvStore`], coalesces concurrent
//! lookups of the same address, and spaces external calls with a rate
//! limiter.
//!
//! [`KvStore`]: wildfire_map_database::kv::KvStore

pub mod address;
pub mod cache;
pub mod google;
pub mod nominatim;
pub mod rate_limit;
pub mod service_registry;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use wildfire_map_incident_models::Coordinate;

use crate::service_registry::{GeocodingService, ProviderConfig};

/// Errors from geocoding operations.
///
/// `Clone` so that one in-flight lookup can hand the same outcome to every
/// caller waiting on that address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {message}")]
    Http {
        /// Error text from the HTTP client.
        message: String,
    },

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// The provider reported a non-success status other than quota
    /// exhaustion (e.g., `REQUEST_DENIED`).
    #[error("Provider returned {status}")]
    Provider {
        /// Status string from the provider.
        status: String,
    },

    /// The lookup exceeded its time budget.
    #[error("Lookup timed out after {timeout_ms}ms")]
    Timeout {
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// The provider needs a credential that was not supplied.
    #[error("Geocoding provider is not configured (missing API key)")]
    Unconfigured,

    /// The provider's quota is exhausted. Batches stop when they see this.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

impl From<reqwest::Error> for GeocodeError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http {
            message: e.to_string(),
        }
    }
}

impl GeocodeError {
    /// Whether this error should stop a batch.
    #[must_use]
    pub const fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimitExceeded)
    }
}

/// A geocoding backend.
///
/// `Ok(None)` is a definitive "no such place" answer and is cached;
/// `Err(_)` is never cached.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    /// Short identifier for logs (e.g., `"google"`).
    fn id(&self) -> &str;

    /// Looks up one already-normalized address.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] for transport failures, unexpected
    /// responses, missing credentials, or quota exhaustion.
    async fn lookup(&self, address: &str) -> Result<Option<Coordinate>, GeocodeError>;
}

/// Builds the provider described by `service`.
///
/// `api_key` is only used by providers that need one; a keyed provider
/// built without a key answers every lookup with
/// [`GeocodeError::Unconfigured`].
#[must_use]
pub fn build_provider(
    client: reqwest::Client,
    service: &GeocodingService,
    api_key: Option<String>,
) -> Arc<dyn GeocodeProvider> {
    match &service.provider {
        ProviderConfig::Google {
            base_url,
            region,
            language,
            ..
        } => Arc::new(google::GoogleGeocoder::new(
            client,
            base_url.clone(),
            region.clone(),
            language.clone(),
            api_key,
        )),
        ProviderConfig::Nominatim {
            base_url,
            country_code,
            ..
        } => Arc::new(nominatim::NominatimGeocoder::new(
            client,
            base_url.clone(),
            country_code.clone(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service_registry::select_service;

    #[tokio::test]
    async fn keyed_provider_without_key_is_unconfigured() {
        let service = select_service(Some("google")).unwrap();
        let provider = build_provider(reqwest::Client::new(), &service, None);
        assert_eq!(provider.id(), "google");
        assert_eq!(
            provider.lookup("서울특별시 종로구").await,
            Err(GeocodeError::Unconfigured)
        );
    }

    #[test]
    fn only_quota_errors_stop_batches() {
        assert!(GeocodeError::RateLimitExceeded.is_rate_limit());
        assert!(!GeocodeError::Timeout { timeout_ms: 10 }.is_rate_limit());
        assert!(!GeocodeError::Unconfigured.is_rate_limit());
    }
}
