//! Compile-time registry of geocoding service configurations.
//!
//! Each geocoding provider is defined in a TOML file under `services/`.
//! The registry embeds these at compile time and exposes them via
//! [`all_services`] and [`enabled_services`].

use std::time::Duration;

use serde::Deserialize;

/// A geocoding service configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingService {
    /// Unique identifier (e.g., `"google"`, `"nominatim"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Whether this service may be selected.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Selection order; lower values are preferred.
    pub priority: u32,
    /// Whether lookups need a credential.
    #[serde(default)]
    pub requires_api_key: bool,
    /// Provider-specific configuration.
    pub provider: ProviderConfig,
}

/// Provider-specific configuration, tagged by `type` in TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Google Geocoding web service.
    Google {
        /// Endpoint URL.
        base_url: String,
        /// Region bias (ccTLD, e.g., `"kr"`).
        region: String,
        /// Result language.
        language: String,
        /// Minimum delay between requests in milliseconds.
        rate_limit_ms: u64,
        /// Per-request timeout in milliseconds.
        timeout_ms: u64,
    },
    /// Nominatim / `OpenStreetMap` free-form search.
    Nominatim {
        /// Endpoint URL.
        base_url: String,
        /// ISO country code restricting results.
        country_code: String,
        /// Minimum delay between requests in milliseconds.
        rate_limit_ms: u64,
        /// Per-request timeout in milliseconds.
        timeout_ms: u64,
    },
}

const fn default_true() -> bool {
    true
}

impl GeocodingService {
    /// Returns the provider's base URL regardless of variant.
    #[must_use]
    pub fn base_url(&self) -> &str {
        match &self.provider {
            ProviderConfig::Google { base_url, .. }
            | ProviderConfig::Nominatim { base_url, .. } => base_url,
        }
    }

    /// Minimum delay between consecutive external lookups.
    #[must_use]
    pub const fn rate_limit(&self) -> Duration {
        match &self.provider {
            ProviderConfig::Google { rate_limit_ms, .. }
            | ProviderConfig::Nominatim { rate_limit_ms, .. } => {
                Duration::from_millis(*rate_limit_ms)
            }
        }
    }

    /// Upper bound on a single lookup.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        match &self.provider {
            ProviderConfig::Google { timeout_ms, .. }
            | ProviderConfig::Nominatim { timeout_ms, .. } => Duration::from_millis(*timeout_ms),
        }
    }
}

/// Service definitions bundled into the binary, keyed by file stem.
const BUNDLED: [(&str, &str); 2] = [
    ("google", include_str!("../services/google.toml")),
    ("nominatim", include_str!("../services/nominatim.toml")),
];

/// Every bundled geocoding service, whether enabled or not.
///
/// # Panics
///
/// Panics if a bundled definition does not parse.
#[must_use]
pub fn all_services() -> Vec<GeocodingService> {
    BUNDLED
        .into_iter()
        .map(|(stem, text)| {
            toml::de::from_str::<GeocodingService>(text)
                .unwrap_or_else(|e| panic!("Invalid geocoding service {stem}.toml: {e}"))
        })
        .collect()
}

/// Enabled services, lowest priority value first.
#[must_use]
pub fn enabled_services() -> Vec<GeocodingService> {
    let mut enabled = all_services();
    enabled.retain(|s| s.enabled);
    enabled.sort_by_key(|s| s.priority);
    enabled
}

/// Picks the service to geocode with.
///
/// An explicit `preferred` id selects that service even when it is
/// disabled by default (e.g., opting in to Nominatim). Otherwise the
/// highest-priority enabled service is chosen. Credentials are not
/// considered: a keyed service without a key still gets selected so that
/// every lookup fails as unconfigured instead of silently switching
/// providers.
#[must_use]
pub fn select_service(preferred: Option<&str>) -> Option<GeocodingService> {
    match preferred {
        Some(id) => all_services().into_iter().find(|s| s.id == id),
        None => enabled_services().into_iter().next(),
    }
}
