//! Environment-driven settings for the ingest tool.

use std::path::PathBuf;
use std::time::Duration;

use wildfire_map_geocoder::cache::CacheOptions;
use wildfire_map_geocoder::service_registry::GeocodingService;
use wildfire_map_source::RegistryConfig;

pub const GEOCODING_API_KEY_VAR: &str = "WILDFIRE_MAP_GEOCODING_API_KEY";
pub const REGISTRY_API_KEY_VAR: &str = "WILDFIRE_MAP_REGISTRY_API_KEY";
pub const REGISTRY_URL_VAR: &str = "WILDFIRE_MAP_REGISTRY_URL";
pub const GEOCODE_RATE_LIMIT_VAR: &str = "WILDFIRE_MAP_GEOCODE_RATE_LIMIT_MS";
pub const GEOCODER_VAR: &str = "WILDFIRE_MAP_GEOCODER";
pub const DATA_DIR_VAR: &str = "WILDFIRE_MAP_DATA_DIR";

/// Credentials and deployment settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Credential for the geocoding provider.
    pub geocoding_api_key: Option<String>,
    /// Credential for the registry API.
    pub registry_api_key: Option<String>,
    /// Registry endpoint override.
    pub registry_url: Option<String>,
    /// Minimum delay between geocoding requests, overriding the service
    /// default.
    pub geocode_rate_limit: Option<Duration>,
    /// Geocoding service id, overriding the highest-priority enabled one.
    pub geocoder: Option<String>,
    /// Root of the durable key-value store.
    pub data_dir: PathBuf,
}

impl IngestConfig {
    /// Reads settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through `lookup`. Blank values count as unset.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let geocode_rate_limit = get(GEOCODE_RATE_LIMIT_VAR).and_then(|raw| {
            raw.parse::<u64>().map(Duration::from_millis).map_or_else(
                |_| {
                    log::warn!("Ignoring {GEOCODE_RATE_LIMIT_VAR}={raw:?}: not a whole number of ms");
                    None
                },
                Some,
            )
        });

        Self {
            geocoding_api_key: get(GEOCODING_API_KEY_VAR),
            registry_api_key: get(REGISTRY_API_KEY_VAR),
            registry_url: get(REGISTRY_URL_VAR),
            geocode_rate_limit,
            geocoder: get(GEOCODER_VAR),
            data_dir: get(DATA_DIR_VAR)
                .map_or_else(wildfire_map_database::paths::data_dir, PathBuf::from),
        }
    }

    /// Logs a warning for each missing credential. Lookups that need one
    /// will fail as unconfigured.
    pub fn warn_missing_credentials(&self) {
        if self.geocoding_api_key.is_none() {
            log::warn!("{GEOCODING_API_KEY_VAR} is not set; keyed geocoding lookups will fail");
        }
        if self.registry_api_key.is_none() {
            log::warn!("{REGISTRY_API_KEY_VAR} is not set; registry fetches will fail");
        }
    }

    /// Embedded registry settings with the endpoint override applied.
    #[must_use]
    pub fn registry_config(&self) -> RegistryConfig {
        let mut config = RegistryConfig::embedded();
        if let Some(url) = &self.registry_url {
            config.base_url.clone_from(url);
        }
        config
    }

    /// Cache timing for `service`, with the rate-limit override applied.
    #[must_use]
    pub fn cache_options(&self, service: &GeocodingService) -> CacheOptions {
        CacheOptions {
            min_delay: self
                .geocode_rate_limit
                .unwrap_or_else(|| service.rate_limit()),
            lookup_timeout: service.timeout(),
        }
    }

    /// `DuckDB` file backing the key-value store.
    #[must_use]
    pub fn kv_db_path(&self) -> PathBuf {
        wildfire_map_database::paths::kv_db_path(&self.data_dir)
    }
}
