#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Wildfire record ingestion pipeline.
//!
//! Reads spreadsheet exports or registry pages, normalizes them into
//! incident records, fills in missing coordinates through the persistent
//! geocode cache, and feeds the result to the analytics engine.

pub mod commands;
pub mod config;
pub mod interactive;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use thiserror::Error;
use wildfire_map_database::DbError;
use wildfire_map_database::kv::DuckDbKvStore;
use wildfire_map_geocoder::GeocodeError;
use wildfire_map_geocoder::cache::{GeocodeCache, LoadOutcome};
use wildfire_map_geocoder::service_registry::select_service;
use wildfire_map_incident_models::{Coordinate, CoordinateSource, IncidentRecord, QualityIssue};
use wildfire_map_projection::{ProjectionConfig, ProjectionError, ProjectionResolver};
use wildfire_map_source::progress::ProgressCallback;
use wildfire_map_source::{
    ColumnAliases, NormalizedBatch, Normalizer, RegistryClient, RegistryPages, SourceError,
    spreadsheet,
};

use crate::config::IngestConfig;

/// Errors that can occur while ingesting records.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Reading or fetching source rows failed.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// The candidate projection table is invalid.
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// The key-value store failed.
    #[error("Storage error: {0}")]
    Db(#[from] DbError),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The requested geocoding service does not exist.
    #[error("Unknown geocoding service: {id}")]
    UnknownGeocoder {
        /// The requested id.
        id: String,
    },
}

/// Builds a normalizer from the embedded tables, replacing either table
/// with a file when a path is given.
///
/// # Errors
///
/// Returns [`IngestError`] if an override file cannot be read or is
/// invalid.
pub fn build_normalizer(
    candidates: Option<&Path>,
    columns: Option<&Path>,
) -> Result<Normalizer, IngestError> {
    let resolver = match candidates {
        Some(path) => {
            log::info!("Loading candidate projections from {}", path.display());
            ProjectionResolver::new(ProjectionConfig::load(path)?)?
        }
        None => ProjectionResolver::default(),
    };
    let aliases = match columns {
        Some(path) => {
            log::info!("Loading column aliases from {}", path.display());
            ColumnAliases::load(path)?
        }
        None => ColumnAliases::embedded(),
    };
    Ok(Normalizer::new(aliases, resolver))
}

/// Reads and normalizes a spreadsheet export.
///
/// # Errors
///
/// Returns [`IngestError::Source`] if the file cannot be read.
pub fn import_file(
    path: &Path,
    tag: &str,
    normalizer: &Normalizer,
    today: NaiveDate,
) -> Result<NormalizedBatch, IngestError> {
    let rows = spreadsheet::read_rows(path)?;
    Ok(normalizer.normalize(&rows, tag, today))
}

/// How much of the registry to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchRange {
    /// The most recent N years, year by year.
    RecentYears(u32),
    /// The first N unfiltered pages.
    Pages(u32),
}

/// Fetches registry rows.
///
/// # Errors
///
/// Returns [`IngestError::Source`] if the registry is unconfigured.
/// Failing pages are logged and end the walk early.
pub async fn fetch_registry(
    registry: &dyn RegistryPages,
    range: FetchRange,
    today: NaiveDate,
    pages_per_year: u32,
    fallback_pages: u32,
    progress: Arc<dyn ProgressCallback>,
) -> Result<Vec<serde_json::Value>, IngestError> {
    let rows = match range {
        FetchRange::RecentYears(years) => {
            registry
                .fetch_recent(years, today.year(), pages_per_year, fallback_pages, progress)
                .await?
        }
        FetchRange::Pages(pages) => {
            progress.set_message(format!("first {pages} pages"));
            let rows = registry.fetch_all(pages).await?;
            progress.finish(format!("{} rows", rows.len()));
            rows
        }
    };
    Ok(rows)
}

/// Builds the registry client from `config`.
#[must_use]
pub fn registry_client(config: &IngestConfig, client: reqwest::Client) -> RegistryClient {
    RegistryClient::new(
        client,
        config.registry_config(),
        config.registry_api_key.clone(),
    )
}

/// Builds the geocode cache over the `DuckDB` store in the data directory
/// and restores persisted entries. Call [`save_geocode_cache`] when the
/// session ends.
///
/// # Errors
///
/// Returns [`IngestError::UnknownGeocoder`] if a requested service does not
/// exist, or [`IngestError::Db`] if the store cannot be opened.
pub fn open_geocode_cache(
    config: &IngestConfig,
    client: reqwest::Client,
) -> Result<GeocodeCache, IngestError> {
    let service =
        select_service(config.geocoder.as_deref()).ok_or_else(|| IngestError::UnknownGeocoder {
            id: config.geocoder.clone().unwrap_or_default(),
        })?;
    log::info!("Geocoding with {} ({})", service.name, service.id);

    let store = DuckDbKvStore::open(&config.kv_db_path())?;

    let provider = wildfire_map_geocoder::build_provider(
        client,
        &service,
        config.geocoding_api_key.clone(),
    );
    let cache = GeocodeCache::new(
        provider,
        Arc::new(store),
        config.cache_options(&service),
    );

    match cache.load() {
        LoadOutcome::Empty => log::info!("Geocode cache is empty"),
        LoadOutcome::Loaded { entries, dropped } => {
            log::info!("Restored {entries} geocode cache entries ({dropped} dropped)");
        }
        LoadOutcome::Discarded { reason } => {
            log::warn!("Discarded persisted geocode cache: {reason}");
        }
    }
    Ok(cache)
}

/// Persists the geocode cache at the end of a session.
///
/// # Errors
///
/// Returns [`IngestError::Db`] if the store cannot be written.
pub fn save_geocode_cache(cache: &GeocodeCache) -> Result<usize, IngestError> {
    let saved = cache.save()?;
    log::info!("Saved {saved} geocode cache entries");
    Ok(saved)
}

/// What a geocoding pass did.
#[derive(Debug, Clone, Default)]
pub struct GeocodeSummary {
    pub matched: usize,
    pub unmatched: usize,
    /// Records not attempted because the batch stopped early.
    pub skipped: usize,
    /// Why the batch stopped early, if it did.
    pub aborted: Option<GeocodeError>,
}

/// Geocodes the records named in `pending` and returns the updated record
/// list (input order preserved) with a summary.
///
/// Matched records get a new coordinate with [`CoordinateSource::Geocoded`];
/// unmatched ones get a [`QualityIssue::GeocodeMiss`]. Skipped records are
/// returned unchanged.
pub async fn geocode_pending(
    records: Vec<IncidentRecord>,
    pending: &[String],
    cache: &GeocodeCache,
    progress: Arc<dyn ProgressCallback>,
) -> (Vec<IncidentRecord>, GeocodeSummary) {
    let pending: BTreeSet<&str> = pending.iter().map(String::as_str).collect();
    let items: Vec<(String, String)> = records
        .iter()
        .filter(|r| pending.contains(r.id.as_str()))
        .map(|r| (r.id.clone(), r.location.clone()))
        .collect();

    progress.set_total(items.len() as u64);
    let result = cache
        .resolve_batch(&items, |p| progress.set_position(p.current as u64))
        .await;

    let matched = result.matched_map();
    let unmatched: BTreeSet<&str> = result.unmatched.iter().map(String::as_str).collect();
    let summary = GeocodeSummary {
        matched: matched.len(),
        unmatched: unmatched.len(),
        skipped: result.skipped.len(),
        aborted: result.aborted.clone(),
    };
    progress.finish(format!(
        "{} matched, {} unmatched",
        summary.matched, summary.unmatched
    ));

    let records = records
        .into_iter()
        .map(|record| apply_geocode(record, &matched, &unmatched))
        .collect();
    (records, summary)
}

fn apply_geocode(
    record: IncidentRecord,
    matched: &BTreeMap<String, Coordinate>,
    unmatched: &BTreeSet<&str>,
) -> IncidentRecord {
    if let Some(coordinate) = matched.get(&record.id) {
        record.with_coordinate(*coordinate, CoordinateSource::Geocoded)
    } else if unmatched.contains(record.id.as_str()) {
        record.with_issue(QualityIssue::GeocodeMiss)
    } else {
        record
    }
}

/// Writes records as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`IngestError`] if serialization or the write fails.
pub fn write_records(path: &Path, records: &[IncidentRecord]) -> Result<(), IngestError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        wildfire_map_database::paths::ensure_dir(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(records)?)?;
    log::info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}
