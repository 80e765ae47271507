//! Command implementations shared by the CLI and the interactive menu.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use wildfire_map_analytics::{
    FilterEngine, monthly_series, query_table, summary, top_causes, yearly_series,
};
use wildfire_map_analytics_models::{FilterState, TableQuery};
use wildfire_map_cli_utils::{IndicatifProgress, MultiProgress};
use wildfire_map_incident_models::IncidentRecord;
use wildfire_map_geocoder::cache::GeocodeCache;
use wildfire_map_source::{NormalizedBatch, Normalizer, RegistryConfig, RegistryPages};

use crate::config::IngestConfig;
use crate::{
    FetchRange, IngestError, build_normalizer, fetch_registry, geocode_pending, import_file,
    registry_client, write_records,
};

/// Table overrides for normalization.
#[derive(Debug, Clone, Default)]
pub struct TableOverrides {
    /// Candidate projection table file.
    pub candidates: Option<PathBuf>,
    /// Column alias table file.
    pub columns: Option<PathBuf>,
}

impl TableOverrides {
    fn normalizer(&self) -> Result<Normalizer, IngestError> {
        build_normalizer(self.candidates.as_deref(), self.columns.as_deref())
    }
}

/// Imports a spreadsheet export. When `cache` is given, records with an
/// address but no coordinate are geocoded through it.
///
/// # Errors
///
/// Returns [`IngestError`] if reading, normalizing, or writing fails.
pub async fn import(
    multi: &MultiProgress,
    file: &Path,
    tag: &str,
    cache: Option<&GeocodeCache>,
    tables: &TableOverrides,
    output: Option<&Path>,
    today: NaiveDate,
) -> Result<Vec<IncidentRecord>, IngestError> {
    let normalizer = tables.normalizer()?;
    let batch = import_file(file, tag, &normalizer, today)?;
    print_batch_report(&batch);
    finish_batch(multi, batch, cache, output).await
}

/// Fetches registry rows with the configured client and normalizes them.
///
/// # Errors
///
/// Returns [`IngestError`] if the registry is unconfigured, a table override
/// is invalid, or writing fails.
pub async fn fetch(
    config: &IngestConfig,
    multi: &MultiProgress,
    range: FetchRange,
    cache: Option<&GeocodeCache>,
    tables: &TableOverrides,
    output: Option<&Path>,
    today: NaiveDate,
) -> Result<Vec<IncidentRecord>, IngestError> {
    let client = registry_client(config, reqwest::Client::new());
    let registry_config = client.config().clone();
    fetch_from(
        &client,
        &registry_config,
        multi,
        range,
        cache,
        tables,
        output,
        today,
    )
    .await
}

/// Fetches rows from `registry` and normalizes them.
///
/// # Errors
///
/// Returns [`IngestError`] if the registry is unconfigured, a table override
/// is invalid, or writing fails.
#[allow(clippy::too_many_arguments)]
pub async fn fetch_from(
    registry: &dyn RegistryPages,
    registry_config: &RegistryConfig,
    multi: &MultiProgress,
    range: FetchRange,
    cache: Option<&GeocodeCache>,
    tables: &TableOverrides,
    output: Option<&Path>,
    today: NaiveDate,
) -> Result<Vec<IncidentRecord>, IngestError> {
    let normalizer = tables.normalizer()?;
    let progress = IndicatifProgress::steps_bar(multi, "Fetching registry");
    let rows = fetch_registry(
        registry,
        range,
        today,
        registry_config.max_pages_per_year,
        registry_config.fallback_pages,
        progress,
    )
    .await?;

    let batch = normalizer.normalize(&rows, "registry", today);
    print_batch_report(&batch);
    finish_batch(multi, batch, cache, output).await
}

async fn finish_batch(
    multi: &MultiProgress,
    batch: NormalizedBatch,
    cache: Option<&GeocodeCache>,
    output: Option<&Path>,
) -> Result<Vec<IncidentRecord>, IngestError> {
    let records = match cache {
        Some(cache) if !batch.pending_geocode.is_empty() => {
            let progress = IndicatifProgress::batch_bar(multi, "Geocoding addresses");
            let (records, summary) =
                geocode_pending(batch.records, &batch.pending_geocode, cache, progress).await;

            if let Some(reason) = &summary.aborted {
                log::warn!(
                    "Geocoding stopped early ({reason}); {} records left for a later run",
                    summary.skipped
                );
            }
            println!(
                "Geocoded: {} matched, {} unmatched, {} skipped",
                summary.matched, summary.unmatched, summary.skipped
            );
            records
        }
        _ => batch.records,
    };

    if let Some(path) = output {
        write_records(path, &records)?;
    }
    Ok(records)
}

fn print_batch_report(batch: &NormalizedBatch) {
    let flagged = batch
        .records
        .iter()
        .filter(|r| !r.quality.is_empty())
        .count();
    println!(
        "Normalized {} records ({} mappable, {} awaiting geocoding, {} with quality issues)",
        batch.records.len(),
        batch.mappable_count(),
        batch.pending_geocode.len(),
        flagged
    );
    if !batch.rejected.is_empty() {
        println!("Rejected {} rows:", batch.rejected.len());
        for rejected in batch.rejected.iter().take(10) {
            println!("  row {}: {}", rejected.row_index + 1, rejected.reason);
        }
        if batch.rejected.len() > 10 {
            println!("  ... and {} more", batch.rejected.len() - 10);
        }
    }
}

/// Loads records for analysis: a JSON file of already-normalized records
/// is used as is, anything else goes through the normalizer.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read or normalized.
pub fn load_records(
    path: &Path,
    tables: &TableOverrides,
    today: NaiveDate,
) -> Result<Vec<IncidentRecord>, IngestError> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json
        && let Ok(records) =
            serde_json::from_str::<Vec<IncidentRecord>>(&std::fs::read_to_string(path)?)
    {
        log::info!("Loaded {} normalized records from {}", records.len(), path.display());
        return Ok(records);
    }

    let batch = import_file(path, "import", &tables.normalizer()?, today)?;
    print_batch_report(&batch);
    Ok(batch.records)
}

/// Prints headline numbers, facet counts, and chart series for the
/// records that pass `state`.
pub fn print_stats(records: Vec<IncidentRecord>, state: FilterState, top: usize, today: NaiveDate) {
    let mut engine = FilterEngine::new(records);
    engine.set_state(state);
    let view = engine.view();

    let headline = summary(view.filtered.iter().copied(), today);
    println!(
        "Fires: {} of {} (this year: {}), burned area: {:.1}ha, mappable: {}",
        headline.total_fires,
        view.stats.total,
        headline.current_year_fires,
        headline.total_area,
        engine.map_points().len()
    );

    println!("\n{:<16} {:>8}", "AREA", "ALL");
    for (bucket, count) in &view.stats.by_area_bucket {
        println!("{:<16} {count:>8}", bucket.label());
    }

    println!("\n{:<8} {:>8} {:>12} {:>16}", "YEAR", "FIRES", "AREA (ha)", "AMOUNT");
    for point in yearly_series(view.filtered.iter().copied()) {
        println!(
            "{:<8} {:>8} {:>12.2} {:>16.0}",
            point.year, point.count, point.total_area, point.total_amount
        );
    }

    println!("\n{:<8} {:>8} {:>12}", "MONTH", "FIRES", "AREA (ha)");
    for point in monthly_series(view.filtered.iter().copied()) {
        println!("{:<8} {:>8} {:>12.2}", point.month, point.count, point.total_area);
    }

    println!("\n{:<24} {:>8}", "CAUSE", "FIRES");
    for cause in top_causes(view.filtered.iter().copied(), top) {
        println!("{:<24} {:>8}", cause.cause, cause.count);
    }
}

/// Prints one table page.
pub fn print_table(records: &[IncidentRecord], query: &TableQuery) {
    let page = query_table(records, query);
    println!(
        "{:<12} {:<10} {:>10} {:>14} {:<20} LOCATION",
        "ID", "DATE", "AREA", "AMOUNT", "CAUSE"
    );
    println!("{}", "-".repeat(90));
    for row in &page.rows {
        println!(
            "{:<12} {:<10} {:>10.2} {:>14.0} {:<20} {}",
            row.id,
            row.date.format("%Y-%m-%d"),
            row.area,
            row.amount,
            row.cause,
            row.location
        );
    }
    println!(
        "Page {}/{} ({} rows of {} total)",
        page.page,
        page.page_count.max(1),
        page.total,
        records.len()
    );
}

/// Prints geocode cache counters.
pub fn cache_stats(config: &IngestConfig, cache: &GeocodeCache) {
    let stats = cache.stats();
    println!("Store:     {}", config.kv_db_path().display());
    println!("Entries:   {}", stats.entries);
    println!("Found:     {}", stats.found);
    println!("Not found: {}", stats.not_found);
    println!("Lookups:   {}", stats.lookups);
}

/// Empties the geocode cache, in memory and in the store.
///
/// # Errors
///
/// Returns [`IngestError::Db`] if the store cannot be cleared.
pub fn clear_cache(cache: &GeocodeCache) -> Result<(), IngestError> {
    let entries = cache.len();
    cache.clear()?;
    println!("Cleared {entries} geocode cache entries");
    Ok(())
}
