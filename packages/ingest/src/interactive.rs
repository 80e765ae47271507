#![allow(clippy::module_name_repetitions)]

//! Interactive menu for the wildfire data tool.
//!
//! A [`Session`] keeps the last imported or fetched dataset in a
//! [`FilterEngine`] so filters can be adjusted and re-applied without
//! reloading. The geocode cache is loaded when the session starts and
//! saved when it ends. A failing action is logged and leaves the session
//! (and its dataset) intact.

use std::path::PathBuf;

use dialoguer::{Confirm, Input, MultiSelect, Select};
use strum::IntoEnumIterator;
use wildfire_map_analytics::FilterEngine;
use wildfire_map_analytics_models::{SortColumn, SortDirection, TOP_CAUSES_LIMIT, TableQuery};
use wildfire_map_cli_utils::MultiProgress;
use wildfire_map_geocoder::cache::GeocodeCache;
use wildfire_map_incident_models::{AreaBucket, IncidentRecord};

use crate::commands::{self, TableOverrides};
use crate::config::IngestConfig;
use crate::{FetchRange, IngestError, open_geocode_cache, save_geocode_cache};

/// Top-level actions available in the menu.
#[derive(Clone, Copy)]
enum MenuAction {
    ImportFile,
    FetchRegistry,
    AdjustFilters,
    ShowStats,
    BrowseTable,
    CacheStats,
    ClearCache,
    Quit,
}

impl MenuAction {
    const ALL: &[Self] = &[
        Self::ImportFile,
        Self::FetchRegistry,
        Self::AdjustFilters,
        Self::ShowStats,
        Self::BrowseTable,
        Self::CacheStats,
        Self::ClearCache,
        Self::Quit,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::ImportFile => "Import a spreadsheet export",
            Self::FetchRegistry => "Fetch from the registry API",
            Self::AdjustFilters => "Adjust filters",
            Self::ShowStats => "Show statistics",
            Self::BrowseTable => "Browse table",
            Self::CacheStats => "Geocode cache statistics",
            Self::ClearCache => "Clear geocode cache",
            Self::Quit => "Quit",
        }
    }
}

/// Dataset and geocode cache kept across menu actions.
pub struct Session {
    engine: FilterEngine,
    cache: Option<GeocodeCache>,
}

impl Session {
    /// Starts an empty session. Without a cache, geocoding is unavailable.
    #[must_use]
    pub fn new(cache: Option<GeocodeCache>) -> Self {
        Self {
            engine: FilterEngine::default(),
            cache,
        }
    }

    #[must_use]
    pub const fn engine(&self) -> &FilterEngine {
        &self.engine
    }

    #[must_use]
    pub const fn cache(&self) -> Option<&GeocodeCache> {
        self.cache.as_ref()
    }

    /// Makes `loaded` the session dataset. On error the current dataset is
    /// kept and the error is logged. Returns whether the dataset changed.
    pub fn adopt(&mut self, loaded: Result<Vec<IncidentRecord>, IngestError>) -> bool {
        match loaded {
            Ok(records) => {
                self.engine.replace_records(records);
                true
            }
            Err(e) => {
                log::error!("{e}");
                false
            }
        }
    }

    /// Saves the geocode cache, if there is one.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Db`] if the store cannot be written.
    pub fn close(&self) -> Result<(), IngestError> {
        if let Some(cache) = &self.cache {
            save_geocode_cache(cache)?;
        }
        Ok(())
    }
}

/// Runs the menu loop until the user quits, then saves the geocode cache.
///
/// # Errors
///
/// Returns an error if a prompt fails or the cache cannot be saved.
pub async fn run(
    config: &IngestConfig,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    config.warn_missing_credentials();
    let cache = match open_geocode_cache(config, reqwest::Client::new()) {
        Ok(cache) => Some(cache),
        Err(e) => {
            log::error!("Geocoding unavailable this session: {e}");
            None
        }
    };

    let mut session = Session::new(cache);
    let outcome = menu(config, multi, &mut session).await;
    session.close()?;
    outcome
}

async fn menu(
    config: &IngestConfig,
    multi: &MultiProgress,
    session: &mut Session,
) -> Result<(), Box<dyn std::error::Error>> {
    let labels: Vec<&str> = MenuAction::ALL.iter().map(MenuAction::label).collect();

    loop {
        let idx = Select::new()
            .with_prompt(format!(
                "What would you like to do? ({} records loaded)",
                session.engine.records().len()
            ))
            .items(&labels)
            .default(0)
            .interact()?;
        let today = chrono::Local::now().date_naive();

        match MenuAction::ALL[idx] {
            MenuAction::ImportFile => {
                let file: String = Input::new()
                    .with_prompt("File (xlsx, CSV, or JSON)")
                    .interact_text()?;
                let cache = prompt_geocode(session.cache())?;
                let loaded = commands::import(
                    multi,
                    &PathBuf::from(file.trim()),
                    "import",
                    cache,
                    &TableOverrides::default(),
                    None,
                    today,
                )
                .await;
                session.adopt(loaded);
            }
            MenuAction::FetchRegistry => {
                let years = prompt_optional_u32("Recent years to fetch (empty for 5)")?;
                let cache = prompt_geocode(session.cache())?;
                let loaded = commands::fetch(
                    config,
                    multi,
                    FetchRange::RecentYears(years.unwrap_or(5)),
                    cache,
                    &TableOverrides::default(),
                    None,
                    today,
                )
                .await;
                session.adopt(loaded);
            }
            MenuAction::AdjustFilters => adjust_filters(&mut session.engine)?,
            MenuAction::ShowStats => {
                commands::print_stats(
                    session.engine.records().to_vec(),
                    session.engine.state().clone(),
                    TOP_CAUSES_LIMIT,
                    today,
                );
            }
            MenuAction::BrowseTable => browse_table(&session.engine)?,
            MenuAction::CacheStats => match session.cache() {
                Some(cache) => commands::cache_stats(config, cache),
                None => println!("No geocode cache in this session."),
            },
            MenuAction::ClearCache => {
                if let Some(cache) = session.cache()
                    && Confirm::new()
                        .with_prompt("Delete every cached geocode result?")
                        .default(false)
                        .interact()?
                    && let Err(e) = commands::clear_cache(cache)
                {
                    log::error!("{e}");
                }
            }
            MenuAction::Quit => return Ok(()),
        }
    }
}

/// Asks whether to geocode when a cache is available.
fn prompt_geocode(
    cache: Option<&GeocodeCache>,
) -> Result<Option<&GeocodeCache>, Box<dyn std::error::Error>> {
    let Some(cache) = cache else {
        return Ok(None);
    };
    let geocode = Confirm::new()
        .with_prompt("Geocode records without coordinates?")
        .default(true)
        .interact()?;
    Ok(geocode.then_some(cache))
}

/// Lets the user pick allowed causes, area buckets, years, and search text.
fn adjust_filters(engine: &mut FilterEngine) -> Result<(), Box<dyn std::error::Error>> {
    let mut state = engine.state().clone();

    let causes: Vec<(String, bool)> = state.causes.iter().map(|(c, on)| (c.clone(), on)).collect();
    if !causes.is_empty() {
        let labels: Vec<&str> = causes.iter().map(|(c, _)| c.as_str()).collect();
        let checked: Vec<bool> = causes.iter().map(|(_, on)| *on).collect();
        let selected = MultiSelect::new()
            .with_prompt("Causes (space=toggle, a=all, enter=confirm)")
            .items(&labels)
            .defaults(&checked)
            .interact()?;
        for (i, (cause, _)) in causes.into_iter().enumerate() {
            state.causes.set(cause, selected.contains(&i));
        }
    }

    let buckets: Vec<AreaBucket> = AreaBucket::iter().collect();
    let labels: Vec<&str> = buckets.iter().map(|b| b.label()).collect();
    let checked: Vec<bool> = buckets
        .iter()
        .map(|b| state.area_buckets.contains(b))
        .collect();
    let selected = MultiSelect::new()
        .with_prompt("Area buckets")
        .items(&labels)
        .defaults(&checked)
        .interact()?;
    state.area_buckets = selected.into_iter().map(|i| buckets[i]).collect();

    let years: Vec<(i32, bool)> = state.years.iter().map(|(y, on)| (*y, on)).collect();
    if !years.is_empty() {
        let labels: Vec<String> = years.iter().map(|(y, _)| y.to_string()).collect();
        let checked: Vec<bool> = years.iter().map(|(_, on)| *on).collect();
        let selected = MultiSelect::new()
            .with_prompt("Years")
            .items(&labels)
            .defaults(&checked)
            .interact()?;
        for (i, (year, _)) in years.into_iter().enumerate() {
            state.years.set(year, selected.contains(&i));
        }
    }

    state.search_text = Input::new()
        .with_prompt("Location search (empty for all)")
        .allow_empty(true)
        .interact_text()?;

    engine.set_state(state);
    let view = engine.view();
    println!(
        "{} of {} records match ({} on the map)",
        view.filtered.len(),
        view.stats.total,
        engine.map_points().len()
    );
    Ok(())
}

fn browse_table(engine: &FilterEngine) -> Result<(), Box<dyn std::error::Error>> {
    let columns = [
        SortColumn::Date,
        SortColumn::Area,
        SortColumn::Amount,
        SortColumn::Location,
    ];
    let labels: Vec<&str> = columns.iter().map(AsRef::as_ref).collect();
    let column = Select::new()
        .with_prompt("Sort by")
        .items(&labels)
        .default(0)
        .interact()?;
    let ascending = Confirm::new()
        .with_prompt("Ascending?")
        .default(false)
        .interact()?;

    let records: Vec<_> = engine.view().filtered.into_iter().cloned().collect();
    let mut query = TableQuery {
        sort: columns[column],
        direction: if ascending {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        },
        ..TableQuery::default()
    };

    loop {
        commands::print_table(&records, &query);
        let Some(page) = prompt_optional_u32("Page (empty to stop)")? else {
            return Ok(());
        };
        query.page = usize::try_from(page)?;
    }
}

/// Prompts for an optional `u32`. Returns `None` if the input is empty.
fn prompt_optional_u32(prompt: &str) -> Result<Option<u32>, Box<dyn std::error::Error>> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;

    if input.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(input.trim().parse()?))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use wildfire_map_database::kv::{KvStore, MemoryKvStore};
    use wildfire_map_geocoder::cache::{CACHE_KEY, CacheOptions};
    use wildfire_map_geocoder::{GeocodeError, GeocodeProvider};
    use wildfire_map_incident_models::Coordinate;
    use wildfire_map_source::registry::RegistryPage;
    use wildfire_map_source::{Normalizer, RegistryConfig, RegistryPages, SourceError};

    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    fn loaded_session() -> Session {
        let batch = Normalizer::default().normalize(
            &[serde_json::json!({ "DATE": "2024-04-05", "LOCATION": "강원 강릉시 옥계면" })],
            "import",
            today(),
        );
        let mut session = Session::new(None);
        assert!(session.adopt(Ok(batch.records)));
        session
    }

    struct NoKey;

    #[async_trait]
    impl RegistryPages for NoKey {
        async fn fetch_page(
            &self,
            _page: u32,
            _year: Option<i32>,
        ) -> Result<RegistryPage, SourceError> {
            Err(SourceError::Unconfigured)
        }
    }

    #[tokio::test]
    async fn unconfigured_fetch_keeps_the_loaded_dataset() {
        let mut session = loaded_session();
        let revision = session.engine().revision();

        let loaded = commands::fetch_from(
            &NoKey,
            &RegistryConfig::embedded(),
            &MultiProgress::new(),
            FetchRange::RecentYears(3),
            session.cache(),
            &TableOverrides::default(),
            None,
            today(),
        )
        .await;

        assert!(!session.adopt(loaded));
        assert_eq!(session.engine().records().len(), 1);
        assert_eq!(session.engine().revision(), revision);
    }

    #[tokio::test]
    async fn missing_import_file_keeps_the_loaded_dataset() {
        let mut session = loaded_session();

        let loaded = commands::import(
            &MultiProgress::new(),
            Path::new("/nonexistent/fires.csv"),
            "import",
            None,
            &TableOverrides::default(),
            None,
            today(),
        )
        .await;

        assert!(!session.adopt(loaded));
        assert_eq!(session.engine().records()[0].location, "강원 강릉시 옥계면");
        session.close().unwrap();
    }

    struct Gangneung;

    #[async_trait]
    impl GeocodeProvider for Gangneung {
        fn id(&self) -> &str {
            "fixed"
        }

        async fn lookup(&self, _address: &str) -> Result<Option<Coordinate>, GeocodeError> {
            Ok(Coordinate::new(37.75, 128.9))
        }
    }

    #[tokio::test]
    async fn cache_is_saved_once_when_the_session_closes() {
        let store = Arc::new(MemoryKvStore::new());
        let options = CacheOptions {
            min_delay: std::time::Duration::ZERO,
            ..CacheOptions::default()
        };
        let cache = GeocodeCache::new(Arc::new(Gangneung), store.clone(), options);
        let session = Session::new(Some(cache));

        let found = session
            .cache()
            .unwrap()
            .resolve("강원 강릉시 옥계면")
            .await
            .unwrap();
        assert!(found.is_some());
        assert_eq!(store.get(CACHE_KEY).unwrap(), None);

        session.close().unwrap();
        let saved = store.get(CACHE_KEY).unwrap().unwrap();
        assert!(saved.contains("강원 강릉시 옥계면"));
    }
}
