//! Multi-facet filtering with pre-filter counts.

use strum::IntoEnumIterator;
use wildfire_map_analytics_models::{FilterState, Stats};
use wildfire_map_incident_models::{AreaBucket, IncidentRecord, has_address};

/// Filtered subset plus counts over the full input.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome<'a> {
    /// Records passing every predicate, in input order.
    pub filtered: Vec<&'a IncidentRecord>,
    /// Counts over the unfiltered input.
    pub stats: Stats,
}

/// Applies `state` to `records`.
///
/// Predicates are AND-combined. Counts in the returned [`Stats`] ignore
/// the filter so disabled facets still show how many records they hold.
#[must_use]
pub fn apply<'a>(records: &'a [IncidentRecord], state: &FilterState) -> FilterOutcome<'a> {
    let needle = state.search_text.trim().to_lowercase();
    let filtered = records
        .iter()
        .filter(|r| matches_search(r, &needle))
        .filter(|r| state.causes.allows(&r.cause))
        .filter(|r| state.area_buckets.contains(&r.area_bucket()))
        .filter(|r| state.years.allows(&r.year()))
        .collect();

    FilterOutcome {
        filtered,
        stats: compute_stats(records),
    }
}

/// `needle` must already be trimmed and lowercased.
fn matches_search(record: &IncidentRecord, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    has_address(&record.location) && record.location.to_lowercase().contains(needle)
}

/// Per-dimension counts. Every area bucket gets an entry.
#[must_use]
pub fn compute_stats(records: &[IncidentRecord]) -> Stats {
    let mut stats = Stats {
        total: records.len(),
        by_area_bucket: AreaBucket::iter().map(|b| (b, 0)).collect(),
        ..Stats::default()
    };
    for record in records {
        *stats.by_cause.entry(record.cause.clone()).or_default() += 1;
        *stats.by_area_bucket.entry(record.area_bucket()).or_default() += 1;
        *stats.by_year.entry(record.year()).or_default() += 1;
    }
    stats
}

/// A computed view tagged with the engine revision it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterView<'a> {
    pub revision: u64,
    pub filtered: Vec<&'a IncidentRecord>,
    pub stats: Stats,
}

/// Owns a record snapshot and the filter state applied to it.
///
/// Every mutation bumps [`Self::revision`]. [`Self::view`] always
/// recomputes from the current snapshot and state, so a view can never mix
/// one revision's records with another's filters.
#[derive(Debug, Clone, Default)]
pub struct FilterEngine {
    records: Vec<IncidentRecord>,
    state: FilterState,
    revision: u64,
}

impl FilterEngine {
    #[must_use]
    pub fn new(records: Vec<IncidentRecord>) -> Self {
        let state = FilterState::permit_all(&records);
        Self {
            records,
            state,
            revision: 0,
        }
    }

    /// Swaps in a new dataset and resets the filters to all-permitted.
    pub fn replace_records(&mut self, records: Vec<IncidentRecord>) {
        log::debug!(
            "[filter] Replacing {} records with {}",
            self.records.len(),
            records.len()
        );
        self.state = FilterState::permit_all(&records);
        self.records = records;
        self.bump();
    }

    #[must_use]
    pub fn records(&self) -> &[IncidentRecord] {
        &self.records
    }

    #[must_use]
    pub const fn state(&self) -> &FilterState {
        &self.state
    }

    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Replaces the whole filter state.
    pub fn set_state(&mut self, state: FilterState) {
        self.state = state;
        self.bump();
    }

    pub fn toggle_cause(&mut self, cause: &str) {
        self.state.causes.toggle(cause.to_string());
        self.bump();
    }

    pub fn toggle_area_bucket(&mut self, bucket: AreaBucket) {
        self.state.toggle_area_bucket(bucket);
        self.bump();
    }

    pub fn toggle_year(&mut self, year: i32) {
        self.state.years.toggle(year);
        self.bump();
    }

    pub fn set_all_causes(&mut self, allowed: bool) {
        self.state.causes.set_all(allowed);
        self.bump();
    }

    pub fn set_all_area_buckets(&mut self, allowed: bool) {
        self.state.set_all_area_buckets(allowed);
        self.bump();
    }

    pub fn set_all_years(&mut self, allowed: bool) {
        self.state.years.set_all(allowed);
        self.bump();
    }

    pub fn set_search_text(&mut self, text: impl Into<String>) {
        self.state.search_text = text.into();
        self.bump();
    }

    /// Filters the current snapshot with the current state.
    #[must_use]
    pub fn view(&self) -> FilterView<'_> {
        let FilterOutcome { filtered, stats } = apply(&self.records, &self.state);
        FilterView {
            revision: self.revision,
            filtered,
            stats,
        }
    }

    /// Filtered records that have a coordinate.
    #[must_use]
    pub fn map_points(&self) -> Vec<&IncidentRecord> {
        apply(&self.records, &self.state)
            .filtered
            .into_iter()
            .filter(|r| r.is_mappable())
            .collect()
    }

    const fn bump(&mut self) {
        self.revision += 1;
    }
}
