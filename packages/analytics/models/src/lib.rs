#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Filter state and result types for wildfire analytics.
//!
//! These types carry no behavior beyond bookkeeping: filtering and
//! aggregation live in `wildfire_map_analytics`. Chart and table consumers
//! only ever see the shapes defined here.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumString};
use wildfire_map_incident_models::{AreaBucket, IncidentRecord};

/// Default number of rows per table page.
pub const TABLE_PAGE_SIZE: usize = 20;

/// Default number of causes in a top-causes chart.
pub const TOP_CAUSES_LIMIT: usize = 10;

/// Per-value enable switches for a categorical dimension.
///
/// A value the filter has never seen is allowed, so new categories in a
/// refreshed dataset stay visible until someone turns them off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "K: Ord + Serialize",
    deserialize = "K: Ord + Deserialize<'de>"
))]
pub struct CategoryFilter<K: Ord> {
    values: BTreeMap<K, bool>,
}

impl<K: Ord> Default for CategoryFilter<K> {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone> CategoryFilter<K> {
    /// Creates a filter that knows `values` and allows all of them.
    pub fn allowing(values: impl IntoIterator<Item = K>) -> Self {
        Self {
            values: values.into_iter().map(|v| (v, true)).collect(),
        }
    }

    /// Whether `value` passes.
    #[must_use]
    pub fn allows(&self, value: &K) -> bool {
        self.values.get(value).copied().unwrap_or(true)
    }

    /// Whether the filter has an explicit switch for `value`.
    #[must_use]
    pub fn knows(&self, value: &K) -> bool {
        self.values.contains_key(value)
    }

    /// Flips `value`. An unseen value counts as allowed, so its first
    /// toggle disables it.
    pub fn toggle(&mut self, value: K) {
        let allowed = self.allows(&value);
        self.values.insert(value, !allowed);
    }

    /// Sets `value` explicitly.
    pub fn set(&mut self, value: K, allowed: bool) {
        self.values.insert(value, allowed);
    }

    /// Sets every known value.
    pub fn set_all(&mut self, allowed: bool) {
        for v in self.values.values_mut() {
            *v = allowed;
        }
    }

    /// Known values and their switches, in order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, bool)> {
        self.values.iter().map(|(k, v)| (k, *v))
    }

    /// Number of known values that are allowed.
    #[must_use]
    pub fn allowed_count(&self) -> usize {
        self.values.values().filter(|v| **v).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The active predicate set. All predicates are AND-combined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    /// Allowed cause values.
    pub causes: CategoryFilter<String>,
    /// Allowed area buckets. Unlike causes and years, the bucket set is
    /// closed, so a missing bucket is disabled.
    pub area_buckets: BTreeSet<AreaBucket>,
    /// Allowed occurrence years (from the record date).
    pub years: CategoryFilter<i32>,
    /// Case-insensitive location substring. Empty matches everything.
    pub search_text: String,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            causes: CategoryFilter::default(),
            area_buckets: AreaBucket::iter().collect(),
            years: CategoryFilter::default(),
            search_text: String::new(),
        }
    }
}

impl FilterState {
    /// Builds an all-permitted state that knows every cause and year in
    /// `records`.
    #[must_use]
    pub fn permit_all(records: &[IncidentRecord]) -> Self {
        Self {
            causes: CategoryFilter::allowing(records.iter().map(|r| r.cause.clone())),
            years: CategoryFilter::allowing(records.iter().map(IncidentRecord::year)),
            ..Self::default()
        }
    }

    /// Flips one area bucket.
    pub fn toggle_area_bucket(&mut self, bucket: AreaBucket) {
        if !self.area_buckets.remove(&bucket) {
            self.area_buckets.insert(bucket);
        }
    }

    /// Enables or disables every area bucket.
    pub fn set_all_area_buckets(&mut self, allowed: bool) {
        if allowed {
            self.area_buckets = AreaBucket::iter().collect();
        } else {
            self.area_buckets.clear();
        }
    }
}

/// Per-dimension counts over the unfiltered record set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Number of records.
    pub total: usize,
    /// Count per cause.
    pub by_cause: BTreeMap<String, usize>,
    /// Count per area bucket. Every bucket is present, possibly with `0`.
    pub by_area_bucket: BTreeMap<AreaBucket, usize>,
    /// Count per occurrence year.
    pub by_year: BTreeMap<i32, usize>,
}

/// Headline numbers for a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_fires: usize,
    /// Hectares.
    pub total_area: f64,
    pub current_year_fires: usize,
    pub by_cause: BTreeMap<String, usize>,
}

/// One year in a yearly trend series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyPoint {
    pub year: i32,
    pub count: usize,
    pub total_area: f64,
    pub total_amount: f64,
}

/// One calendar month across all years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPoint {
    /// 1-12.
    pub month: u32,
    pub count: usize,
    pub total_area: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CauseCount {
    pub cause: String,
    pub count: usize,
}

/// Table sort column.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
pub enum SortColumn {
    #[default]
    Date,
    Area,
    Amount,
    Location,
}

/// Table sort direction.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// The opposite direction.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Parameters for a table page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableQuery {
    /// Case-insensitive location substring.
    pub search_text: String,
    /// Inclusive lower area bound.
    pub min_area: Option<f64>,
    /// Inclusive upper area bound.
    pub max_area: Option<f64>,
    /// Exact cause match. `None` means all causes.
    pub cause: Option<String>,
    pub sort: SortColumn,
    pub direction: SortDirection,
    /// 1-based page number. Out-of-range pages are clamped.
    pub page: usize,
    pub page_size: usize,
}

impl Default for TableQuery {
    fn default() -> Self {
        Self {
            search_text: String::new(),
            min_area: None,
            max_area: None,
            cause: None,
            sort: SortColumn::default(),
            direction: SortDirection::default(),
            page: 1,
            page_size: TABLE_PAGE_SIZE,
        }
    }
}

/// One page of table rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePage {
    pub rows: Vec<IncidentRecord>,
    /// Rows matching the query across all pages.
    pub total: usize,
    /// The page actually returned (after clamping).
    pub page: usize,
    pub page_count: usize,
}
