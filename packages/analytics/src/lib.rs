#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory filtering and aggregation over wildfire records.
//!
//! Everything here is a pure function of the records and the filter state:
//! no I/O and no cached results. [`filter::FilterEngine`] adds a revision
//! counter on top so consumers can tell when a view is stale.

pub mod charts;
pub mod filter;
pub mod table;

pub use charts::{monthly_series, summary, top_causes, yearly_series};
pub use filter::{FilterEngine, FilterOutcome, FilterView, apply, compute_stats};
pub use table::query_table;

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;
    use wildfire_map_incident_models::{Coordinate, CoordinateSource, IncidentRecord};

    /// Builds a record with the fields analytics cares about.
    pub fn record(id: &str, date: &str, area: f64, cause: &str, location: &str) -> IncidentRecord {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        IncidentRecord {
            id: id.to_string(),
            date,
            occu_year: date.format("%Y").to_string(),
            location: location.to_string(),
            coordinate: None,
            coordinate_source: CoordinateSource::Missing,
            area,
            cause: cause.to_string(),
            amount: 0.0,
            casualties: None,
            source_id: None,
            city_code: None,
            district_code: None,
            quality: Vec::new(),
        }
    }

    pub fn placed(mut record: IncidentRecord) -> IncidentRecord {
        record.coordinate = Coordinate::new(36.5, 128.0);
        record.coordinate_source = CoordinateSource::Geographic;
        record
    }
}
