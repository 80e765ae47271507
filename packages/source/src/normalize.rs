//! Converts raw source rows into canonical [`IncidentRecord`]s.
//!
//! Rows from spreadsheets and the registry API share one path: each row is
//! a JSON object keyed by whatever the source called its columns, and
//! [`ColumnAliases`] says where to look for each field.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde_json::Value;
use thiserror::Error;
use wildfire_map_incident_models::{
    Coordinate, CoordinateSource, IncidentRecord, NO_ADDRESS, QualityIssue, UNKNOWN_CAUSE,
    has_address,
};
use wildfire_map_projection::{ProjectionResolver, ResolutionStatus};

use crate::columns::{ColumnAliases, first_present, first_text, value_text};
use crate::parsing::{DateParse, parse_amount, parse_coordinate_component, parse_date};

/// Why a row was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    /// The row was not a JSON object.
    #[error("row is not an object")]
    NotAnObject,
    /// The date had a recognized shape but named an impossible day.
    #[error("invalid calendar date: {raw}")]
    InvalidDate {
        /// The raw date cell.
        raw: String,
    },
    /// An earlier row in the batch had the same source identifier.
    #[error("duplicate source id: {source_id}")]
    Duplicate {
        /// The repeated identifier.
        source_id: String,
    },
}

/// A row that did not produce a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// Zero-based position of the row in the input.
    pub row_index: usize,
    /// Why it was dropped.
    pub reason: RejectReason,
}

/// Result of normalizing a batch of rows.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    /// Canonical records in input order.
    pub records: Vec<IncidentRecord>,
    /// Rows that were dropped.
    pub rejected: Vec<RejectedRow>,
    /// Ids of records that have an address but no coordinate yet.
    pub pending_geocode: Vec<String>,
}

impl NormalizedBatch {
    /// Number of records that already have a coordinate.
    #[must_use]
    pub fn mappable_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_mappable()).count()
    }
}

/// Row-to-record converter.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    aliases: ColumnAliases,
    resolver: ProjectionResolver,
}

impl Normalizer {
    #[must_use]
    pub const fn new(aliases: ColumnAliases, resolver: ProjectionResolver) -> Self {
        Self { aliases, resolver }
    }

    #[must_use]
    pub const fn aliases(&self) -> &ColumnAliases {
        &self.aliases
    }

    #[must_use]
    pub const fn resolver(&self) -> &ProjectionResolver {
        &self.resolver
    }

    /// Normalizes `rows`, assigning ids `"{batch_tag}-{n}"` where `n` is
    /// the one-based row position. `today` replaces unrecognized dates.
    #[must_use]
    pub fn normalize(&self, rows: &[Value], batch_tag: &str, today: NaiveDate) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();
        let mut seen_source_ids = BTreeSet::new();

        for (row_index, row) in rows.iter().enumerate() {
            let id = format!("{batch_tag}-{}", row_index + 1);
            let record = match self.normalize_row(row, id, today) {
                Ok(record) => record,
                Err(reason) => {
                    log::debug!("[normalize] Rejected row {row_index}: {reason}");
                    batch.rejected.push(RejectedRow { row_index, reason });
                    continue;
                }
            };

            if let Some(source_id) = &record.source_id
                && !seen_source_ids.insert(source_id.clone())
            {
                batch.rejected.push(RejectedRow {
                    row_index,
                    reason: RejectReason::Duplicate {
                        source_id: source_id.clone(),
                    },
                });
                continue;
            }

            if !record.is_mappable() && record.has_address() {
                batch.pending_geocode.push(record.id.clone());
            }
            batch.records.push(record);
        }

        log::info!(
            "[normalize] {batch_tag}: {} records ({} mappable, {} awaiting geocode), {} rejected",
            batch.records.len(),
            batch.mappable_count(),
            batch.pending_geocode.len(),
            batch.rejected.len(),
        );
        batch
    }

    /// Normalizes a single row.
    ///
    /// # Errors
    ///
    /// Returns a [`RejectReason`] if the row is not an object or names an
    /// impossible date.
    pub fn normalize_row(
        &self,
        row: &Value,
        id: String,
        today: NaiveDate,
    ) -> Result<IncidentRecord, RejectReason> {
        if !row.is_object() {
            return Err(RejectReason::NotAnObject);
        }
        let aliases = &self.aliases;
        let mut quality = Vec::new();

        let raw_date = first_present(row, &aliases.date);
        let date = match raw_date.map_or(DateParse::Unrecognized, parse_date) {
            DateParse::Parsed(date) => date,
            DateParse::Invalid => {
                return Err(RejectReason::InvalidDate {
                    raw: raw_date.map(value_text).unwrap_or_default(),
                });
            }
            DateParse::Unrecognized => {
                quality.push(QualityIssue::DateFallback {
                    raw: raw_date.map(value_text).unwrap_or_default(),
                });
                today
            }
        };

        let mut amount_field = |field: &str, names: &[String]| {
            let raw = first_present(row, names);
            let parsed = parse_amount(raw);
            if parsed.coerced {
                quality.push(QualityIssue::NumberCoerced {
                    field: field.to_string(),
                    raw: raw.map(value_text).unwrap_or_default(),
                });
            }
            parsed.value
        };
        let area = amount_field("area", &aliases.area);
        let amount = amount_field("amount", &aliases.amount);

        let occu_year = first_text(row, &aliases.year)
            .filter(|y| y.len() == 4 && y.bytes().all(|b| b.is_ascii_digit()))
            .unwrap_or_else(|| format!("{:04}", date.year()));

        let location = first_text(row, &aliases.location).unwrap_or_else(|| NO_ADDRESS.to_string());

        let (coordinate, coordinate_source) = self.locate(row, &mut quality);

        Ok(IncidentRecord {
            id,
            date,
            occu_year,
            location,
            coordinate,
            coordinate_source,
            area,
            cause: first_text(row, &aliases.cause).unwrap_or_else(|| UNKNOWN_CAUSE.to_string()),
            amount,
            casualties: casualties(row, &aliases.casualties),
            source_id: first_text(row, &aliases.source_id),
            city_code: first_text(row, &aliases.city_code),
            district_code: first_text(row, &aliases.district_code),
            quality,
        })
    }

    /// Geographic columns win over planar ones. Unresolved planar pairs
    /// leave the record without a coordinate.
    fn locate(
        &self,
        row: &Value,
        quality: &mut Vec<QualityIssue>,
    ) -> (Option<Coordinate>, CoordinateSource) {
        let aliases = &self.aliases;
        let component = |names: &[String]| parse_coordinate_component(first_present(row, names));

        if let (Some(lat), Some(lng)) = (component(&aliases.latitude), component(&aliases.longitude))
            && let Some(coordinate) = Coordinate::new(lat, lng)
        {
            return (Some(coordinate), CoordinateSource::Geographic);
        }

        if let (Some(x), Some(y)) = (component(&aliases.x), component(&aliases.y)) {
            let resolution = self.resolver.resolve(x, y);
            match (&resolution.status, resolution.resolved_coordinate()) {
                (ResolutionStatus::Resolved { candidate }, Some(coordinate)) => {
                    return (
                        Some(coordinate),
                        CoordinateSource::Projected {
                            candidate: candidate.clone(),
                        },
                    );
                }
                (ResolutionStatus::Unresolved { reason }, _) => {
                    log::debug!("[normalize] Planar pair ({x}, {y}) unresolved: {reason}");
                    quality.push(QualityIssue::ProjectionUnresolved {
                        reason: reason.to_string(),
                    });
                }
                (ResolutionStatus::Resolved { .. }, None) => {}
            }
        }

        (None, CoordinateSource::Missing)
    }
}

/// A casualty column that exists with a non-null value yields `Some`, even
/// when blank.
fn casualties(row: &Value, names: &[String]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| row.get(name))
        .find(|v| !v.is_null())
        .map(value_text)
}

/// Records that have an address but still no coordinate.
#[must_use]
pub fn needs_geocode(records: &[IncidentRecord]) -> Vec<&IncidentRecord> {
    records
        .iter()
        .filter(|r| !r.is_mappable() && has_address(&r.location))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    fn normalizer() -> Normalizer {
        Normalizer::default()
    }

    #[test]
    fn spreadsheet_row_with_korean_headers() {
        let rows = vec![json!({
            "발생일자": "2024.03.15",
            "위치": "경북 안동시 풍천면",
            "면적": "12.5",
            "원인": "입산자실화",
            "피해액": 1_500_000,
        })];
        let batch = normalizer().normalize(&rows, "import", today());

        assert_eq!(batch.records.len(), 1);
        let record = &batch.records[0];
        assert_eq!(record.id, "import-1");
        assert_eq!(record.date.to_string(), "2024-03-15");
        assert_eq!(record.occu_year, "2024");
        assert_eq!(record.location, "경북 안동시 풍천면");
        assert!((record.area - 12.5).abs() < f64::EPSILON);
        assert!((record.amount - 1_500_000.0).abs() < f64::EPSILON);
        assert_eq!(record.cause, "입산자실화");
        assert_eq!(record.casualties, None);
        assert!(record.quality.is_empty());
        assert_eq!(batch.pending_geocode, vec!["import-1".to_string()]);
    }

    #[test]
    fn registry_row_prefers_road_address_and_resolves_planar() {
        let rows = vec![json!({
            "OBJT_ID": "1001",
            "OCCU_DATE": "20240115",
            "OCCU_YEAR": "2024",
            "RN_ADRES": "대구광역시 동구 팔공산로",
            "ADRES": "대구광역시 동구 용수동",
            "AR": "0.3",
            "RESN": "담뱃불실화",
            "X": "1099392.05",
            "Y": "1756509.03",
            "CTPRVN_CD": "27",
            "SGG_CD": "27140",
        })];
        let batch = normalizer().normalize(&rows, "registry", today());
        let record = &batch.records[0];

        assert_eq!(record.location, "대구광역시 동구 팔공산로");
        assert_eq!(record.source_id.as_deref(), Some("1001"));
        assert_eq!(record.city_code.as_deref(), Some("27"));
        assert_eq!(record.district_code.as_deref(), Some("27140"));
        assert_eq!(
            record.coordinate_source,
            CoordinateSource::Projected {
                candidate: "EPSG:5179".to_string()
            }
        );
        let coordinate = record.coordinate.unwrap();
        assert!((coordinate.latitude() - 35.8).abs() < 1e-6);
        assert!((coordinate.longitude() - 128.6).abs() < 1e-6);
        assert!(batch.pending_geocode.is_empty());
    }

    #[test]
    fn geographic_columns_win_over_planar() {
        let rows = vec![json!({
            "날짜": "2023-05-05",
            "위도": 36.5,
            "경도": "128.1",
            "X": 1e12,
            "Y": 1e12,
        })];
        let record = &normalizer().normalize(&rows, "t", today()).records[0];
        assert_eq!(record.coordinate_source, CoordinateSource::Geographic);
        assert!(record.quality.is_empty());
    }

    #[test]
    fn unresolved_planar_pair_is_flagged_not_placed() {
        let rows = vec![json!({
            "날짜": "2023-05-05",
            "주소": "강원 삼척시",
            "X": 1e12,
            "Y": 1e12,
        })];
        let batch = normalizer().normalize(&rows, "t", today());
        let record = &batch.records[0];

        assert_eq!(record.coordinate, None);
        assert_eq!(record.coordinate_source, CoordinateSource::Missing);
        assert!(matches!(
            record.quality[0],
            QualityIssue::ProjectionUnresolved { .. }
        ));
        assert_eq!(batch.pending_geocode, vec!["t-1".to_string()]);
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let rows = vec![json!({ "DATE": "2024-01-01", "LOCATION": "null" })];
        let batch = normalizer().normalize(&rows, "t", today());
        let record = &batch.records[0];

        assert_eq!(record.location, NO_ADDRESS);
        assert_eq!(record.cause, UNKNOWN_CAUSE);
        assert!(record.area.abs() < f64::EPSILON);
        assert!(record.amount.abs() < f64::EPSILON);
        assert!(batch.pending_geocode.is_empty());
    }

    #[test]
    fn unrecognized_date_falls_back_to_today_and_is_flagged() {
        let rows = vec![json!({ "DATE": "garbage" })];
        let record = &normalizer().normalize(&rows, "t", today()).records[0];

        assert_eq!(record.date, today());
        assert_eq!(record.occu_year, "2026");
        assert_eq!(
            record.quality,
            vec![QualityIssue::DateFallback {
                raw: "garbage".to_string()
            }]
        );
    }

    #[test]
    fn missing_date_falls_back_with_empty_raw() {
        let record = &normalizer().normalize(&[json!({})], "t", today()).records[0];
        assert_eq!(
            record.quality,
            vec![QualityIssue::DateFallback { raw: String::new() }]
        );
    }

    #[test]
    fn impossible_date_rejects_the_row() {
        let rows = vec![json!({ "DATE": "2024-02-30" }), json!({ "DATE": "2024-02-29" })];
        let batch = normalizer().normalize(&rows, "t", today());

        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].id, "t-2");
        assert_eq!(
            batch.rejected,
            vec![RejectedRow {
                row_index: 0,
                reason: RejectReason::InvalidDate {
                    raw: "2024-02-30".to_string()
                },
            }]
        );
    }

    #[test]
    fn every_area_alias_normalizes_identically() {
        let records: Vec<IncidentRecord> = ["면적", "피해면적", "AREA", "AR"]
            .iter()
            .map(|alias| {
                let row = json!({
                    "DATE": "2024-03-15",
                    "LOCATION": "경북 안동시",
                    *alias: "42.5",
                });
                normalizer()
                    .normalize_row(&row, "area".to_string(), today())
                    .unwrap()
            })
            .collect();

        assert!((records[0].area - 42.5).abs() < f64::EPSILON);
        assert!(records[0].quality.is_empty());
        assert!(records.iter().all(|record| *record == records[0]));
    }

    #[test]
    fn coerced_numbers_are_flagged() {
        let rows = vec![json!({ "DATE": "2024-01-01", "AREA": -4, "AMOUNT": "3만원" })];
        let record = &normalizer().normalize(&rows, "t", today()).records[0];

        assert!(record.area.abs() < f64::EPSILON);
        assert!((record.amount - 3.0).abs() < f64::EPSILON);
        assert_eq!(record.quality.len(), 2);
        assert_eq!(
            record.quality[0],
            QualityIssue::NumberCoerced {
                field: "area".to_string(),
                raw: "-4".to_string()
            }
        );
    }

    #[test]
    fn blank_casualty_cell_is_distinct_from_missing() {
        let rows = vec![
            json!({ "DATE": "2024-01-01", "인명피해": "" }),
            json!({ "DATE": "2024-01-01", "인명피해": null }),
        ];
        let batch = normalizer().normalize(&rows, "t", today());
        assert_eq!(batch.records[0].casualties.as_deref(), Some(""));
        assert_eq!(batch.records[1].casualties, None);
    }

    #[test]
    fn year_column_must_be_four_digits() {
        let rows = vec![json!({ "DATE": "2024-01-01", "OCCU_YEAR": "24" })];
        let record = &normalizer().normalize(&rows, "t", today()).records[0];
        assert_eq!(record.occu_year, "2024");
    }

    #[test]
    fn duplicate_source_ids_are_dropped() {
        let rows = vec![
            json!({ "OBJT_ID": 7, "DATE": "2024-01-01" }),
            json!({ "OBJT_ID": "7", "DATE": "2024-01-02" }),
            json!({ "DATE": "2024-01-03" }),
        ];
        let batch = normalizer().normalize(&rows, "t", today());

        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.rejected[0].row_index, 1);
    }

    #[test]
    fn non_object_rows_are_rejected() {
        let batch = normalizer().normalize(&[json!([1, 2])], "t", today());
        assert_eq!(batch.rejected[0].reason, RejectReason::NotAnObject);
    }

    #[test]
    fn needs_geocode_picks_unplaced_addresses() {
        let rows = vec![
            json!({ "DATE": "2024-01-01", "주소": "경남 하동군" }),
            json!({ "DATE": "2024-01-01" }),
            json!({ "DATE": "2024-01-01", "주소": "x", "LAT": 35.0, "LNG": 128.0 }),
        ];
        let batch = normalizer().normalize(&rows, "t", today());
        let pending = needs_geocode(&batch.records);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "t-1");
    }
}
