//! Aggregates consumed by chart collaborators.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use wildfire_map_analytics_models::{CauseCount, MonthlyPoint, Summary, YearlyPoint};
use wildfire_map_incident_models::IncidentRecord;

/// Headline totals. `today` decides which year counts as current.
#[must_use]
pub fn summary<'a>(
    records: impl IntoIterator<Item = &'a IncidentRecord>,
    today: NaiveDate,
) -> Summary {
    let mut summary = Summary::default();
    for record in records {
        summary.total_fires += 1;
        summary.total_area += record.area;
        if record.year() == today.year() {
            summary.current_year_fires += 1;
        }
        *summary.by_cause.entry(record.cause.clone()).or_default() += 1;
    }
    summary
}

/// Count, area, and amount per year, oldest first.
#[must_use]
pub fn yearly_series<'a>(records: impl IntoIterator<Item = &'a IncidentRecord>) -> Vec<YearlyPoint> {
    let mut years: BTreeMap<i32, YearlyPoint> = BTreeMap::new();
    for record in records {
        let point = years.entry(record.year()).or_insert_with(|| YearlyPoint {
            year: record.year(),
            count: 0,
            total_area: 0.0,
            total_amount: 0.0,
        });
        point.count += 1;
        point.total_area += record.area;
        point.total_amount += record.amount;
    }
    years.into_values().collect()
}

/// Count and area per calendar month, always twelve entries.
#[must_use]
pub fn monthly_series<'a>(
    records: impl IntoIterator<Item = &'a IncidentRecord>,
) -> Vec<MonthlyPoint> {
    let mut months: Vec<MonthlyPoint> = (1..=12)
        .map(|month| MonthlyPoint {
            month,
            count: 0,
            total_area: 0.0,
        })
        .collect();
    for record in records {
        // month() is 1-12 by construction
        if let Some(point) = months.get_mut(record.month() as usize - 1) {
            point.count += 1;
            point.total_area += record.area;
        }
    }
    months
}

/// The `limit` most frequent causes, most frequent first. Ties are broken
/// by cause name.
#[must_use]
pub fn top_causes<'a>(
    records: impl IntoIterator<Item = &'a IncidentRecord>,
    limit: usize,
) -> Vec<CauseCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        *counts.entry(record.cause.as_str()).or_default() += 1;
    }

    let mut ranked: Vec<CauseCount> = counts
        .into_iter()
        .map(|(cause, count)| CauseCount {
            cause: cause.to_string(),
            count,
        })
        .collect();
    // Stable sort keeps the name order from the BTreeMap among ties.
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::record;

    fn sample() -> Vec<IncidentRecord> {
        let mut records = vec![
            record("1", "2026-03-10", 2.0, "입산자실화", "a"),
            record("2", "2026-03-20", 3.5, "쓰레기소각", "b"),
            record("3", "2025-04-01", 100.0, "입산자실화", "c"),
            record("4", "2024-12-31", 0.5, "논밭두렁소각", "d"),
        ];
        records[0].amount = 1000.0;
        records[2].amount = 250.0;
        records
    }

    #[test]
    fn summary_totals() {
        let records = sample();
        let today = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        let summary = summary(&records, today);

        assert_eq!(summary.total_fires, 4);
        assert!((summary.total_area - 106.0).abs() < 1e-9);
        assert_eq!(summary.current_year_fires, 2);
        assert_eq!(summary.by_cause["입산자실화"], 2);
    }

    #[test]
    fn yearly_series_is_ascending() {
        let series = yearly_series(&sample());
        let years: Vec<i32> = series.iter().map(|p| p.year).collect();
        assert_eq!(years, vec![2024, 2025, 2026]);
        assert_eq!(series[2].count, 2);
        assert!((series[2].total_amount - 1000.0).abs() < 1e-9);
        assert!((series[1].total_area - 100.0).abs() < 1e-9);
    }

    #[test]
    fn monthly_series_has_twelve_slots() {
        let series = monthly_series(&sample());
        assert_eq!(series.len(), 12);
        assert_eq!(series[2].month, 3);
        assert_eq!(series[2].count, 2);
        assert_eq!(series[0].count, 0);
        assert_eq!(series[11].count, 1);
    }

    #[test]
    fn top_causes_breaks_ties_by_name() {
        let ranked = top_causes(&sample(), 10);
        assert_eq!(ranked[0].cause, "입산자실화");
        assert_eq!(ranked[0].count, 2);
        assert_eq!(ranked[1].cause, "논밭두렁소각");
        assert_eq!(ranked[2].cause, "쓰레기소각");

        assert_eq!(top_causes(&sample(), 1).len(), 1);
    }

    #[test]
    fn empty_input() {
        assert!(yearly_series(&[]).is_empty());
        assert!(top_causes(&[], 10).is_empty());
        assert_eq!(monthly_series(&[]).iter().map(|p| p.count).sum::<usize>(), 0);
    }
}
