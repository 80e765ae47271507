//! Sorted, paginated table queries.

use std::cmp::Ordering;

use wildfire_map_analytics_models::{
    SortColumn, SortDirection, TABLE_PAGE_SIZE, TablePage, TableQuery,
};
use wildfire_map_incident_models::{IncidentRecord, has_address};

/// Filters, sorts, and pages `records`.
///
/// Sorting is stable, so rows that compare equal keep their input order.
/// A page past the end is clamped to the last page.
#[must_use]
pub fn query_table(records: &[IncidentRecord], query: &TableQuery) -> TablePage {
    let needle = query.search_text.trim().to_lowercase();
    let mut rows: Vec<&IncidentRecord> = records
        .iter()
        .filter(|r| {
            needle.is_empty()
                || (has_address(&r.location) && r.location.to_lowercase().contains(&needle))
        })
        .filter(|r| query.min_area.is_none_or(|min| r.area >= min))
        .filter(|r| query.max_area.is_none_or(|max| r.area <= max))
        .filter(|r| query.cause.as_deref().is_none_or(|cause| r.cause == cause))
        .collect();

    rows.sort_by(|a, b| {
        let ordering = compare(a, b, query.sort);
        match query.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });

    let page_size = if query.page_size == 0 {
        TABLE_PAGE_SIZE
    } else {
        query.page_size
    };
    let total = rows.len();
    let page_count = total.div_ceil(page_size);
    let page = query.page.clamp(1, page_count.max(1));
    let start = (page - 1) * page_size;

    TablePage {
        rows: rows
            .into_iter()
            .skip(start)
            .take(page_size)
            .cloned()
            .collect(),
        total,
        page,
        page_count,
    }
}

fn compare(a: &IncidentRecord, b: &IncidentRecord, column: SortColumn) -> Ordering {
    match column {
        SortColumn::Date => a.date.cmp(&b.date),
        SortColumn::Area => a.area.total_cmp(&b.area),
        SortColumn::Amount => a.amount.total_cmp(&b.amount),
        SortColumn::Location => a.location.cmp(&b.location),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::record;

    fn ids(page: &TablePage) -> Vec<&str> {
        page.rows.iter().map(|r| r.id.as_str()).collect()
    }

    fn sample() -> Vec<IncidentRecord> {
        vec![
            record("1", "2024-03-01", 12.0, "A", "강원 강릉시"),
            record("2", "2024-01-15", 0.4, "B", "경북 안동시"),
            record("3", "2023-11-30", 55.0, "A", "강원 삼척시"),
        ]
    }

    #[test]
    fn default_sort_is_newest_first() {
        let page = query_table(&sample(), &TableQuery::default());
        assert_eq!(ids(&page), vec!["1", "2", "3"]);
        assert_eq!(page.total, 3);
        assert_eq!(page.page_count, 1);
    }

    #[test]
    fn sorts_by_area_ascending() {
        let query = TableQuery {
            sort: SortColumn::Area,
            direction: SortDirection::Asc,
            ..TableQuery::default()
        };
        assert_eq!(ids(&query_table(&sample(), &query)), vec!["2", "1", "3"]);
    }

    #[test]
    fn filters_combine() {
        let query = TableQuery {
            search_text: "강원".to_string(),
            min_area: Some(10.0),
            max_area: Some(50.0),
            cause: Some("A".to_string()),
            ..TableQuery::default()
        };
        let page = query_table(&sample(), &query);
        assert_eq!(ids(&page), vec!["1"]);
        assert_eq!(page.total, 1);
    }

    #[test]
    fn area_bounds_are_inclusive() {
        let query = TableQuery {
            min_area: Some(12.0),
            max_area: Some(55.0),
            ..TableQuery::default()
        };
        assert_eq!(query_table(&sample(), &query).total, 2);
    }

    #[test]
    fn pages_are_twenty_rows_and_clamped() {
        let records: Vec<IncidentRecord> = (1..=45)
            .map(|i| record(&i.to_string(), "2024-01-01", f64::from(i), "A", "x"))
            .collect();

        let query = TableQuery {
            sort: SortColumn::Area,
            direction: SortDirection::Asc,
            page: 3,
            ..TableQuery::default()
        };
        let page = query_table(&records, &query);
        assert_eq!(page.page_count, 3);
        assert_eq!(page.rows.len(), 5);
        assert_eq!(page.rows[0].id, "41");

        let page = query_table(&records, &TableQuery { page: 99, ..query });
        assert_eq!(page.page, 3);
    }

    #[test]
    fn empty_result_is_page_one_of_zero() {
        let query = TableQuery {
            search_text: "nowhere".to_string(),
            ..TableQuery::default()
        };
        let page = query_table(&sample(), &query);
        assert!(page.rows.is_empty());
        assert_eq!(page.page, 1);
        assert_eq!(page.page_count, 0);
    }
}
