#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Canonical wildfire incident types shared by every stage of the pipeline.
//!
//! Spreadsheet imports and registry fetches are both normalized into
//! [`IncidentRecord`]s. Records are value objects: stages that add
//! information (e.g., a geocoded coordinate) produce a new record via
//! [`IncidentRecord::with_coordinate`] instead of mutating in place.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Location text used when a source row has no usable address.
pub const NO_ADDRESS: &str = "주소 정보 없음";

/// Cause text used when a source row has no usable cause.
pub const UNKNOWN_CAUSE: &str = "원인 미상";

/// A validated WGS84 coordinate.
///
/// Construction goes through [`Coordinate::new`], so a `Coordinate` value
/// is always finite with latitude in `[-90, 90]` and longitude in
/// `[-180, 180]`. Deserialization applies the same check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = String;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Self::new(raw.latitude, raw.longitude).ok_or_else(|| {
            format!(
                "coordinate out of range: ({}, {})",
                raw.latitude, raw.longitude
            )
        })
    }
}

impl Coordinate {
    /// Creates a coordinate, returning `None` when either component is
    /// non-finite or out of range.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self {
            latitude,
            longitude,
        })
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Where a record's coordinate came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CoordinateSource {
    /// The source row already carried latitude/longitude columns.
    Geographic,
    /// Planar coordinates converted through a candidate projection.
    Projected {
        /// Identifier of the candidate that produced the coordinate.
        candidate: String,
    },
    /// Address resolved through the geocode cache.
    Geocoded,
    /// No coordinate could be determined.
    Missing,
}

/// A data-quality note attached to a record during normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum QualityIssue {
    /// The date had an unrecognized shape and was replaced with the
    /// processing date.
    DateFallback {
        /// The raw value as it appeared in the source.
        raw: String,
    },
    /// Planar coordinates were present but no candidate projection
    /// produced an in-bounds result.
    ProjectionUnresolved {
        /// Human-readable reason from the resolver.
        reason: String,
    },
    /// A numeric field was negative, non-finite, or had trailing garbage
    /// and was coerced.
    NumberCoerced {
        /// Canonical field name (e.g., `"area"`).
        field: String,
        /// The raw value as it appeared in the source.
        raw: String,
    },
    /// Geocoding was attempted for the address and found nothing.
    GeocodeMiss,
}

/// One wildfire incident in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    /// Session-unique identifier assigned at normalization time.
    pub id: String,
    /// Occurrence date, serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    /// Four-digit occurrence year.
    pub occu_year: String,
    /// Address or place name, or [`NO_ADDRESS`].
    pub location: String,
    /// Resolved coordinate. `None` keeps the record out of map views.
    /// Serialized as flat `latitude`/`longitude` fields, omitted when
    /// absent; an out-of-range pair reads back as `None`.
    #[serde(flatten)]
    pub coordinate: Option<Coordinate>,
    /// Provenance of [`Self::coordinate`].
    pub coordinate_source: CoordinateSource,
    /// Damaged area in hectares, never negative.
    pub area: f64,
    /// Cause text, or [`UNKNOWN_CAUSE`].
    pub cause: String,
    /// Damage amount in the source's currency unit, never negative.
    pub amount: f64,
    /// Free-text casualty note. `None` means the source had no such column
    /// value, which is distinct from an empty note.
    pub casualties: Option<String>,
    /// Identifier from the originating system (e.g., registry `OBJT_ID`).
    pub source_id: Option<String>,
    /// Province code from the registry, if present.
    pub city_code: Option<String>,
    /// District code from the registry, if present.
    pub district_code: Option<String>,
    /// Problems found while normalizing this record.
    pub quality: Vec<QualityIssue>,
}

impl IncidentRecord {
    /// Returns a copy of this record with `coordinate` set and its
    /// provenance recorded.
    #[must_use]
    pub fn with_coordinate(&self, coordinate: Coordinate, source: CoordinateSource) -> Self {
        Self {
            coordinate: Some(coordinate),
            coordinate_source: source,
            ..self.clone()
        }
    }

    /// Returns a copy of this record with an extra quality issue.
    #[must_use]
    pub fn with_issue(&self, issue: QualityIssue) -> Self {
        let mut quality = self.quality.clone();
        quality.push(issue);
        Self {
            quality,
            ..self.clone()
        }
    }

    /// Whether the record can be placed on a map.
    #[must_use]
    pub const fn is_mappable(&self) -> bool {
        self.coordinate.is_some()
    }

    /// Whether the location is a real address rather than [`NO_ADDRESS`].
    #[must_use]
    pub fn has_address(&self) -> bool {
        has_address(&self.location)
    }

    /// Damage area bucket for this record.
    #[must_use]
    pub fn area_bucket(&self) -> AreaBucket {
        AreaBucket::classify(self.area)
    }

    /// Occurrence month (1-12).
    #[must_use]
    pub fn month(&self) -> u32 {
        self.date.month()
    }

    /// Occurrence year, from the date.
    #[must_use]
    pub fn year(&self) -> i32 {
        self.date.year()
    }
}

/// Whether `location` names a real place (not empty, `"null"`, or the
/// [`NO_ADDRESS`] sentinel).
#[must_use]
pub fn has_address(location: &str) -> bool {
    let trimmed = location.trim();
    !(trimmed.is_empty() || trimmed == "null" || trimmed == NO_ADDRESS)
}

/// Damage-area classification used by filters and charts.
///
/// Buckets are half-open and ordered: `<10`, `[10,50)`, `[50,100)`,
/// `[100,1000)`, `>=1000` hectares.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum AreaBucket {
    /// Less than 10 ha.
    VerySmall,
    /// 10 ha up to 50 ha.
    Small,
    /// 50 ha up to 100 ha.
    Medium,
    /// 100 ha up to 1000 ha.
    Large,
    /// 1000 ha and above.
    VeryLarge,
}

impl AreaBucket {
    /// Classifies an area in hectares. Non-finite or negative input lands in
    /// [`Self::VerySmall`].
    #[must_use]
    pub fn classify(area: f64) -> Self {
        if area.is_nan() || area < 10.0 {
            Self::VerySmall
        } else if area < 50.0 {
            Self::Small
        } else if area < 100.0 {
            Self::Medium
        } else if area < 1000.0 {
            Self::Large
        } else {
            Self::VeryLarge
        }
    }

    /// Short range label for display (e.g., `"10-50ha"`).
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::VerySmall => "<10ha",
            Self::Small => "10-50ha",
            Self::Medium => "50-100ha",
            Self::Large => "100-1000ha",
            Self::VeryLarge => ">=1000ha",
        }
    }
}
