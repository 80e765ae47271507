//! Column alias table and field extraction helpers.
//!
//! Source rows are JSON objects whose keys are whatever the spreadsheet or
//! API called them. [`ColumnAliases`] lists, per canonical field, the keys
//! to try in order.

use std::path::Path;

use serde::Deserialize;

use crate::SourceError;

const EMBEDDED_COLUMNS: &str = include_str!("../columns.toml");

/// Alternate column names per canonical field, in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnAliases {
    /// Occurrence date.
    pub date: Vec<String>,
    /// Address or place name.
    pub location: Vec<String>,
    /// Damaged area (ha).
    pub area: Vec<String>,
    /// Cause text.
    pub cause: Vec<String>,
    /// Damage amount.
    pub amount: Vec<String>,
    /// Casualty note.
    pub casualties: Vec<String>,
    /// Occurrence year.
    pub year: Vec<String>,
    /// Identifier in the originating system.
    pub source_id: Vec<String>,
    /// Planar X (easting).
    pub x: Vec<String>,
    /// Planar Y (northing).
    pub y: Vec<String>,
    /// WGS84 latitude.
    pub latitude: Vec<String>,
    /// WGS84 longitude.
    pub longitude: Vec<String>,
    /// Province code.
    pub city_code: Vec<String>,
    /// District code.
    pub district_code: Vec<String>,
}

impl Default for ColumnAliases {
    fn default() -> Self {
        Self::embedded()
    }
}

impl ColumnAliases {
    /// Returns the compiled-in alias table.
    ///
    /// # Panics
    ///
    /// Panics if the embedded `columns.toml` is malformed (a build-time
    /// guarantee since the file is embedded).
    #[must_use]
    pub fn embedded() -> Self {
        Self::from_toml_str(EMBEDDED_COLUMNS)
            .unwrap_or_else(|e| panic!("Failed to parse embedded columns.toml: {e}"))
    }

    /// Parses an alias table from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Toml`] if the text is malformed.
    pub fn from_toml_str(text: &str) -> Result<Self, SourceError> {
        Ok(toml::de::from_str(text)?)
    }

    /// Reads an alias table from a file.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }
}

/// Whether a cell carries a value: not missing, not JSON null, and for
/// strings not blank and not the literal `"null"`.
#[must_use]
pub fn is_present(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::String(s) => {
            let s = s.trim();
            !s.is_empty() && s != "null"
        }
        _ => true,
    }
}

/// Returns the first present value among `names`.
#[must_use]
pub fn first_present<'a>(
    record: &'a serde_json::Value,
    names: &[String],
) -> Option<&'a serde_json::Value> {
    names
        .iter()
        .filter_map(|name| record.get(name))
        .find(|v| is_present(v))
}

/// Returns the first present value among `names` rendered as trimmed text.
#[must_use]
pub fn first_text(record: &serde_json::Value, names: &[String]) -> Option<String> {
    first_present(record, names).map(value_text)
}

/// Renders a cell as text: strings are trimmed, numbers use their JSON
/// form (integers without a trailing `.0`).
#[must_use]
pub fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
