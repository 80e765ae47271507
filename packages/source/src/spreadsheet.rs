//! Readers that turn tabular files into JSON row objects for the
//! normalizer.
//!
//! CSV files and workbooks use the header row as keys; JSON files must
//! hold an array of objects (or an object with a `rows`/`data` array).
//! Only the first sheet of a workbook is read, and numeric cells stay
//! numbers so date serials survive.

use std::path::Path;

use calamine::{Data, Reader as _};

use crate::SourceError;

const UTF8_BOM: char = '\u{feff}';

/// Reads rows from `path`, picking the format from the file extension.
///
/// # Errors
///
/// Returns [`SourceError::Config`] for unsupported extensions, or the
/// underlying read/parse error.
pub fn read_rows(path: &Path) -> Result<Vec<serde_json::Value>, SourceError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let rows = match extension.as_deref() {
        Some("csv") => read_csv(path)?,
        Some("json") => read_json(path)?,
        Some("xlsx" | "xlsm" | "xls" | "ods") => read_workbook(path)?,
        other => {
            return Err(SourceError::Config {
                message: format!("unsupported input format: {}", other.unwrap_or("(none)")),
            });
        }
    };

    log::info!("[import] Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Reads a CSV file.
///
/// # Errors
///
/// Returns [`SourceError`] if the file cannot be read or parsed.
pub fn read_csv(path: &Path) -> Result<Vec<serde_json::Value>, SourceError> {
    read_csv_str(&std::fs::read_to_string(path)?)
}

/// Parses CSV text. Every cell becomes a trimmed JSON string; short rows
/// are padded with empty strings.
///
/// # Errors
///
/// Returns [`SourceError::Csv`] on malformed input, or
/// [`SourceError::Config`] if there is no header row.
pub fn read_csv_str(text: &str) -> Result<Vec<serde_json::Value>, SourceError> {
    let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(SourceError::Config {
            message: "CSV file contains no header row".to_owned(),
        });
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let mut map = serde_json::Map::new();
        for (i, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let value = record.get(i).unwrap_or("").trim().to_owned();
            map.insert(header.clone(), serde_json::Value::String(value));
        }
        rows.push(serde_json::Value::Object(map));
    }

    Ok(rows)
}

/// Reads the first sheet of a workbook. The first row holds the headers.
///
/// # Errors
///
/// Returns [`SourceError::Workbook`] if the file cannot be opened or
/// parsed, or [`SourceError::Config`] if it has no sheet or no header row.
pub fn read_workbook(path: &Path) -> Result<Vec<serde_json::Value>, SourceError> {
    let mut workbook = calamine::open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| SourceError::Config {
            message: format!("{} has no sheets", path.display()),
        })??;

    let mut sheet_rows = range.rows();
    let headers: Vec<String> = sheet_rows
        .next()
        .map(|row| row.iter().map(|cell| cell_text(cell)).collect())
        .unwrap_or_default();

    if headers.iter().all(String::is_empty) {
        return Err(SourceError::Config {
            message: format!("{} contains no header row", path.display()),
        });
    }

    let mut rows = Vec::new();
    for row in sheet_rows {
        if row.iter().all(|cell| cell_text(cell).is_empty()) {
            continue;
        }

        let mut map = serde_json::Map::new();
        for (i, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let value = row.get(i).map_or_else(
                || serde_json::Value::String(String::new()),
                cell_value,
            );
            map.insert(header.clone(), value);
        }
        rows.push(serde_json::Value::Object(map));
    }

    Ok(rows)
}

/// Converts a workbook cell. Numbers and date-formatted cells become JSON
/// numbers (dates as their serial day count); everything else is text.
fn cell_value(cell: &Data) -> serde_json::Value {
    match cell {
        Data::Int(i) => serde_json::Value::from(*i),
        Data::Float(f) => float_value(*f),
        Data::DateTime(dt) => float_value(dt.as_f64()),
        Data::Bool(b) => serde_json::Value::Bool(*b),
        Data::Error(e) => {
            log::debug!("[import] Cell error {e:?} read as empty");
            serde_json::Value::String(String::new())
        }
        other => serde_json::Value::String(cell_text(other)),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn float_value(f: f64) -> serde_json::Value {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        serde_json::Value::from(f as i64)
    } else {
        serde_json::Number::from_f64(f)
            .map_or_else(|| serde_json::Value::String(String::new()), serde_json::Value::Number)
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_owned(),
        other => other.to_string(),
    }
}

/// Reads a JSON file.
///
/// # Errors
///
/// Returns [`SourceError`] if the file cannot be read or does not hold an
/// array of rows.
pub fn read_json(path: &Path) -> Result<Vec<serde_json::Value>, SourceError> {
    read_json_str(&std::fs::read_to_string(path)?)
}

/// Parses JSON text holding an array of rows, either at the top level or
/// under a `rows` or `data` key.
///
/// # Errors
///
/// Returns [`SourceError::Json`] on malformed JSON, or
/// [`SourceError::Config`] if no row array is found.
pub fn read_json_str(text: &str) -> Result<Vec<serde_json::Value>, SourceError> {
    let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);
    let value: serde_json::Value = serde_json::from_str(text)?;

    match value {
        serde_json::Value::Array(rows) => Ok(rows),
        serde_json::Value::Object(mut map) => ["rows", "data"]
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(serde_json::Value::Array(rows)) => Some(rows),
                _ => None,
            })
            .ok_or_else(|| SourceError::Config {
                message: "JSON input has no row array".to_owned(),
            }),
        _ => Err(SourceError::Config {
            message: "JSON input must be an array of rows".to_owned(),
        }),
    }
}
