//! Date and number parsing for spreadsheet and registry cells.
//!
//! Cells arrive as [`serde_json::Value`]s because the same row may mix
//! spreadsheet numbers (serial dates, raw floats) with free text.

use std::sync::LazyLock;

use chrono::{Days, NaiveDate};
use regex::Regex;
use serde_json::Value;

/// Largest spreadsheet serial accepted (9999-12-31).
const MAX_SERIAL: f64 = 2_958_465.0;

/// Serial 60 is 1900-02-29, a day that never existed.
const PHANTOM_LEAP_SERIAL: u64 = 60;

/// `YYYY-MM-DD`, `YYYY.MM.DD`, `YYYY/MM/DD` with one- or two-digit month
/// and day, optional spaces, an optional trailing separator, and an
/// optional trailing time part.
static SEPARATED_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})\s*([-./])\s*(\d{1,2})\s*([-./])\s*(\d{1,2})\s*\.?(?:[\sT].*)?$")
        .expect("valid regex")
});

static COMPACT_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})$").expect("valid regex"));

static SERIAL_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}(?:\.\d+)?$").expect("valid regex"));

static NUMBER_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?").expect("valid regex")
});

/// Outcome of parsing a date cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateParse {
    /// A recognized shape naming a real calendar date.
    Parsed(NaiveDate),
    /// A recognized shape naming an impossible date (e.g., `2024-02-30`).
    Invalid,
    /// Not a recognized date shape at all.
    Unrecognized,
}

/// Parses a date cell.
///
/// JSON numbers are spreadsheet serials unless they have eight integer
/// digits, in which case they are read as `YYYYMMDD`.
#[must_use]
pub fn parse_date(value: &Value) -> DateParse {
    match value {
        Value::Number(n) => {
            let Some(f) = n.as_f64() else {
                return DateParse::Unrecognized;
            };
            if (10_000_000.0..100_000_000.0).contains(&f) && f.fract() == 0.0 {
                return parse_date_str(&n.to_string());
            }
            serial_to_date(f)
        }
        Value::String(s) => parse_date_str(s),
        _ => DateParse::Unrecognized,
    }
}

/// Parses a textual date.
#[must_use]
pub fn parse_date_str(s: &str) -> DateParse {
    let s = s.trim();

    if SERIAL_DATE_RE.is_match(s) {
        return s
            .parse::<f64>()
            .map_or(DateParse::Unrecognized, serial_to_date);
    }

    if let Some(caps) = COMPACT_DATE_RE.captures(s) {
        return ymd(&caps[1], &caps[2], &caps[3]);
    }

    if let Some(caps) = SEPARATED_DATE_RE.captures(s)
        && caps[2] == caps[4]
    {
        return ymd(&caps[1], &caps[3], &caps[5]);
    }

    DateParse::Unrecognized
}

fn ymd(year: &str, month: &str, day: &str) -> DateParse {
    let (Ok(year), Ok(month), Ok(day)) = (year.parse(), month.parse(), day.parse()) else {
        return DateParse::Unrecognized;
    };
    NaiveDate::from_ymd_opt(year, month, day).map_or(DateParse::Invalid, DateParse::Parsed)
}

/// Converts a spreadsheet serial in the 1900 date system. The fractional
/// (time-of-day) part is dropped.
#[must_use]
pub fn serial_to_date(serial: f64) -> DateParse {
    if !serial.is_finite() {
        return DateParse::Unrecognized;
    }
    let days = serial.floor();
    if !(1.0..=MAX_SERIAL).contains(&days) {
        return DateParse::Unrecognized;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let days = days as u64;
    if days == PHANTOM_LEAP_SERIAL {
        return DateParse::Unrecognized;
    }

    // Serials after the phantom leap day are offset by one.
    let epoch = if days < PHANTOM_LEAP_SERIAL {
        NaiveDate::from_ymd_opt(1899, 12, 31)
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)
    };
    epoch
        .and_then(|epoch| epoch.checked_add_days(Days::new(days)))
        .map_or(DateParse::Unrecognized, DateParse::Parsed)
}

/// A non-negative number read from a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedNumber {
    /// The value, always finite and `>= 0`.
    pub value: f64,
    /// Whether the raw cell had to be altered to produce `value`.
    pub coerced: bool,
}

impl ParsedNumber {
    const fn exact(value: f64) -> Self {
        Self {
            value,
            coerced: false,
        }
    }

    const fn coerced(value: f64) -> Self {
        Self {
            value,
            coerced: true,
        }
    }
}

/// Parses a non-negative amount (area, damage amount).
///
/// Missing values are `0` and not coerced. Strings drop thousands
/// separators and read the leading decimal prefix, so `"12.5ha"` is `12.5`
/// (coerced). Negative, non-finite, and unparseable values become `0`
/// (coerced).
#[must_use]
pub fn parse_amount(value: Option<&Value>) -> ParsedNumber {
    let raw = match value {
        None | Some(Value::Null) => return ParsedNumber::exact(0.0),
        Some(Value::Number(n)) => {
            return n.as_f64().map_or(ParsedNumber::coerced(0.0), clamp);
        }
        Some(Value::String(s)) => s.trim().replace(',', ""),
        Some(_) => return ParsedNumber::coerced(0.0),
    };
    if raw.is_empty() {
        return ParsedNumber::exact(0.0);
    }

    let Some(prefix) = NUMBER_PREFIX_RE.find(&raw) else {
        return ParsedNumber::coerced(0.0);
    };
    let Ok(parsed) = prefix.as_str().parse::<f64>() else {
        return ParsedNumber::coerced(0.0);
    };
    let number = clamp(parsed);
    if prefix.end() == raw.len() {
        number
    } else {
        ParsedNumber::coerced(number.value)
    }
}

fn clamp(value: f64) -> ParsedNumber {
    if value.is_finite() && value >= 0.0 {
        ParsedNumber::exact(value)
    } else {
        ParsedNumber::coerced(0.0)
    }
}

/// Parses a coordinate component. Returns `None` for missing, unparseable,
/// non-finite, or zero values (zero means "not recorded" in the sources).
#[must_use]
pub fn parse_coordinate_component(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok()?,
        _ => return None,
    };
    (parsed.is_finite() && parsed != 0.0).then_some(parsed)
}
