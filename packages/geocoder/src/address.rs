//! Address cleaning and cache-key normalization.
//!
//! Cache keys are the trimmed address with every run of whitespace
//! collapsed to a single ASCII space. Case is preserved, so `"Seoul"` and
//! `"SEOUL"` are distinct keys. Hangul addresses are unaffected by case
//! anyway, and provider lookups are sent exactly as keyed.

use std::sync::LazyLock;

use regex::Regex;
use wildfire_map_incident_models::NO_ADDRESS;

/// Runs of any Unicode whitespace, including full-width spaces.
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Values that mean "no address" and must never reach a provider.
static SKIP_PATTERNS: &[&str] = &["null", "NULL", "undefined", NO_ADDRESS];

/// Result of cleaning a raw address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanedAddress {
    /// A normalized address suitable for use as a cache key and lookup
    /// query.
    Geocodable(String),
    /// Empty or a known "no address" sentinel.
    NotGeocodable,
}

impl CleanedAddress {
    /// The cache key, if geocodable.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Geocodable(key) => Some(key),
            Self::NotGeocodable => None,
        }
    }
}

/// Cleans an address into its cache key form.
#[must_use]
pub fn clean_address(raw: &str) -> CleanedAddress {
    let collapsed = WHITESPACE_RE.replace_all(raw.trim(), " ");
    if collapsed.is_empty() || SKIP_PATTERNS.iter().any(|p| collapsed == *p) {
        return CleanedAddress::NotGeocodable;
    }
    CleanedAddress::Geocodable(collapsed.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_collapses_whitespace() {
        assert_eq!(
            clean_address("  서울특별시   종로구\t세종대로 ").key(),
            Some("서울특별시 종로구 세종대로")
        );
    }

    #[test]
    fn collapses_full_width_space() {
        assert_eq!(
            clean_address("강원도\u{3000}강릉시").key(),
            Some("강원도 강릉시")
        );
    }

    #[test]
    fn preserves_case() {
        assert_eq!(clean_address("Seoul").key(), Some("Seoul"));
        assert_ne!(clean_address("Seoul"), clean_address("SEOUL"));
    }

    #[test]
    fn skips_sentinels() {
        for raw in ["", "   ", "null", " null ", NO_ADDRESS, "undefined"] {
            assert_eq!(clean_address(raw), CleanedAddress::NotGeocodable, "{raw:?}");
        }
    }
}
