//! The candidate projection table.
//!
//! The default table is embedded from `candidates.toml` at compile time.
//! Operators can supply a replacement file with the same layout through
//! [`ProjectionConfig::load`].

use std::path::Path;

use serde::Deserialize;

use crate::ProjectionError;
use crate::datum::Helmert;
use crate::ellipsoid::Ellipsoid;
use crate::tmerc::TransverseMercator;

const EMBEDDED_CANDIDATES: &str = include_str!("../candidates.toml");

/// Linear unit of a candidate's planar coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum LinearUnit {
    /// Metres.
    #[default]
    #[serde(rename = "m")]
    Metre,
    /// Centimetres.
    #[serde(rename = "cm")]
    Centimetre,
}

impl LinearUnit {
    /// Multiplier converting this unit to metres.
    #[must_use]
    pub const fn to_metres(self) -> f64 {
        match self {
            Self::Metre => 1.0,
            Self::Centimetre => 0.01,
        }
    }
}

/// One candidate coordinate system: a transverse Mercator grid with an
/// optional datum shift to WGS84.
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateProjection {
    /// Identifier reported back in resolutions (e.g., `"EPSG:5179"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Disabled candidates are skipped.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Latitude of origin in degrees.
    pub latitude_of_origin: f64,
    /// Central meridian in degrees.
    pub central_meridian: f64,
    /// Scale factor on the central meridian.
    pub scale_factor: f64,
    /// False easting in metres.
    pub false_easting: f64,
    /// False northing in metres.
    pub false_northing: f64,
    /// Reference ellipsoid.
    pub ellipsoid: Ellipsoid,
    /// Unit of the planar input values.
    #[serde(default)]
    pub units: LinearUnit,
    /// Helmert parameters to WGS84. Absent means the datum is treated as
    /// WGS84-compatible.
    #[serde(default)]
    pub to_wgs84: Option<Helmert>,
}

const fn default_true() -> bool {
    true
}

impl CandidateProjection {
    fn grid(&self) -> TransverseMercator {
        TransverseMercator::new(
            self.ellipsoid,
            self.latitude_of_origin,
            self.central_meridian,
            self.scale_factor,
            self.false_easting,
            self.false_northing,
        )
    }

    /// Converts a planar pair in this candidate's units to WGS84
    /// latitude/longitude in degrees.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::NonFiniteResult`] if the transform
    /// produces NaN or infinity.
    pub fn to_geographic(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        let unit = self.units.to_metres();
        let grid = self.grid();
        let (mut phi, mut lam) = grid.inverse(x * unit, y * unit);
        if let Some(helmert) = &self.to_wgs84 {
            (phi, lam) = helmert.shift(grid.ellipsoid(), Ellipsoid::Wgs84, phi, lam);
        }
        let (lat, lon) = (phi.to_degrees(), lam.to_degrees());
        if lat.is_finite() && lon.is_finite() {
            Ok((lat, lon))
        } else {
            Err(ProjectionError::NonFiniteResult {
                candidate: self.id.clone(),
            })
        }
    }

    /// Projects WGS84 latitude/longitude in degrees into this candidate's
    /// planar coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::NonFiniteResult`] if the transform
    /// produces NaN or infinity.
    pub fn from_geographic(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<(f64, f64), ProjectionError> {
        let grid = self.grid();
        let (mut phi, mut lam) = (latitude.to_radians(), longitude.to_radians());
        if let Some(helmert) = &self.to_wgs84 {
            (phi, lam) = helmert
                .reversed()
                .shift(Ellipsoid::Wgs84, grid.ellipsoid(), phi, lam);
        }
        let (x, y) = grid.forward(phi, lam);
        let unit = self.units.to_metres();
        let (x, y) = (x / unit, y / unit);
        if x.is_finite() && y.is_finite() {
            Ok((x, y))
        } else {
            Err(ProjectionError::NonFiniteResult {
                candidate: self.id.clone(),
            })
        }
    }
}

/// Inclusive latitude/longitude rectangle used to validate a candidate's
/// output.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BoundingBox {
    /// Southern edge in degrees.
    pub min_latitude: f64,
    /// Northern edge in degrees.
    pub max_latitude: f64,
    /// Western edge in degrees.
    pub min_longitude: f64,
    /// Eastern edge in degrees.
    pub max_longitude: f64,
}

impl BoundingBox {
    /// Whether the point lies inside the box, edges included.
    #[must_use]
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&latitude)
            && (self.min_longitude..=self.max_longitude).contains(&longitude)
    }
}

/// Fallback coordinate as written in TOML.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FallbackPoint {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// A complete resolver configuration: validation box, fallback, and the
/// ordered candidate list.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectionConfig {
    /// Validation rectangle.
    pub bounds: BoundingBox,
    /// Placeholder coordinate for unresolved input.
    pub fallback: FallbackPoint,
    /// Candidates in priority order.
    pub candidates: Vec<CandidateProjection>,
}

impl ProjectionConfig {
    /// Returns the compiled-in default table.
    ///
    /// # Panics
    ///
    /// Panics if the embedded `candidates.toml` is malformed (a build-time
    /// guarantee since the file is embedded).
    #[must_use]
    pub fn embedded() -> Self {
        Self::from_toml_str(EMBEDDED_CANDIDATES)
            .unwrap_or_else(|e| panic!("Failed to parse embedded candidates.toml: {e}"))
    }

    /// Parses a table from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError`] if the TOML is malformed or the table
    /// fails validation (duplicate ids, inverted bounds, out-of-range
    /// fallback).
    pub fn from_toml_str(text: &str) -> Result<Self, ProjectionError> {
        let config: Self = toml::de::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a table from a file.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ProjectionError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ProjectionError> {
        let b = &self.bounds;
        if !(b.min_latitude <= b.max_latitude && b.min_longitude <= b.max_longitude) {
            return Err(ProjectionError::Config {
                message: "bounding box minimum exceeds maximum".to_string(),
            });
        }
        let mut seen = std::collections::BTreeSet::new();
        for candidate in &self.candidates {
            if !seen.insert(candidate.id.as_str()) {
                return Err(ProjectionError::Config {
                    message: format!("duplicate candidate id '{}'", candidate.id),
                });
            }
            if !(candidate.scale_factor.is_finite() && candidate.scale_factor > 0.0) {
                return Err(ProjectionError::Config {
                    message: format!("candidate '{}' has invalid scale factor", candidate.id),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn embedded_table_keeps_priority_order() {
        let config = ProjectionConfig::embedded();
        let ids: Vec<&str> = config.candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "CUSTOM:KFS_ADJUSTED",
                "CUSTOM:KFS1",
                "CUSTOM:KFS2",
                "EPSG:5179-CM",
                "EPSG:5179",
                "EPSG:5186",
                "EPSG:5174",
            ]
        );
        assert!(config.candidates.iter().all(|c| c.enabled));
    }

    #[test]
    fn only_legacy_datum_carries_a_shift() {
        let config = ProjectionConfig::embedded();
        for candidate in &config.candidates {
            assert_eq!(
                candidate.to_wgs84.is_some(),
                candidate.id == "EPSG:5174",
                "{}",
                candidate.id
            );
        }
    }

    #[test]
    fn centimetre_candidate_scales_input() {
        let config = ProjectionConfig::embedded();
        let cm = config
            .candidates
            .iter()
            .find(|c| c.id == "EPSG:5179-CM")
            .unwrap();
        assert_eq!(cm.units, LinearUnit::Centimetre);
        let (lat, lon) = cm
            .to_geographic(995_580_481.634_138_1, 1_994_464_371.578_106_6)
            .unwrap();
        assert!((lat - 37.5).abs() < 1e-7);
        assert!((lon - 127.0).abs() < 1e-7);
    }

    #[test]
    fn forward_then_inverse_through_datum_shift() {
        let config = ProjectionConfig::embedded();
        let legacy = config
            .candidates
            .iter()
            .find(|c| c.id == "EPSG:5174")
            .unwrap();
        let (x, y) = legacy.from_geographic(36.2, 127.8).unwrap();
        let (lat, lon) = legacy.to_geographic(x, y).unwrap();
        assert!((lat - 36.2).abs() < 1e-6);
        assert!((lon - 127.8).abs() < 1e-6);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let text = r#"
            [bounds]
            min_latitude = 0.0
            max_latitude = 1.0
            min_longitude = 0.0
            max_longitude = 1.0

            [fallback]
            latitude = 0.5
            longitude = 0.5

            [[candidates]]
            id = "A"
            name = "a"
            latitude_of_origin = 0.0
            central_meridian = 0.0
            scale_factor = 1.0
            false_easting = 0.0
            false_northing = 0.0
            ellipsoid = "grs80"

            [[candidates]]
            id = "A"
            name = "a again"
            latitude_of_origin = 0.0
            central_meridian = 0.0
            scale_factor = 1.0
            false_easting = 0.0
            false_northing = 0.0
            ellipsoid = "wgs84"
        "#;
        let err = ProjectionConfig::from_toml_str(text).unwrap_err();
        assert!(matches!(err, ProjectionError::Config { .. }));
    }

    #[test]
    fn loads_table_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EMBEDDED_CANDIDATES.as_bytes()).unwrap();
        let config = ProjectionConfig::load(file.path()).unwrap();
        assert_eq!(config.candidates.len(), 7);
    }
}
