#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Planar-to-geographic coordinate resolution for wildfire records.
//!
//! Registry and spreadsheet rows carry X/Y values in one of several Korean
//! grid systems without saying which. [`ProjectionResolver`] tries each
//! candidate in [`ProjectionConfig`] order and accepts the first result that
//! lands inside the validation bounding box (roughly 33-43°N,
//! 124-132°E).
//!
//! Resolution is pure: nothing is logged, and every attempt is reported
//! back in [`Resolution::attempts`] so callers can audit which candidates
//! were tried. When nothing fits, the configured fallback centroid is
//! returned with [`ResolutionStatus::Unresolved`]. That placeholder is not a
//! real location and must not be presented as one.
//!
//! Projections are implemented directly (transverse Mercator series and a
//! Helmert datum shift) in [`tmerc`] and [`datum`].

pub mod candidates;
pub mod datum;
pub mod ellipsoid;
pub mod tmerc;

use serde::Serialize;
use thiserror::Error;
use wildfire_map_incident_models::Coordinate;

pub use candidates::{BoundingBox, CandidateProjection, LinearUnit, ProjectionConfig};

/// Errors from projection configuration and transforms.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// A candidate transform produced NaN or infinity.
    #[error("Candidate {candidate} produced a non-finite result")]
    NonFiniteResult {
        /// Id of the failing candidate.
        candidate: String,
    },

    /// The candidate table is inconsistent.
    #[error("Invalid projection config: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },

    /// Reading a candidate table failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A candidate table is not valid TOML.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Why a pair could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UnresolvedReason {
    /// X or Y was NaN or infinite. No candidate was tried.
    InvalidInput,
    /// Every enabled candidate failed or landed outside the bounding box.
    NoCandidateInBounds,
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput => f.write_str("coordinate input is not finite"),
            Self::NoCandidateInBounds => f.write_str("no candidate projection fits the bounds"),
        }
    }
}

/// Outcome of a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ResolutionStatus {
    /// A candidate produced an in-bounds coordinate.
    Resolved {
        /// Id of the winning candidate.
        candidate: String,
    },
    /// The coordinate is the fallback centroid.
    Unresolved {
        /// Why resolution failed.
        reason: UnresolvedReason,
    },
}

/// What happened when one candidate was tried.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum AttemptOutcome {
    /// The result was inside the bounding box and was accepted.
    Inside,
    /// The result was finite but outside the bounding box.
    OutsideBounds {
        /// Computed latitude.
        latitude: f64,
        /// Computed longitude.
        longitude: f64,
    },
    /// The transform failed.
    TransformFailed {
        /// Error text.
        message: String,
    },
}

/// One entry of a resolution's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateAttempt {
    /// Candidate id.
    pub candidate: String,
    /// What the candidate produced.
    pub outcome: AttemptOutcome,
}

/// Result of [`ProjectionResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    /// The resolved coordinate, or the fallback centroid when unresolved.
    pub coordinate: Coordinate,
    /// Whether [`Self::coordinate`] is real.
    pub status: ResolutionStatus,
    /// Candidates tried, in order. Stops at the first accepted candidate.
    pub attempts: Vec<CandidateAttempt>,
}

impl Resolution {
    /// Whether a candidate produced the coordinate.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self.status, ResolutionStatus::Resolved { .. })
    }

    /// The winning candidate's id, if any.
    #[must_use]
    pub fn candidate(&self) -> Option<&str> {
        match &self.status {
            ResolutionStatus::Resolved { candidate } => Some(candidate),
            ResolutionStatus::Unresolved { .. } => None,
        }
    }

    /// The coordinate only when it was actually resolved.
    #[must_use]
    pub const fn resolved_coordinate(&self) -> Option<Coordinate> {
        if self.is_resolved() {
            Some(self.coordinate)
        } else {
            None
        }
    }
}

/// First-match-wins resolver over an ordered candidate table.
#[derive(Debug, Clone)]
pub struct ProjectionResolver {
    candidates: Vec<CandidateProjection>,
    bounds: BoundingBox,
    fallback: Coordinate,
}

impl Default for ProjectionResolver {
    fn default() -> Self {
        Self::new(ProjectionConfig::embedded())
            .unwrap_or_else(|e| panic!("Embedded projection table is invalid: {e}"))
    }
}

impl ProjectionResolver {
    /// Builds a resolver from a table. Disabled candidates are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Config`] if the fallback point is not a
    /// valid coordinate.
    pub fn new(config: ProjectionConfig) -> Result<Self, ProjectionError> {
        let fallback = Coordinate::new(config.fallback.latitude, config.fallback.longitude)
            .ok_or_else(|| ProjectionError::Config {
                message: "fallback point is not a valid coordinate".to_string(),
            })?;
        Ok(Self {
            candidates: config.candidates.into_iter().filter(|c| c.enabled).collect(),
            bounds: config.bounds,
            fallback,
        })
    }

    /// Active candidates in priority order.
    #[must_use]
    pub fn candidates(&self) -> &[CandidateProjection] {
        &self.candidates
    }

    /// The validation rectangle.
    #[must_use]
    pub const fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// The placeholder returned for unresolved input.
    #[must_use]
    pub const fn fallback(&self) -> Coordinate {
        self.fallback
    }

    /// Resolves a planar pair to WGS84.
    #[must_use]
    pub fn resolve(&self, x: f64, y: f64) -> Resolution {
        if !(x.is_finite() && y.is_finite()) {
            return self.unresolved(UnresolvedReason::InvalidInput, Vec::new());
        }

        let mut attempts = Vec::with_capacity(self.candidates.len());
        for candidate in &self.candidates {
            match candidate.to_geographic(x, y) {
                Ok((latitude, longitude)) if self.bounds.contains(latitude, longitude) => {
                    // In-bounds implies in-range, but guard against a box
                    // configured wider than the globe.
                    if let Some(coordinate) = Coordinate::new(latitude, longitude) {
                        attempts.push(CandidateAttempt {
                            candidate: candidate.id.clone(),
                            outcome: AttemptOutcome::Inside,
                        });
                        return Resolution {
                            coordinate,
                            status: ResolutionStatus::Resolved {
                                candidate: candidate.id.clone(),
                            },
                            attempts,
                        };
                    }
                    attempts.push(CandidateAttempt {
                        candidate: candidate.id.clone(),
                        outcome: AttemptOutcome::OutsideBounds {
                            latitude,
                            longitude,
                        },
                    });
                }
                Ok((latitude, longitude)) => attempts.push(CandidateAttempt {
                    candidate: candidate.id.clone(),
                    outcome: AttemptOutcome::OutsideBounds {
                        latitude,
                        longitude,
                    },
                }),
                Err(e) => attempts.push(CandidateAttempt {
                    candidate: candidate.id.clone(),
                    outcome: AttemptOutcome::TransformFailed {
                        message: e.to_string(),
                    },
                }),
            }
        }

        self.unresolved(UnresolvedReason::NoCandidateInBounds, attempts)
    }

    /// Resolves many pairs, preserving order.
    #[must_use]
    pub fn resolve_batch(&self, pairs: &[(f64, f64)]) -> Vec<Resolution> {
        pairs.iter().map(|&(x, y)| self.resolve(x, y)).collect()
    }

    /// Projects a WGS84 point through a specific candidate. Useful for
    /// checking a new table row against known points.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Config`] if no active candidate has that
    /// id, or the transform error otherwise.
    pub fn forward(
        &self,
        candidate_id: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<(f64, f64), ProjectionError> {
        let candidate = self
            .candidates
            .iter()
            .find(|c| c.id == candidate_id)
            .ok_or_else(|| ProjectionError::Config {
                message: format!("unknown candidate '{candidate_id}'"),
            })?;
        candidate.from_geographic(latitude, longitude)
    }

    fn unresolved(
        &self,
        reason: UnresolvedReason,
        attempts: Vec<CandidateAttempt>,
    ) -> Resolution {
        Resolution {
            coordinate: self.fallback,
            status: ResolutionStatus::Unresolved { reason },
            attempts,
        }
    }
}
