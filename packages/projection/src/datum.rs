//! Seven-parameter Helmert datum shift to WGS84.
//!
//! Uses the position-vector rotation convention, matching the
//! `towgs84=dx,dy,dz,rx,ry,rz,ds` parameters of PROJ definitions:
//! translations in metres, rotations in arc-seconds, scale in ppm.

use serde::Deserialize;

use crate::ellipsoid::Ellipsoid;

const ARC_SECONDS_TO_RADIANS: f64 = std::f64::consts::PI / (180.0 * 3600.0);

/// Helmert transformation parameters from a local datum to WGS84.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "[f64; 7]")]
pub struct Helmert {
    translation: [f64; 3],
    /// Rotations in radians.
    rotation: [f64; 3],
    /// `1 + ds * 1e-6`.
    scale: f64,
}

impl From<[f64; 7]> for Helmert {
    fn from(p: [f64; 7]) -> Self {
        Self {
            translation: [p[0], p[1], p[2]],
            rotation: [
                p[3] * ARC_SECONDS_TO_RADIANS,
                p[4] * ARC_SECONDS_TO_RADIANS,
                p[5] * ARC_SECONDS_TO_RADIANS,
            ],
            scale: 1.0 + p[6] * 1e-6,
        }
    }
}

impl Helmert {
    fn apply(&self, xyz: [f64; 3]) -> [f64; 3] {
        let [x, y, z] = xyz;
        let [rx, ry, rz] = self.rotation;
        let [dx, dy, dz] = self.translation;
        let m = self.scale;
        [
            m * (x - rz * y + ry * z) + dx,
            m * (rz * x + y - rx * z) + dy,
            m * (-ry * x + rx * y + z) + dz,
        ]
    }

    /// The reverse shift (WGS84 to local), using the small-angle
    /// approximation of negated parameters.
    #[must_use]
    pub fn reversed(&self) -> Self {
        let [dx, dy, dz] = self.translation;
        let [rx, ry, rz] = self.rotation;
        Self {
            translation: [-dx, -dy, -dz],
            rotation: [-rx, -ry, -rz],
            scale: 2.0 - self.scale,
        }
    }

    /// Shifts a geodetic position (radians) on `from` to the matching
    /// position on `to`.
    #[must_use]
    pub fn shift(&self, from: Ellipsoid, to: Ellipsoid, phi: f64, lam: f64) -> (f64, f64) {
        let xyz = from.to_geocentric(phi, lam);
        to.from_geocentric(self.apply(xyz))
    }
}
