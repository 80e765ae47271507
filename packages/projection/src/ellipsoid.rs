//! Reference ellipsoids used by the candidate projections.

use serde::Deserialize;

/// A reference ellipsoid identified by name in `candidates.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ellipsoid {
    /// GRS 1980, used by Korea 2000 and the Forest Service grids.
    Grs80,
    /// Bessel 1841, used by the legacy Korean 1985 (Tokyo) datum.
    Bessel1841,
    /// WGS 84, the target datum of every resolution.
    Wgs84,
}

impl Ellipsoid {
    /// Semi-major axis in metres.
    #[must_use]
    pub const fn semi_major_axis(self) -> f64 {
        match self {
            Self::Grs80 | Self::Wgs84 => 6_378_137.0,
            Self::Bessel1841 => 6_377_397.155,
        }
    }

    /// Inverse flattening.
    #[must_use]
    pub const fn inverse_flattening(self) -> f64 {
        match self {
            Self::Grs80 => 298.257_222_101,
            Self::Wgs84 => 298.257_223_563,
            Self::Bessel1841 => 299.152_812_8,
        }
    }

    /// First eccentricity squared.
    #[must_use]
    pub fn eccentricity_squared(self) -> f64 {
        let f = 1.0 / self.inverse_flattening();
        2.0f64.mul_add(f, -(f * f))
    }

    /// Radius of curvature in the prime vertical at geodetic latitude `phi`
    /// (radians).
    #[must_use]
    pub fn prime_vertical_radius(self, phi: f64) -> f64 {
        let s = phi.sin();
        self.semi_major_axis() / (1.0 - self.eccentricity_squared() * s * s).sqrt()
    }

    /// Converts geodetic latitude/longitude (radians, on the surface) to
    /// earth-centred cartesian metres.
    #[must_use]
    pub fn to_geocentric(self, phi: f64, lam: f64) -> [f64; 3] {
        let n = self.prime_vertical_radius(phi);
        let e2 = self.eccentricity_squared();
        [
            n * phi.cos() * lam.cos(),
            n * phi.cos() * lam.sin(),
            n * (1.0 - e2) * phi.sin(),
        ]
    }

    /// Converts earth-centred cartesian metres back to geodetic
    /// latitude/longitude in radians. Height is discarded.
    #[must_use]
    pub fn from_geocentric(self, xyz: [f64; 3]) -> (f64, f64) {
        let [x, y, z] = xyz;
        let e2 = self.eccentricity_squared();
        let p = x.hypot(y);
        let lam = y.atan2(x);
        let mut phi = z.atan2(p * (1.0 - e2));
        for _ in 0..10 {
            let n = self.prime_vertical_radius(phi);
            let h = p / phi.cos() - n;
            phi = z.atan2(p * (1.0 - e2 * n / (n + h)));
        }
        (phi, lam)
    }
}
