//! Transverse Mercator projection on an ellipsoid.
//!
//! Series expansions after Snyder, *Map Projections: A Working Manual*
//! (USGS PP 1395), eqs. 8-9 through 8-25. Accurate to well under a
//! millimetre within a few degrees of the central meridian, which covers
//! every Korean grid.

use std::f64::consts::FRAC_PI_2;

use crate::ellipsoid::Ellipsoid;

/// Transverse Mercator parameters with the per-ellipsoid constants
/// precomputed.
#[derive(Debug, Clone, Copy)]
pub struct TransverseMercator {
    ellipsoid: Ellipsoid,
    /// Latitude of origin in radians.
    phi0: f64,
    /// Central meridian in radians.
    lam0: f64,
    /// Scale factor on the central meridian.
    k0: f64,
    /// False easting in metres.
    x0: f64,
    /// False northing in metres.
    y0: f64,
    a: f64,
    e2: f64,
    ep2: f64,
    /// Meridional arc from the equator to `phi0`.
    m0: f64,
}

impl TransverseMercator {
    /// Builds a projection from degrees and metres.
    #[must_use]
    pub fn new(
        ellipsoid: Ellipsoid,
        latitude_of_origin: f64,
        central_meridian: f64,
        scale_factor: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        let a = ellipsoid.semi_major_axis();
        let e2 = ellipsoid.eccentricity_squared();
        let phi0 = latitude_of_origin.to_radians();
        Self {
            ellipsoid,
            phi0,
            lam0: central_meridian.to_radians(),
            k0: scale_factor,
            x0: false_easting,
            y0: false_northing,
            a,
            e2,
            ep2: e2 / (1.0 - e2),
            m0: meridian_arc(a, e2, phi0),
        }
    }

    /// The ellipsoid this projection is defined on.
    #[must_use]
    pub const fn ellipsoid(&self) -> Ellipsoid {
        self.ellipsoid
    }

    /// Projects geodetic latitude/longitude (radians) to easting/northing
    /// in metres.
    #[must_use]
    pub fn forward(&self, phi: f64, lam: f64) -> (f64, f64) {
        let (sin_phi, cos_phi) = phi.sin_cos();
        let n = self.a / (1.0 - self.e2 * sin_phi * sin_phi).sqrt();
        let t = phi.tan().powi(2);
        let c = self.ep2 * cos_phi * cos_phi;
        let a = (lam - self.lam0) * cos_phi;
        let m = meridian_arc(self.a, self.e2, phi);

        let x = self.k0
            * n
            * (a + (1.0 - t + c) * a.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * self.ep2) * a.powi(5) / 120.0);
        let y = self.k0
            * (m - self.m0
                + n * phi.tan()
                    * (a * a / 2.0
                        + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                        + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * self.ep2)
                            * a.powi(6)
                            / 720.0));

        (x + self.x0, y + self.y0)
    }

    /// Inverts easting/northing in metres to geodetic latitude/longitude
    /// (radians).
    ///
    /// Inputs far outside the projection's useful zone still produce
    /// numbers; callers validate the result against a bounding box.
    #[must_use]
    pub fn inverse(&self, easting: f64, northing: f64) -> (f64, f64) {
        let x = easting - self.x0;
        let y = northing - self.y0;
        let e2 = self.e2;
        let e4 = e2 * e2;
        let e6 = e4 * e2;

        let m = self.m0 + y / self.k0;
        let mu = m / (self.a * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
        let root = (1.0 - e2).sqrt();
        let e1 = (1.0 - root) / (1.0 + root);

        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        if phi1.abs() >= FRAC_PI_2 {
            return (FRAC_PI_2.copysign(y), self.lam0);
        }

        let (sin1, cos1) = phi1.sin_cos();
        let c1 = self.ep2 * cos1 * cos1;
        let t1 = phi1.tan().powi(2);
        let w = 1.0 - e2 * sin1 * sin1;
        let n1 = self.a / w.sqrt();
        let r1 = self.a * (1.0 - e2) / w.powf(1.5);
        let d = x / (n1 * self.k0);

        let phi = phi1
            - (n1 * phi1.tan() / r1)
                * (d * d / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * self.ep2) * d.powi(4)
                        / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                        - 252.0 * self.ep2
                        - 3.0 * c1 * c1)
                        * d.powi(6)
                        / 720.0);
        let lam = self.lam0
            + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * self.ep2 + 24.0 * t1 * t1)
                    * d.powi(5)
                    / 120.0)
                / cos1;

        (phi, lam)
    }
}

/// Meridional arc length from the equator to latitude `phi` (radians).
fn meridian_arc(a: f64, e2: f64, phi: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    a * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
        - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}
