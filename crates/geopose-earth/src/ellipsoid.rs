//! Reference ellipsoids and the geodetic ↔ Earth-centered conversions.
//!
//! Positions convert through the surface-normal (n-vector) formulation:
//! geodetic → ECEF scales the normal by the prime-vertical radius, and
//! ECEF → geodetic uses the closed-form Vermeille solution, so no iteration
//! tolerance is involved. Round-tripping a point through both directions
//! reproduces it to well under a millimeter anywhere outside the geocenter
//! neighborhood.

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use geopose_types::GeodeticPoint;

/// The reserved name of the Earth-centered, Earth-fixed body frame.
pub const ECEF_FRAME: &str = "ECEF";

/// An Earth reference ellipsoid.
///
/// The engine depends only on this contract; swapping the ellipsoid (or
/// providing a test double) never touches engine code.
pub trait Ellipsoid: Send + Sync {
    /// Geodetic point → ECEF position in meters.
    fn to_ecef(&self, point: &GeodeticPoint) -> Vector3<f64>;

    /// ECEF position in meters → geodetic point.
    ///
    /// Returns `None` on numeric degeneracy (the geocenter neighborhood,
    /// where latitude and height are undefined).
    fn from_ecef(&self, ecef: &Vector3<f64>) -> Option<GeodeticPoint>;

    /// The active rotation taking topocentric North-East-Down coordinates
    /// at `point` into ECEF coordinates. Its inverse re-expresses ECEF
    /// axes in the local (N, E, D) triad.
    fn topocentric_rotation(&self, point: &GeodeticPoint) -> UnitQuaternion<f64> {
        ned_rotation(point)
    }

    /// Name of the body frame all engine transforms hang off.
    fn body_frame(&self) -> &str {
        ECEF_FRAME
    }
}

/// The NED → ECEF rotation at a geodetic point.
///
/// Column vectors are the unit north, east, and down directions. The trig
/// form stays orthonormal at the poles, where longitude alone picks the
/// horizontal axes.
pub fn ned_rotation(point: &GeodeticPoint) -> UnitQuaternion<f64> {
    let (sin_lat, cos_lat) = point.latitude.sin_cos();
    let (sin_lon, cos_lon) = point.longitude.sin_cos();
    let north = Vector3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat);
    let east = Vector3::new(-sin_lon, cos_lon, 0.0);
    let down = Vector3::new(-cos_lat * cos_lon, -cos_lat * sin_lon, -sin_lat);
    let matrix = Matrix3::from_columns(&[north, east, down]);
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(matrix))
}

/// An ellipsoid of revolution described by its semi-major axis and derived
/// constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEllipsoid {
    equatorial_radius: f64,
    polar_radius: f64,
    eccentricity: f64,
    flattening: f64,
}

impl ReferenceEllipsoid {
    /// World Geodetic System 1984.
    pub const WGS84: ReferenceEllipsoid = ReferenceEllipsoid {
        equatorial_radius: 6_378_137.0,
        polar_radius: 6_356_752.314245179,
        eccentricity: 0.08181919084262157,
        flattening: 0.0033528106647474805,
    };

    /// Geodetic Reference System 1980.
    pub const GRS80: ReferenceEllipsoid = ReferenceEllipsoid {
        equatorial_radius: 6_378_137.0,
        polar_radius: 6_356_752.314140356,
        eccentricity: 0.08181919104281514,
        flattening: 0.003352810681182319,
    };

    /// World Geodetic System 1972.
    pub const WGS72: ReferenceEllipsoid = ReferenceEllipsoid {
        equatorial_radius: 6_378_135.0,
        polar_radius: 6_356_750.520016094,
        eccentricity: 0.08181881066274845,
        flattening: 0.003352779454167505,
    };

    /// Creates an ellipsoid from the semi-major axis (meters) and inverse
    /// flattening.
    pub fn new(equatorial_radius: f64, inverse_flattening: f64) -> Self {
        let a = equatorial_radius;
        let f = 1.0 / inverse_flattening;
        let b = a * (1.0 - f);
        let e = (1.0 - (b * b) / (a * a)).sqrt();
        Self {
            equatorial_radius: a,
            polar_radius: b,
            eccentricity: e,
            flattening: f,
        }
    }

    #[inline]
    pub fn equatorial_radius(&self) -> f64 {
        self.equatorial_radius
    }

    #[inline]
    pub fn polar_radius(&self) -> f64 {
        self.polar_radius
    }

    #[inline]
    pub fn eccentricity(&self) -> f64 {
        self.eccentricity
    }

    #[inline]
    pub fn flattening(&self) -> f64 {
        self.flattening
    }

    /// Unit surface normal (n-vector) at the point.
    fn nvector(point: &GeodeticPoint) -> Vector3<f64> {
        let (sin_lat, cos_lat) = point.latitude.sin_cos();
        let (sin_lon, cos_lon) = point.longitude.sin_cos();
        Vector3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat)
    }
}

impl Ellipsoid for ReferenceEllipsoid {
    fn to_ecef(&self, point: &GeodeticPoint) -> Vector3<f64> {
        let nv = Self::nvector(point);
        let a = self.equatorial_radius;
        let b = self.polar_radius;
        let m = (a * a) / (b * b);
        let n = b / ((nv.x * nv.x * m) + (nv.y * nv.y * m) + (nv.z * nv.z)).sqrt();
        let h = point.height;
        Vector3::new(
            n * m * nv.x + h * nv.x,
            n * m * nv.y + h * nv.y,
            n * nv.z + h * nv.z,
        )
    }

    #[allow(clippy::many_single_char_names)]
    fn from_ecef(&self, ecef: &Vector3<f64>) -> Option<GeodeticPoint> {
        let (px, py, pz) = (ecef.x, ecef.y, ecef.z);
        let e = self.eccentricity;
        let e2 = e * e;
        let e4 = e2 * e2;
        let a = self.equatorial_radius;
        let a2 = a * a;
        let p = (px * px + py * py) / a2;
        let q = ((1.0 - e2) / a2) * (pz * pz);
        let r = (p + q - e4) / 6.0;
        let s = (e4 * p * q) / (4.0 * r * r * r);
        let t = (1.0 + s + (s * (2.0 + s)).sqrt()).powf(1.0 / 3.0);
        let u = r * (1.0 + t + 1.0 / t);
        let v = (u * u + q * e4).sqrt();
        let w = e2 * (u + v - q) / (2.0 * v);
        let k = (u + v + w * w).sqrt() - w;
        let d = k * (px * px + py * py).sqrt() / (k + e2);
        let hypot = (d * d + pz * pz).sqrt();
        let height = ((k + e2 - 1.0) / k) * hypot;

        let scale = 1.0 / hypot;
        let shrink = k / (k + e2);
        let nx = scale * shrink * px;
        let ny = scale * shrink * py;
        let nz = scale * pz;

        let latitude = nz.atan2((nx * nx + ny * ny).sqrt());
        let longitude = ny.atan2(nx);
        if latitude.is_finite() && longitude.is_finite() && height.is_finite() {
            Some(GeodeticPoint::new(latitude, longitude, height))
        } else {
            None
        }
    }
}
