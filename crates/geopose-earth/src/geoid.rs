//! Geoid contract: the ellipsoid-to-mean-sea-level offset.
//!
//! The engine core never consults the geoid; it exists for the encoding
//! boundary, where altitudes arrive as "above mean sea level" and must be
//! rebased onto the ellipsoid (`HAE = AMSL + undulation`).

use geopose_types::GeodeticPoint;

/// A geoid model: the undulation (meters) of mean sea level above the
/// reference ellipsoid at a point.
pub trait Geoid: Send + Sync {
    /// Undulation in meters at the given latitude/longitude (radians).
    fn undulation(&self, latitude: f64, longitude: f64) -> f64;

    /// Height above the ellipsoid for an AMSL altitude at the point.
    fn hae_from_amsl(&self, latitude: f64, longitude: f64, amsl: f64) -> f64 {
        amsl + self.undulation(latitude, longitude)
    }

    /// AMSL altitude for a height above the ellipsoid at the point.
    fn amsl_from_hae(&self, latitude: f64, longitude: f64, hae: f64) -> f64 {
        hae - self.undulation(latitude, longitude)
    }

    /// Rebases a point's HAE height onto mean sea level.
    fn amsl_of(&self, point: &GeodeticPoint) -> f64 {
        self.amsl_from_hae(point.latitude, point.longitude, point.height)
    }
}

/// A geoid with a uniform undulation. The zero default treats the geoid
/// and the ellipsoid as coincident, which is adequate for engines that
/// only ever speak HAE.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantGeoid {
    pub undulation: f64,
}

impl ConstantGeoid {
    pub const fn new(undulation: f64) -> Self {
        Self { undulation }
    }
}

impl Geoid for ConstantGeoid {
    fn undulation(&self, _latitude: f64, _longitude: f64) -> f64 {
        self.undulation
    }
}
