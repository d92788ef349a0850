//! Local and Earth-relative pose types, the public frame record, and the
//! change-bus variants.

use std::fmt;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::angles::NauticalAngles;

/// A placement in a named parent frame: position in meters plus nautical
/// orientation. Used both as "where a child frame sits in its parent" and
/// as "where some object sits in a frame" for conversion queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3<f64>,
    pub orientation: NauticalAngles,
}

impl Pose {
    pub fn new(position: Vector3<f64>, orientation: NauticalAngles) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// The zero pose: coincident origin, aligned axes.
    pub fn identity() -> Self {
        Self::new(Vector3::zeros(), NauticalAngles::IDENTITY)
    }

    pub fn from_xyz(x: f64, y: f64, z: f64, orientation: NauticalAngles) -> Self {
        Self::new(Vector3::new(x, y, z), orientation)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// A geodetic position: latitude and longitude in radians, height above the
/// reference ellipsoid in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeodeticPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Height above the ellipsoid (HAE), not above mean sea level.
    pub height: f64,
}

impl GeodeticPoint {
    pub const fn new(latitude: f64, longitude: f64, height: f64) -> Self {
        Self {
            latitude,
            longitude,
            height,
        }
    }

    /// Degree-based constructor for external boundaries.
    pub fn from_degrees(latitude: f64, longitude: f64, height: f64) -> Self {
        Self::new(latitude.to_radians(), longitude.to_radians(), height)
    }

    pub fn latitude_degrees(&self) -> f64 {
        self.latitude.to_degrees()
    }

    pub fn longitude_degrees(&self) -> f64 {
        self.longitude.to_degrees()
    }
}

impl fmt::Display for GeodeticPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.6}° {:.6}° {:.2} m",
            self.latitude_degrees(),
            self.longitude_degrees(),
            self.height
        )
    }
}

/// A geodetic placement: position on the ellipsoid plus orientation
/// expressed in the topocentric North-East-Down frame at that position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeodeticPose {
    pub position: GeodeticPoint,
    pub orientation: NauticalAngles,
}

impl GeodeticPose {
    pub const fn new(position: GeodeticPoint, orientation: NauticalAngles) -> Self {
        Self {
            position,
            orientation,
        }
    }
}

/// Public record of a forest node.
///
/// `parent` is `None` only for the reserved root (ECEF body frame); `pose`
/// is `None` while the frame's transform toward its parent is UNKNOWN
/// (a subgraph root awaiting geolocation). `generation` is the engine
/// commit sequence at which this record was last (re)written; two records
/// for the same name with different generations are different frame
/// identities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub name: String,
    pub parent: Option<String>,
    pub pose: Option<Pose>,
    pub generation: u64,
}

impl Frame {
    /// Whether this frame carries a concrete transform toward its parent.
    pub fn is_placed(&self) -> bool {
        self.pose.is_some()
    }

    /// Whether this frame is the reserved forest root.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Variants of the engine's broadcast change stream.
///
/// `create` and geodetic updates emit one [`Change::Created`] per affected
/// frame (the target and every descendant, pre-order); `remove` emits a
/// single [`Change::Removed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Change {
    Created(Frame),
    Removed { name: String },
}

impl Change {
    /// The frame name this change applies to.
    pub fn name(&self) -> &str {
        match self {
            Change::Created(frame) => &frame.name,
            Change::Removed { name } => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_pose_is_zero() {
        let pose = Pose::identity();
        assert_eq!(pose.position, Vector3::zeros());
        assert_eq!(pose.orientation, NauticalAngles::IDENTITY);
    }

    #[test]
    fn geodetic_point_degree_boundary() {
        let point = GeodeticPoint::from_degrees(37.23, -115.80, 1360.0);
        assert_relative_eq!(point.latitude_degrees(), 37.23, epsilon = 1e-9);
        assert_relative_eq!(point.longitude_degrees(), -115.80, epsilon = 1e-9);
        assert_relative_eq!(point.height, 1360.0);
    }

    #[test]
    fn pose_serialization_roundtrip() {
        let pose = Pose::from_xyz(1.0, 2.0, 3.0, NauticalAngles::new(0.1, 0.2, 0.3));
        let json = serde_json::to_string(&pose).unwrap();
        let back: Pose = serde_json::from_str(&json).unwrap();
        assert_eq!(pose, back);
    }

    #[test]
    fn change_serialization_roundtrip() {
        let change = Change::Created(Frame {
            name: "antenna".to_string(),
            parent: Some("platform".to_string()),
            pose: Some(Pose::from_xyz(0.0, 0.0, -2.5, NauticalAngles::IDENTITY)),
            generation: 7,
        });
        let json = serde_json::to_string(&change).unwrap();
        let back: Change = serde_json::from_str(&json).unwrap();
        assert_eq!(change, back);
        assert_eq!(back.name(), "antenna");

        let removed = Change::Removed {
            name: "antenna".to_string(),
        };
        let json = serde_json::to_string(&removed).unwrap();
        let back: Change = serde_json::from_str(&json).unwrap();
        assert_eq!(removed, back);
    }

    #[test]
    fn display_renders_degrees() {
        let point = GeodeticPoint::from_degrees(10.5, -20.25, 3.0);
        let text = point.to_string();
        assert!(text.contains("10.5"));
        assert!(text.contains("-20.25"));
    }
}
