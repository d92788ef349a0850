//! Composition of geodetic placements with topocentric rotations.
//!
//! A geodetically placed frame is related to ECEF by two legs: the
//! topocentric North-East-Down rotation at its position, and its own
//! orientation within that local triad. These helpers build the
//! frame→ECEF map from a [`GeodeticPose`] and recover a [`GeodeticPose`]
//! from an arbitrary frame→ECEF map.

use geopose_earth::Ellipsoid;
use geopose_types::{GeodeticPose, NauticalAngles};

use crate::transform::Transform;

/// The frame→ECEF map of a frame sitting at `pose`: translate to the ECEF
/// position, rotate by the frame's orientation within the local
/// North-East-Down triad, then by the triad itself.
pub fn geodetic_transform(ellipsoid: &dyn Ellipsoid, pose: &GeodeticPose) -> Transform {
    let origin = ellipsoid.to_ecef(&pose.position);
    let rotation = ellipsoid.topocentric_rotation(&pose.position) * pose.orientation.to_rotation();
    Transform::from_parts(origin, rotation)
}

/// Recovers the geodetic placement of a frame from its frame→ECEF map.
///
/// `None` when the ECEF origin is geodetically degenerate (geocenter
/// neighborhood).
pub fn transform_to_geodetic(
    ellipsoid: &dyn Ellipsoid,
    to_ecef: &Transform,
) -> Option<GeodeticPose> {
    let position = ellipsoid.from_ecef(&to_ecef.translation())?;
    let local = ellipsoid.topocentric_rotation(&position).inverse() * to_ecef.rotation();
    Some(GeodeticPose::new(
        position,
        NauticalAngles::from_rotation(&local),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geopose_earth::ReferenceEllipsoid;
    use geopose_types::GeodeticPoint;
    use nalgebra::Vector3;

    const WGS84: ReferenceEllipsoid = ReferenceEllipsoid::WGS84;

    #[test]
    fn placement_roundtrip() {
        let pose = GeodeticPose::new(
            GeodeticPoint::from_degrees(37.23, -115.80, 1360.0),
            NauticalAngles::new(0.1, -0.2, 0.3),
        );
        let map = geodetic_transform(&WGS84, &pose);
        let back = transform_to_geodetic(&WGS84, &map).unwrap();
        assert_relative_eq!(back.position.latitude, pose.position.latitude, epsilon = 1e-9);
        assert_relative_eq!(back.position.longitude, pose.position.longitude, epsilon = 1e-9);
        assert_relative_eq!(back.position.height, pose.position.height, epsilon = 1e-6);
        assert_relative_eq!(back.orientation.roll, 0.1, epsilon = 1e-9);
        assert_relative_eq!(back.orientation.pitch, -0.2, epsilon = 1e-9);
        assert_relative_eq!(back.orientation.yaw, 0.3, epsilon = 1e-9);
    }

    #[test]
    fn identity_orientation_aligns_the_frame_with_ned() {
        // At the equator / prime meridian the local north is ECEF +z.
        let pose = GeodeticPose::new(GeodeticPoint::new(0.0, 0.0, 0.0), NauticalAngles::IDENTITY);
        let map = geodetic_transform(&WGS84, &pose);
        let north = map.rotation().transform_vector(&Vector3::x());
        assert_relative_eq!(north, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn degenerate_origin_yields_none() {
        let map = Transform::identity();
        assert!(transform_to_geodetic(&WGS84, &map).is_none());
    }
}
