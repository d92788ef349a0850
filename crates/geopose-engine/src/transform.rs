//! Rigid affine transforms between coordinate frames.
//!
//! A [`Transform`] is the map taking coordinates of a point expressed in a
//! child frame into the parent frame: rotate by the child's orientation,
//! then add the child origin. Every transform in this engine is fixed in
//! time; composition and inversion are exact isometry algebra.

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use geopose_types::{NauticalAngles, Pose};

/// A rigid child→parent coordinate map (rotation + translation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform(Isometry3<f64>);

impl Transform {
    /// The identity map (coincident frames).
    pub fn identity() -> Self {
        Self(Isometry3::identity())
    }

    /// Builds the map from the child origin (in parent coordinates) and
    /// the active child→parent rotation.
    pub fn from_parts(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self(Isometry3::from_parts(Translation3::from(translation), rotation))
    }

    /// Builds the child→parent map described by a [`Pose`]: rotate by the
    /// pose orientation, then translate by the pose position.
    pub fn from_pose(pose: &Pose) -> Self {
        Self::from_parts(pose.position, pose.orientation.to_rotation())
    }

    /// Recovers the [`Pose`] whose [`Transform::from_pose`] is this map.
    pub fn to_pose(&self) -> Pose {
        Pose::new(
            self.translation(),
            NauticalAngles::from_rotation(&self.rotation()),
        )
    }

    /// Composition `self ∘ inner`: `inner` is applied first. If `inner`
    /// maps A→B and `self` maps B→C, the result maps A→C.
    pub fn compose(&self, inner: &Transform) -> Transform {
        Self(self.0 * inner.0)
    }

    /// The inverse (parent→child) map.
    pub fn inverse(&self) -> Transform {
        Self(self.0.inverse())
    }

    /// Applies the map to a point given in child-frame coordinates.
    pub fn transform_point(&self, point: &Vector3<f64>) -> Vector3<f64> {
        (self.0 * Point3::from(*point)).coords
    }

    /// Applies the map to a full pose given in child-frame coordinates.
    pub fn transform_pose(&self, pose: &Pose) -> Pose {
        self.compose(&Transform::from_pose(pose)).to_pose()
    }

    /// Rotation part (active child→parent).
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        self.0.rotation
    }

    /// Translation part: the child origin in parent coordinates.
    pub fn translation(&self) -> Vector3<f64> {
        self.0.translation.vector
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}
