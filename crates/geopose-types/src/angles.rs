//! Nautical angles: intrinsic Tait–Bryan Z-Y′-X″ roll/pitch/yaw.
//!
//! Yaw is applied about z, then pitch about the rotated y′, then roll about
//! the twice-rotated x″. A positive angle is clockwise when looking outward
//! from the origin along the axis, which is the ordinary right-hand-rule
//! rotation. [`NauticalAngles::to_rotation`] produces the active quaternion
//! taking child-frame coordinates into parent-frame coordinates;
//! [`NauticalAngles::from_rotation`] inverts it robustly, including at the
//! pitch poles where roll and yaw collapse into one degree of freedom.

use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::fmt;

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Pole detector threshold on `v2.x² + v2.y²` where `v2` is the rotated
/// x-axis. Equivalent to ~1e-31 on the half-components of the quaternion
/// product, which is known to separate genuine poles from near-pole noise.
const POLE_EPS: f64 = 4.0e-31;

/// Wraps an angle to the canonical interval `(-π, π]`.
pub fn wrap_angle(radians: f64) -> f64 {
    let wrapped = radians.rem_euclid(TAU);
    if wrapped > PI { wrapped - TAU } else { wrapped }
}

/// Intrinsic Z-Y′-X″ roll/pitch/yaw, in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NauticalAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl NauticalAngles {
    /// The zero rotation.
    pub const IDENTITY: NauticalAngles = NauticalAngles {
        roll: 0.0,
        pitch: 0.0,
        yaw: 0.0,
    };

    /// Raw constructor. Angles are taken as-is; use
    /// [`NauticalAngles::normalized`] to map into canonical ranges.
    pub const fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }

    /// Constructor that maps the angles into canonical ranges:
    /// `roll ∈ [-π, π]`, `pitch ∈ [-π/2, π/2]`, `yaw ∈ [-π, π]`.
    ///
    /// A pitch beyond ±π/2 is reflected through the pole (`pitch := π -
    /// pitch` with π added to both roll and yaw), then everything is
    /// re-wrapped. The reflected triple describes the same rotation.
    pub fn normalized(roll: f64, pitch: f64, yaw: f64) -> Self {
        let mut roll = wrap_angle(roll);
        let mut pitch = wrap_angle(pitch);
        let mut yaw = wrap_angle(yaw);
        if pitch.abs() > FRAC_PI_2 {
            pitch = wrap_angle(PI - pitch);
            roll = wrap_angle(roll + PI);
            yaw = wrap_angle(yaw + PI);
        }
        Self { roll, pitch, yaw }
    }

    /// Degree-based constructor for external boundaries.
    pub fn from_degrees(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self::normalized(roll.to_radians(), pitch.to_radians(), yaw.to_radians())
    }

    /// Returns `(roll, pitch, yaw)` in degrees.
    pub fn to_degrees(&self) -> (f64, f64, f64) {
        (
            self.roll.to_degrees(),
            self.pitch.to_degrees(),
            self.yaw.to_degrees(),
        )
    }

    /// The active rotation taking child-frame coordinates into parent-frame
    /// coordinates: `Rz(yaw) · Ry(pitch) · Rx(roll)`.
    ///
    /// The frame-transform operator of the same rotation (parent coordinates
    /// re-expressed in the child frame, built from negated angles in X-Y-Z
    /// order) is exactly the inverse of this quaternion.
    pub fn to_rotation(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_euler_angles(self.roll, self.pitch, self.yaw)
    }

    /// Robust extraction of nautical angles from an active child→parent
    /// rotation.
    ///
    /// `v1` is the parent z-axis seen from the child frame and `v2` the
    /// child x-axis seen from the parent frame; then `pitch = -asin(v2.z)`,
    /// `roll = atan2(v1.y, v1.z)`, `yaw = atan2(v2.y, v2.x)`. When `v2` is
    /// (numerically) parallel to z the rotation sits on a pitch pole: roll
    /// is defined to be zero and yaw absorbs the whole z-rotation via
    /// `yaw = -sign(w·y) · 2 · atan2(x, w)`.
    pub fn from_rotation(rotation: &UnitQuaternion<f64>) -> Self {
        let v1 = rotation.inverse_transform_vector(&Vector3::z());
        let v2 = rotation.transform_vector(&Vector3::x());
        let pitch = -v2.z.clamp(-1.0, 1.0).asin();
        if v2.x * v2.x + v2.y * v2.y <= POLE_EPS {
            // Quaternion components, (w, x, y, z) convention.
            let coords = rotation.quaternion().coords;
            let (x, y, w) = (coords.x, coords.y, coords.w);
            let sign = if (w * y).is_sign_negative() { -1.0 } else { 1.0 };
            let yaw = wrap_angle(-sign * 2.0 * x.atan2(w));
            Self {
                roll: 0.0,
                pitch,
                yaw,
            }
        } else {
            Self {
                roll: v1.y.atan2(v1.z),
                pitch,
                yaw: v2.y.atan2(v2.x),
            }
        }
    }

    /// Whether the pitch sits on a pole (|pitch| = π/2) within `tolerance`.
    pub fn is_gimbal_locked(&self, tolerance: f64) -> bool {
        (self.pitch.abs() - FRAC_PI_2).abs() <= tolerance
    }
}

impl Default for NauticalAngles {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Display for NauticalAngles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (roll, pitch, yaw) = self.to_degrees();
        write!(f, "roll {roll:.3}° pitch {pitch:.3}° yaw {yaw:.3}°")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_4;

    fn angle_eq(a: f64, b: f64, eps: f64) -> bool {
        wrap_angle(a - b).abs() <= eps
    }

    #[test]
    fn wrap_angle_stays_in_half_open_interval() {
        assert_relative_eq!(wrap_angle(PI), PI);
        assert_relative_eq!(wrap_angle(-PI), PI);
        assert_relative_eq!(wrap_angle(3.0 * PI), PI);
        assert_relative_eq!(wrap_angle(TAU + 0.25), 0.25);
        assert_relative_eq!(wrap_angle(-0.25), -0.25);
    }

    #[test]
    fn normalized_reflects_out_of_range_pitch_through_pole() {
        // pitch = 2.0 rad is past the pole; the reflected triple must
        // describe the same rotation and land in canonical ranges.
        let raw = NauticalAngles::new(0.3, 2.0, -0.7);
        let canon = NauticalAngles::normalized(0.3, 2.0, -0.7);
        assert!(canon.pitch.abs() <= FRAC_PI_2);
        assert!(canon.roll.abs() <= PI && canon.yaw.abs() <= PI);
        let a = raw.to_rotation();
        let b = canon.to_rotation();
        assert!(a.angle_to(&b) < 1e-12);
    }

    #[test]
    fn roundtrip_in_canonical_range() {
        // P1: from_rotation(to_rotation(r, p, y)) == (r, p, y) within 1e-7.
        let samples = [-3.0, -1.9, -0.8, 0.0, 0.6, 1.4, 2.9];
        let pitches = [-1.5, -0.9, -0.2, 0.0, 0.4, 1.1, 1.5];
        for &roll in &samples {
            for &pitch in &pitches {
                for &yaw in &samples {
                    let angles = NauticalAngles::new(roll, pitch, yaw);
                    let back = NauticalAngles::from_rotation(&angles.to_rotation());
                    assert!(angle_eq(back.roll, roll, 1e-7), "roll {roll} {pitch} {yaw}");
                    assert!(angle_eq(back.pitch, pitch, 1e-7), "pitch {roll} {pitch} {yaw}");
                    assert!(angle_eq(back.yaw, yaw, 1e-7), "yaw {roll} {pitch} {yaw}");
                }
            }
        }
    }

    #[test]
    fn gimbal_lock_reports_yaw_only() {
        // At |pitch| = π/2 the extraction reports roll = 0 and folds the
        // whole z-rotation into yaw.
        for &yaw in &[0.0, FRAC_PI_4, FRAC_PI_2, PI, 3.0 * FRAC_PI_2] {
            for &pitch in &[FRAC_PI_2, -FRAC_PI_2] {
                let angles = NauticalAngles::new(0.0, pitch, yaw);
                let back = NauticalAngles::from_rotation(&angles.to_rotation());
                assert_eq!(back.roll, 0.0);
                assert!(angle_eq(back.pitch, pitch, 1e-6), "pitch at yaw {yaw}");
                assert!(angle_eq(back.yaw, yaw, 1e-6), "yaw at yaw {yaw}");
            }
        }
    }

    #[test]
    fn gimbal_lock_with_nonzero_roll_preserves_roll_plus_yaw() {
        // On the north pole only pitch and yaw - roll are determined
        // (yaw + roll on the south pole); check the preserved combination.
        let angles = NauticalAngles::new(0.4, FRAC_PI_2, 1.1);
        let back = NauticalAngles::from_rotation(&angles.to_rotation());
        assert_eq!(back.roll, 0.0);
        assert!(angle_eq(back.pitch, FRAC_PI_2, 1e-6));
        assert!(angle_eq(back.yaw, 1.1 - 0.4, 1e-6));
    }

    #[test]
    fn rotation_matches_heading_intuition() {
        // A pure yaw of 90° swings the child x-axis onto the parent y-axis.
        let q = NauticalAngles::new(0.0, 0.0, FRAC_PI_2).to_rotation();
        let x = q.transform_vector(&Vector3::x());
        assert_relative_eq!(x.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(x.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn degrees_roundtrip() {
        let angles = NauticalAngles::from_degrees(10.0, -20.0, 30.0);
        let (roll, pitch, yaw) = angles.to_degrees();
        assert_relative_eq!(roll, 10.0, epsilon = 1e-9);
        assert_relative_eq!(pitch, -20.0, epsilon = 1e-9);
        assert_relative_eq!(yaw, 30.0, epsilon = 1e-9);
    }

    #[test]
    fn serialization_roundtrip() {
        let angles = NauticalAngles::new(0.1, -0.2, 0.3);
        let json = serde_json::to_string(&angles).unwrap();
        let back: NauticalAngles = serde_json::from_str(&json).unwrap();
        assert_eq!(angles, back);
    }
}
