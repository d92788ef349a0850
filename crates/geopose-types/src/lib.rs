//! `geopose-types` – value types shared by every layer of the pose engine.
//!
//! # Modules
//!
//! - [`angles`] – [`NauticalAngles`]: intrinsic Tait–Bryan roll/pitch/yaw
//!   with canonical-range normalization and a robust quaternion extraction
//!   that survives gimbal lock.
//! - [`pose`] – [`Pose`], [`GeodeticPoint`], [`GeodeticPose`]: local and
//!   Earth-relative placements, plus the [`Frame`] record and the [`Change`]
//!   variants carried by the engine's broadcast bus.
//! - [`error`] – [`PoseError`]: the workspace-wide error enum.

pub mod angles;
pub mod error;
pub mod pose;

pub use angles::NauticalAngles;
pub use error::PoseError;
pub use pose::{Change, Frame, GeodeticPoint, GeodeticPose, Pose};
