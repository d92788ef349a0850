//! `geopose-engine` – a live forest of rigid coordinate frames anchored to
//! an Earth reference ellipsoid.
//!
//! Clients create and destroy named frames, attach them to parents with a
//! rigid offset, geolocate subgraph roots, and convert poses between any
//! two frames or between a frame and the geodetic reference. Streams
//! re-deliver conversions whenever any frame on the relevant path moves.
//!
//! # Modules
//!
//! - [`transform`] – rigid affine transforms and their algebra.
//! - [`forest`] – the copy-on-write frame forest: snapshot reads,
//!   serialized writes, pre-order traversal.
//! - [`kinematics`] – composition of geodetic placements with topocentric
//!   rotations.
//! - [`bus`] – replay-seeded broadcast of create/remove changes.
//! - [`signal`] – per-frame replay-last tick signals.
//! - [`stream`] – [`ConvertStream`][stream::ConvertStream] and
//!   [`TransformStream`][stream::TransformStream], the reactive query
//!   variants.
//! - [`engine`] – the [`PoseEngine`][engine::PoseEngine] facade tying it
//!   all together.

pub mod bus;
pub mod engine;
pub mod forest;
pub mod kinematics;
pub mod signal;
pub mod stream;
pub mod transform;

pub use bus::ChangeStream;
pub use engine::PoseEngine;
pub use forest::Traversal;
pub use stream::{ConvertStream, TransformStream};
pub use transform::Transform;

pub use geopose_types::{Change, Frame, GeodeticPoint, GeodeticPose, NauticalAngles, Pose, PoseError};
