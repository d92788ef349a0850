//! `geopose-earth` – the Earth-model collaborators of the pose engine.
//!
//! # Modules
//!
//! - [`ellipsoid`] – the [`Ellipsoid`] contract (geodetic ↔ ECEF, the
//!   topocentric North-East-Down rotation at a point, and the ECEF body
//!   frame handle) plus [`ReferenceEllipsoid`] with the usual geodetic
//!   reference systems as constants.
//! - [`geoid`] – the [`Geoid`] contract: the ellipsoid-to-mean-sea-level
//!   undulation, used only at encoding boundaries to move between AMSL and
//!   height-above-ellipsoid.

pub mod ellipsoid;
pub mod geoid;

pub use ellipsoid::{Ellipsoid, ReferenceEllipsoid, ned_rotation};
pub use geoid::{ConstantGeoid, Geoid};
