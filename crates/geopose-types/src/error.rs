//! Workspace-wide error type.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type spanning frame-forest validation and transform resolution.
///
/// Queries that merely cannot be answered (absent frame, ungeolocated
/// chain, numeric degeneracy) return `Option::None` at the facade;
/// [`PoseError`] surfaces where the contract demands an explanation, i.e.
/// mutations and mandatory transform resolution.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoseError {
    /// A precondition on the caller's input failed: missing parent, name
    /// reuse under a different parent, removal of a non-leaf, empty name.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A required transform chain crosses a subgraph root that has not been
    /// geolocated yet.
    #[error("unknown transform on subgraph root '{0}'")]
    UnknownTransform(String),
}

impl PoseError {
    /// Shorthand used throughout the engine's validation paths.
    pub fn invalid(message: impl Into<String>) -> Self {
        PoseError::InvalidArgument(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_roundtrip() {
        let err = PoseError::UnknownTransform("platform".to_string());
        let json = serde_json::to_string(&err).unwrap();
        let back: PoseError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }

    #[test]
    fn display_names_the_offending_frame() {
        let err = PoseError::invalid("parent 'base' does not exist");
        assert!(err.to_string().contains("parent 'base'"));
    }
}
