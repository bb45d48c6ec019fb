//! Error types for world construction and handle access.

use thiserror::Error;

/// Errors reported by the physics world.
///
/// Only contract violations are errors. Numerical degeneracies inside the
/// narrowphase and solver are handled locally and never surface here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsError {
    /// The handle refers to an object that was destroyed, or to a different kind of object.
    #[error("invalid {kind} handle")]
    InvalidHandle {
        /// Which kind of object the handle was expected to name.
        kind: &'static str,
    },

    /// A polygon could not be built from the supplied vertices.
    #[error("degenerate polygon: {reason}")]
    DegeneratePolygon {
        /// Description of the degeneracy.
        reason: &'static str,
    },

    /// A circle, edge or chain shape was built from invalid parameters.
    #[error("invalid shape: {reason}")]
    InvalidShape {
        /// Description of the problem.
        reason: &'static str,
    },

    /// Fixture density is negative, non-finite, or zero on a dynamic body.
    #[error("invalid density {density}")]
    InvalidDensity {
        /// The rejected density.
        density: f32,
    },

    /// A joint definition is inconsistent.
    #[error("invalid joint: {reason}")]
    InvalidJoint {
        /// Description of the problem.
        reason: &'static str,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the invalid value.
        reason: &'static str,
    },
}

/// Result type for physics operations.
pub type PhysicsResult<T> = Result<T, PhysicsError>;
