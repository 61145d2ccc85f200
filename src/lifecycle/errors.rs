//! Lifecycle errors
//!
//! These are configuration or programming errors in a lifecycle
//! definition, never a runtime condition of a particular object.

use thiserror::Error;

/// Result type for lifecycle operations
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Errors raised by [`super::LifecycleDefinition`] and [`super::Role`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// The state is not part of the lifecycle
    #[error("unknown state '{state}' in lifecycle '{lifecycle}'")]
    UnknownState { lifecycle: String, state: String },

    /// There is no state after (or before) the given state
    #[error("no {direction} transition from '{state}' in lifecycle '{lifecycle}'")]
    NoSuchTransition {
        lifecycle: String,
        state: String,
        direction: Direction,
    },

    /// The definition itself is malformed
    #[error("invalid lifecycle definition '{name}': {reason}")]
    InvalidDefinition { name: String, reason: String },

    /// A role name that does not parse
    #[error("invalid role '{0}'")]
    InvalidRole(String),
}

/// Direction of a lifecycle step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Backward => write!(f, "backward"),
        }
    }
}

impl LifecycleError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        LifecycleError::InvalidDefinition {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
