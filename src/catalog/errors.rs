//! Catalog errors
//!
//! Raised at the storage boundary when an invariant (uniqueness, validity,
//! acyclicity) would be violated, or when a snapshot cannot be read or
//! written.

use thiserror::Error;

use super::ids::{LinkId, ObjectId, UserId};
use crate::lifecycle::LifecycleError;

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    // ==================
    // Lookup Errors
    // ==================
    #[error("unknown object {0}")]
    UnknownObject(ObjectId),

    #[error("unknown user '{0}'")]
    UnknownUser(String),

    #[error("unknown lifecycle '{0}'")]
    UnknownLifecycle(String),

    #[error("unknown file {0}")]
    UnknownFile(LinkId),

    #[error("no active {0}")]
    NoActiveLink(String),

    // ==================
    // Invariant Errors
    // ==================
    #[error("object {type_name}/{reference}/{revision} already exists")]
    DuplicateObject {
        type_name: String,
        reference: String,
        revision: String,
    },

    #[error("user '{0}' already exists")]
    DuplicateUser(String),

    #[error("lifecycle '{0}' already registered")]
    DuplicateLifecycle(String),

    #[error("duplicate active {0}")]
    DuplicateLink(String),

    #[error("adding {child} under {parent} would create a cycle")]
    Cycle { parent: ObjectId, child: ObjectId },

    #[error("invalid link: {0}")]
    InvalidLink(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("object {0} is cancelled")]
    Cancelled(ObjectId),

    #[error("file {file} is locked by {by}")]
    FileLocked { file: LinkId, by: UserId },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    // ==================
    // Persistence Errors
    // ==================
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl CatalogError {
    pub fn persistence(msg: impl Into<String>) -> Self {
        CatalogError::Persistence(msg.into())
    }
}
