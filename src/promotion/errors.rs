//! Governance Error Types
//!
//! Every error leaves the catalog unchanged: operations run inside a
//! transaction that is only committed once all checks have passed.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::lifecycle::LifecycleError;

/// Result type for governance operations
pub type GovernanceResult<T> = Result<T, GovernanceError>;

/// Errors surfaced by promotion, demotion, approval and assembly promotion.
#[derive(Debug, Clone, Error)]
pub enum GovernanceError {
    /// A state that is not part of the lifecycle
    #[error("unknown state: {0}")]
    UnknownState(String),

    /// No state after (or before) the current one
    #[error("no such transition: {0}")]
    NoSuchTransition(String),

    /// A malformed lifecycle or role
    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    /// The acting user lacks authority
    #[error("permission denied: {0}")]
    Permission(String),

    /// Structural ineligibility or unmet quorum
    #[error("cannot promote {object}: {}", .reasons.join("; "))]
    Promotion { object: String, reasons: Vec<String> },

    /// A domain rule violation, e.g. two revisions of one reference in the
    /// same assembly promotion
    #[error("controller error: {0}")]
    Controller(String),

    /// Storage-level failure
    #[error(transparent)]
    Catalog(CatalogError),
}

/// Error kinds, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernanceErrorKind {
    UnknownState,
    NoSuchTransition,
    InvalidDefinition,
    Permission,
    Promotion,
    Controller,
    Catalog,
}

impl GovernanceErrorKind {
    /// Stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownState => "PLM_UNKNOWN_STATE",
            Self::NoSuchTransition => "PLM_NO_SUCH_TRANSITION",
            Self::InvalidDefinition => "PLM_INVALID_DEFINITION",
            Self::Permission => "PLM_PERMISSION_DENIED",
            Self::Promotion => "PLM_PROMOTION_ERROR",
            Self::Controller => "PLM_CONTROLLER_ERROR",
            Self::Catalog => "PLM_CATALOG_ERROR",
        }
    }
}

impl GovernanceError {
    pub fn permission(msg: impl Into<String>) -> Self {
        GovernanceError::Permission(msg.into())
    }

    pub fn controller(msg: impl Into<String>) -> Self {
        GovernanceError::Controller(msg.into())
    }

    pub fn promotion(object: impl Into<String>, reasons: Vec<String>) -> Self {
        GovernanceError::Promotion {
            object: object.into(),
            reasons,
        }
    }

    pub fn kind(&self) -> GovernanceErrorKind {
        match self {
            Self::UnknownState(_) => GovernanceErrorKind::UnknownState,
            Self::NoSuchTransition(_) => GovernanceErrorKind::NoSuchTransition,
            Self::InvalidDefinition(_) => GovernanceErrorKind::InvalidDefinition,
            Self::Permission(_) => GovernanceErrorKind::Permission,
            Self::Promotion { .. } => GovernanceErrorKind::Promotion,
            Self::Controller(_) => GovernanceErrorKind::Controller,
            Self::Catalog(_) => GovernanceErrorKind::Catalog,
        }
    }

    /// Whether the caller may retry after remediation. Only a failed
    /// snapshot write is not.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Catalog(CatalogError::Persistence(_)))
    }
}

impl From<LifecycleError> for GovernanceError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::UnknownState { .. } => GovernanceError::UnknownState(e.to_string()),
            LifecycleError::NoSuchTransition { .. } => {
                GovernanceError::NoSuchTransition(e.to_string())
            }
            LifecycleError::InvalidDefinition { .. } | LifecycleError::InvalidRole(_) => {
                GovernanceError::InvalidDefinition(e.to_string())
            }
        }
    }
}

impl From<CatalogError> for GovernanceError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::Lifecycle(inner) => inner.into(),
            other => GovernanceError::Catalog(other),
        }
    }
}
