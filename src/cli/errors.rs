//! CLI-specific error types

use std::fmt;
use std::io;

use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::promotion::{GovernanceError, GovernanceErrorKind};

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (files, stdout)
    IoError,
    /// Catalog file unreadable or inconsistent
    CatalogError,
    /// Catalog file already exists
    AlreadyInitialized,
    /// A governance rule rejected the operation
    Governance(GovernanceErrorKind),
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "PLM_CLI_CONFIG_ERROR",
            Self::IoError => "PLM_CLI_IO_ERROR",
            Self::CatalogError => "PLM_CLI_CATALOG_ERROR",
            Self::AlreadyInitialized => "PLM_CLI_ALREADY_INITIALIZED",
            Self::Governance(kind) => kind.code(),
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Catalog error
    pub fn catalog_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::CatalogError, msg)
    }

    /// Catalog file already exists
    pub fn already_initialized(path: impl fmt::Display) -> Self {
        Self::new(
            CliErrorCode::AlreadyInitialized,
            format!("catalog {} already exists", path),
        )
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<CatalogError> for CliError {
    fn from(e: CatalogError) -> Self {
        Self::catalog_error(e.to_string())
    }
}

impl From<GovernanceError> for CliError {
    fn from(e: GovernanceError) -> Self {
        Self::new(CliErrorCode::Governance(e.kind()), e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_governance_code_passes_through() {
        let err: CliError = GovernanceError::permission("nope").into();
        assert_eq!(err.code_str(), "PLM_PERMISSION_DENIED");
        assert!(err.to_string().starts_with("PLM_PERMISSION_DENIED: "));
    }

    #[test]
    fn test_io_error_conversion() {
        let err: CliError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.code(), &CliErrorCode::IoError);
        assert_eq!(err.message(), "gone");
    }
}
