//! Configuration errors

use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON for the expected shape
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration parsed but violates a rule
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ConfigError::Invalid(msg.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "PLM_CONFIG_IO",
            Self::Parse(_) => "PLM_CONFIG_PARSE",
            Self::Invalid(_) => "PLM_CONFIG_INVALID",
        }
    }
}
