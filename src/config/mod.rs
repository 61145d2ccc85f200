//! Configuration
//!
//! JSON configuration of the governance core. Every field has a default,
//! so an empty object `{}` is a valid configuration.

mod errors;

pub use errors::{ConfigError, ConfigResult};

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::lifecycle::{builtin_lifecycles, LifecycleDefinition, LifecycleSpec, DEFAULT_LIFECYCLE};

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlmConfig {
    /// Username of the organization account that owns official objects
    #[serde(default = "default_company_username")]
    pub company_username: String,

    /// Lifecycle given to objects created without one
    #[serde(default = "default_lifecycle")]
    pub default_lifecycle: String,

    #[serde(default = "builtin_lifecycles")]
    pub lifecycles: Vec<LifecycleSpec>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Log output settings. `RUST_LOG` overrides `filter` when set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_filter")]
    pub filter: String,

    /// One JSON object per line instead of human-readable text
    #[serde(default)]
    pub json: bool,
}

fn default_company_username() -> String {
    "company".to_string()
}
fn default_lifecycle() -> String {
    DEFAULT_LIFECYCLE.to_string()
}
fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

impl Default for PlmConfig {
    fn default() -> Self {
        Self {
            company_username: default_company_username(),
            default_lifecycle: default_lifecycle(),
            lifecycles: builtin_lifecycles(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PlmConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: PlmConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.company_username.trim().is_empty() {
            return Err(ConfigError::invalid("company_username must not be empty"));
        }
        if self.lifecycles.is_empty() {
            return Err(ConfigError::invalid("at least one lifecycle is required"));
        }
        self.definitions()?;
        if !self
            .lifecycles
            .iter()
            .any(|lifecycle| lifecycle.name == self.default_lifecycle)
        {
            return Err(ConfigError::invalid(format!(
                "default_lifecycle '{}' is not defined",
                self.default_lifecycle
            )));
        }
        Ok(())
    }

    /// The configured lifecycles, validated and in declaration order
    pub fn definitions(&self) -> ConfigResult<Vec<LifecycleDefinition>> {
        let mut names = BTreeSet::new();
        self.lifecycles
            .iter()
            .map(|lifecycle| {
                if !names.insert(lifecycle.name.as_str()) {
                    return Err(ConfigError::invalid(format!(
                        "lifecycle '{}' is defined twice",
                        lifecycle.name
                    )));
                }
                LifecycleDefinition::try_from(lifecycle.clone())
                    .map_err(|e| ConfigError::invalid(e.to_string()))
            })
            .collect()
    }

    /// A fresh catalog with the configured lifecycles and the organization
    /// account.
    pub fn seed_catalog(&self, at: DateTime<Utc>) -> ConfigResult<Catalog> {
        self.validate()?;
        let mut catalog = Catalog::new();
        let invalid = |e: crate::catalog::CatalogError| ConfigError::invalid(e.to_string());
        for definition in self.definitions()? {
            catalog.register_lifecycle(definition).map_err(invalid)?;
        }
        catalog
            .set_default_lifecycle(&self.default_lifecycle)
            .map_err(invalid)?;
        let company = catalog.add_user(&self.company_username, at).map_err(invalid)?;
        catalog.set_company(company).map_err(invalid)?;
        Ok(catalog)
    }
}
