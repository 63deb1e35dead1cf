//! Runtime configuration
//!
//! Loaded from a YAML file; every field is optional and falls back to the
//! defaults below.
//!
//! ```yaml
//! root_id: 1
//! path_separator: "->"
//! database: /var/lib/catsync/catsync.db
//! ```

use crate::catalog::{CategoryId, DEFAULT_SEPARATOR};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

fn default_root_id() -> CategoryId {
    CategoryId::new(1)
}

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}

/// Settings shared by the resolver, the synchronizer and the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Id of the pre-existing root; first path segments hang below it
    #[serde(default = "default_root_id")]
    pub root_id: CategoryId,
    /// Separator between segments of a raw path string
    #[serde(default = "default_separator")]
    pub path_separator: String,
    /// SQLite database file; the CLI falls back to its data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root_id: default_root_id(),
            path_separator: default_separator(),
            database: None,
        }
    }
}

impl SyncConfig {
    /// Read and validate a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    /// Parse and validate YAML text.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = if raw.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(raw)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path_separator.is_empty() {
            return Err(ConfigError::Invalid("path_separator must not be empty".to_string()));
        }
        if self.root_id.get() <= 0 {
            return Err(ConfigError::Invalid(format!("root_id must be positive, got {}", self.root_id)));
        }
        Ok(())
    }

    pub fn with_root_id(mut self, root_id: CategoryId) -> Self {
        self.root_id = root_id;
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.path_separator = separator.into();
        self
    }
}
