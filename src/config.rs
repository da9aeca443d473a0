//! Registry Configuration
//!
//! Settings shared by every model in a registry: the API root prefixed to
//! relative base URLs, the default primary key field, and whether derived
//! collection URLs are pluralized.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Prefix for relative base URLs (default: none)
    #[serde(default)]
    pub api_root: Option<String>,

    /// Primary key field for models that do not name one (default: "id")
    #[serde(default = "default_primary_key")]
    pub default_primary_key: String,

    /// Derive `/blog_posts` rather than `/blog_post` from `BlogPost` (default: true)
    #[serde(default = "default_pluralize")]
    pub pluralize_base_urls: bool,
}

fn default_primary_key() -> String {
    "id".to_string()
}

fn default_pluralize() -> bool {
    true
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            api_root: None,
            default_primary_key: default_primary_key(),
            pluralize_base_urls: default_pluralize(),
        }
    }
}

impl RegistryConfig {
    /// Create a config rooted at `api_root`
    pub fn with_api_root(api_root: impl Into<String>) -> Self {
        Self {
            api_root: Some(api_root.into()),
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.default_primary_key.trim().is_empty() {
            return Err(ConfigError::Invalid("default_primary_key must not be empty".into()));
        }
        Ok(())
    }

    /// API root, ignoring an empty string.
    pub(crate) fn root(&self) -> Option<&str> {
        self.api_root.as_deref().filter(|root| !root.is_empty())
    }
}
