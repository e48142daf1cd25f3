//! Engine configuration.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Settings fixed for the lifetime of an `Engine`.
///
/// Loadable from TOML; every key is optional:
///
/// ```toml
/// allow_non_public = true
/// initial_capacity = 256
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Bind field and property accessors that are not public.
    pub allow_non_public: bool,
    /// Number of cache entries to reserve up front.
    pub initial_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            allow_non_public: false,
            initial_capacity: 64,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse engine config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl EngineConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<EngineConfig, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a configuration file.
    pub fn from_file(path: &Path) -> Result<EngineConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}
