//! Configuration file structures for spider-bridge.
//!
//! This module defines structures for TOML configuration files:
//! - [`ConfigFile`]: Top-level configuration file structure
//! - [`SpiderEntry`]: A named spider module with its extra configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::BridgeConfig;

/// Top-level configuration file structure.
///
/// # Example
///
/// ```toml
/// [bridge.engine]
/// memory_limit_mb = 64
///
/// [bridge.module]
/// strict_normalization = true
///
/// [bridge.capabilities]
/// global_name = "jsapi"
///
/// [[spiders]]
/// key = "demo"
/// api = "./spiders/demo.js"
/// ext = '{"site": "https://example.com"}'
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Bridge configuration (engine, module and capability settings).
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Spider modules known to the host.
    #[serde(default)]
    pub spiders: Vec<SpiderEntry>,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigFileError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed as TOML.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })
    }

    /// Find a spider entry by key.
    pub fn spider(&self, key: &str) -> Option<&SpiderEntry> {
        self.spiders.iter().find(|entry| entry.key == key)
    }
}

/// A spider module known to the host.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpiderEntry {
    /// Unique key of the spider.
    pub key: String,

    /// Module identifier handed to the loader (path or `file://` URL).
    pub api: String,

    /// Extra configuration passed to the spider's `init`.
    #[serde(default)]
    pub ext: Option<String>,
}

/// Configuration file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("Failed to parse config file: {message}")]
    Parse { message: String },
}
