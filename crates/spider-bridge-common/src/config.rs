//! Configuration structures for spider-bridge.
//!
//! This module defines configuration options for various components:
//! - [`BridgeConfig`]: Top-level configuration containing all settings
//! - [`EngineConfig`]: QuickJS runtime limits and worker thread settings
//! - [`ModuleConfig`]: Module normalization and guest log settings
//! - [`CapabilityConfig`]: Names of the globals injected into scripts

use serde::{Deserialize, Serialize};

use crate::BridgeError;

/// Top-level bridge configuration.
///
/// Can be loaded from files (TOML, JSON) or built in code.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// Script engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Module loading configuration.
    #[serde(default)]
    pub module: ModuleConfig,

    /// Host capability configuration.
    #[serde(default)]
    pub capabilities: CapabilityConfig,
}

impl BridgeConfig {
    /// Check settings that cannot be expressed in the types.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidConfig`] if a global name is not a
    /// script identifier, the two globals collide, the worker name is empty
    /// or the guest log buffer has no room.
    pub fn validate(&self) -> Result<(), BridgeError> {
        let capabilities = &self.capabilities;

        if !is_identifier(&capabilities.global_name) {
            return Err(BridgeError::invalid_config(format!(
                "capability global '{}' is not a valid identifier",
                capabilities.global_name
            )));
        }

        if capabilities.local_enabled {
            if !is_identifier(&capabilities.local_global) {
                return Err(BridgeError::invalid_config(format!(
                    "local global '{}' is not a valid identifier",
                    capabilities.local_global
                )));
            }
            if capabilities.local_global == capabilities.global_name {
                return Err(BridgeError::invalid_config(format!(
                    "capability and local globals are both named '{}'",
                    capabilities.global_name
                )));
            }
        }

        if self.engine.worker_name.trim().is_empty() {
            return Err(BridgeError::invalid_config("worker name must not be empty"));
        }

        if self.module.log_buffer == 0 {
            return Err(BridgeError::invalid_config("log_buffer must be at least 1"));
        }

        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// QuickJS runtime configuration.
///
/// Each adapter owns one runtime, so these limits apply per spider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Heap limit in megabytes. `0` disables the limit.
    #[serde(default = "defaults::memory_limit_mb")]
    pub memory_limit_mb: u32,

    /// Maximum native stack used by the interpreter, in kilobytes.
    #[serde(default = "defaults::max_stack_size_kb")]
    pub max_stack_size_kb: u32,

    /// Allocation volume (megabytes) that triggers a GC cycle.
    #[serde(default = "defaults::gc_threshold_mb")]
    pub gc_threshold_mb: u32,

    /// Name given to the worker thread that owns the engine.
    #[serde(default = "defaults::worker_name")]
    pub worker_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory_limit_mb: defaults::memory_limit_mb(),
            max_stack_size_kb: defaults::max_stack_size_kb(),
            gc_threshold_mb: defaults::gc_threshold_mb(),
            worker_name: defaults::worker_name(),
        }
    }
}

impl EngineConfig {
    /// Heap limit in bytes, or `None` when unlimited.
    pub fn memory_limit_bytes(&self) -> Option<usize> {
        (self.memory_limit_mb > 0).then(|| self.memory_limit_mb as usize * 1024 * 1024)
    }

    /// Stack limit in bytes.
    pub fn max_stack_size_bytes(&self) -> usize {
        self.max_stack_size_kb as usize * 1024
    }

    /// GC threshold in bytes.
    pub fn gc_threshold_bytes(&self) -> usize {
        self.gc_threshold_mb as usize * 1024 * 1024
    }
}

/// Module loading configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModuleConfig {
    /// Reject modules whose export pattern cannot be matched.
    ///
    /// When disabled, an unmatched module is evaluated unchanged and the
    /// failure shows up later as a missing binding.
    #[serde(default = "defaults::strict_normalization")]
    pub strict_normalization: bool,

    /// Number of guest `console` entries kept per spider.
    #[serde(default = "defaults::log_buffer")]
    pub log_buffer: usize,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            strict_normalization: defaults::strict_normalization(),
            log_buffer: defaults::log_buffer(),
        }
    }
}

/// Host capability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CapabilityConfig {
    /// Global name of the capability surface.
    #[serde(default = "defaults::global_name")]
    pub global_name: String,

    /// Expose the shared `local` key-value store.
    #[serde(default = "defaults::local_enabled")]
    pub local_enabled: bool,

    /// Global name of the key-value store.
    #[serde(default = "defaults::local_global")]
    pub local_global: String,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            global_name: defaults::global_name(),
            local_enabled: defaults::local_enabled(),
            local_global: defaults::local_global(),
        }
    }
}

/// Default value functions for serde.
mod defaults {
    pub const fn memory_limit_mb() -> u32 {
        64
    }

    pub const fn max_stack_size_kb() -> u32 {
        1024
    }

    pub const fn gc_threshold_mb() -> u32 {
        16
    }

    pub fn worker_name() -> String {
        "spider-worker".to_string()
    }

    pub const fn strict_normalization() -> bool {
        true
    }

    pub const fn log_buffer() -> usize {
        256
    }

    pub fn global_name() -> String {
        "jsapi".to_string()
    }

    pub const fn local_enabled() -> bool {
        true
    }

    pub fn local_global() -> String {
        "local".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();

        assert_eq!(config.engine.memory_limit_mb, 64);
        assert_eq!(config.engine.max_stack_size_kb, 1024);
        assert_eq!(config.engine.worker_name, "spider-worker");

        assert!(config.module.strict_normalization);
        assert_eq!(config.module.log_buffer, 256);

        assert_eq!(config.capabilities.global_name, "jsapi");
        assert!(config.capabilities.local_enabled);
        assert_eq!(config.capabilities.local_global, "local");
    }

    #[test]
    fn test_config_serialization() {
        let config = BridgeConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: BridgeConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(
            config.engine.memory_limit_mb,
            deserialized.engine.memory_limit_mb
        );
        assert_eq!(
            config.capabilities.global_name,
            deserialized.capabilities.global_name
        );
    }

    #[test]
    fn test_limits_in_bytes() {
        let config = EngineConfig {
            memory_limit_mb: 2,
            max_stack_size_kb: 512,
            gc_threshold_mb: 1,
            ..Default::default()
        };

        assert_eq!(config.memory_limit_bytes(), Some(2 * 1024 * 1024));
        assert_eq!(config.max_stack_size_bytes(), 512 * 1024);
        assert_eq!(config.gc_threshold_bytes(), 1024 * 1024);

        let unlimited = EngineConfig {
            memory_limit_mb: 0,
            ..Default::default()
        };
        assert_eq!(unlimited.memory_limit_bytes(), None);
    }

    #[test]
    fn test_validate() {
        assert!(BridgeConfig::default().validate().is_ok());

        let mut config = BridgeConfig::default();
        config.capabilities.global_name = "js api".into();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, BridgeError::InvalidConfig { .. }));
        assert!(err.to_string().contains("js api"));

        let mut config = BridgeConfig::default();
        config.capabilities.local_global = "jsapi".into();
        assert!(config.validate().is_err());

        // The local name is unused when the store is disabled.
        config.capabilities.local_enabled = false;
        assert!(config.validate().is_ok());

        let mut config = BridgeConfig::default();
        config.module.log_buffer = 0;
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.engine.worker_name = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_identifier_rules() {
        assert!(is_identifier("jsapi"));
        assert!(is_identifier("_local$2"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("2fast"));
        assert!(!is_identifier("a-b"));
    }

    #[test]
    fn test_partial_deserialization() {
        let json = r#"{"module": {"strict_normalization": false}}"#;
        let config: BridgeConfig = serde_json::from_str(json).unwrap();

        // Explicitly set value
        assert!(!config.module.strict_normalization);
        // Default values for unspecified fields
        assert_eq!(config.module.log_buffer, 256);
        assert_eq!(config.capabilities.global_name, "jsapi");
    }
}
