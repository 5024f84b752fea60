//! Common types, errors, and configuration for spider-bridge.
//!
//! This crate provides shared functionality used across the spider-bridge workspace:
//! - Error types using `thiserror` for type-safe error handling
//! - Configuration structures for engine, module and capability settings
//! - TOML configuration file support

pub mod config;
pub mod config_file;
pub mod error;

pub use config::{BridgeConfig, CapabilityConfig, EngineConfig, ModuleConfig};
pub use config_file::{ConfigFile, ConfigFileError, SpiderEntry};
pub use error::{BridgeError, CapabilityError, NormalizeError, QueueError};
