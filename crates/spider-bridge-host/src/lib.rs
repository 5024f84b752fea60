//! Host globals for spider scripts.
//!
//! This crate provides everything a spider can reach outside its own
//! module. All of it is installed into the spider's context before the
//! module is evaluated.
//!
//! # Globals
//!
//! - [`logging`]: `console`, routed to `tracing` and a per-spider buffer
//! - [`local`]: `local`, a key/value store shared across spiders
//! - [`capability`]: the host capability surface (`jsapi` by default)
//!
//! # Failure Model
//!
//! Capability failures never reach the spider operation that triggered
//! them:
//!
//! 1. **Injection**: A provider that cannot describe itself is logged and
//!    skipped. The module still loads.
//! 2. **Invocation**: A failing call returns `null` to the script.

pub mod capability;
pub mod linker;
pub mod local;
pub mod logging;

pub use capability::{
    CapabilityBridge, CapabilityProvider, CapabilityRegistry, CapabilityRegistryBuilder,
    CapabilitySurface, GroupBuilder,
};
pub use linker::{HostGlobals, register_all};
pub use local::LocalStore;
pub use logging::{GuestLogs, LogEntry, LogLevel, LoggingHost};
