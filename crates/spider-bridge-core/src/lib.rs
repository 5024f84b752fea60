//! Core QuickJS bridge for spider-bridge.
//!
//! This crate provides the engine-facing building blocks:
//! - [`ScriptEngine`]: QuickJS runtime and context with configured limits
//! - [`Value`] and [`marshal`]: Conversion between host and script values
//! - [`ModuleNormalizer`]: Rewrites the three spider export dialects
//! - [`TaskQueue`]: Single worker thread that owns the engine
//! - [`ModuleLoader`]: Source providers for spider modules
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      TaskQueue                          │
//! │  (One per spider, callers on any thread)                │
//! │  - FIFO job channel                                     │
//! │  - Blocking or awaitable results                        │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                    ScriptEngine                         │
//! │  (Lives on the worker thread only)                      │
//! │  - Runtime limits                                       │
//! │  - Normalized module bound to a unique global           │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                  Value marshalling                      │
//! │  - Host Value <-> engine values                         │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod engine;
pub mod loader;
pub mod marshal;
pub mod normalize;
pub mod queue;
pub mod value;

pub use engine::{JsResultExt, ScriptEngine};
pub use loader::{FileLoader, MemoryLoader, ModuleLoader};
pub use normalize::{Dialect, ModuleNormalizer, new_binding_name};
pub use queue::{TaskHandle, TaskQueue};
pub use value::Value;
