//! Spider adapter for spider-bridge.
//!
//! This crate ties the engine, the host globals and the worker queue
//! together into [`SpiderAdapter`], the one type hosts talk to. It handles:
//!
//! - Loading and bootstrapping a spider module on its own worker
//! - The fixed spider operation set (home, category, detail, search, ...)
//! - Result translation, including proxy byte streams
//! - Teardown
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use spider_bridge_adapter::SpiderAdapter;
//! use spider_bridge_core::{MemoryLoader, Value};
//! use spider_bridge_host::CapabilityRegistry;
//!
//! let loader = MemoryLoader::new()
//!     .with_module("demo.js", "export default { home(f) { return 'OK:' + f } }");
//! let capabilities = CapabilityRegistry::builder()
//!     .function("md5", |args| Ok(Value::from(format!("{:?}", args))))
//!     .build();
//!
//! let spider = SpiderAdapter::builder("demo.js")
//!     .loader(Arc::new(loader))
//!     .capabilities(Arc::new(capabilities))
//!     .build()?;
//!
//! assert_eq!(spider.home(true)?, "OK:true");
//! ```

pub mod adapter;
pub mod proxy;
pub mod session;

pub use adapter::{SpiderAdapter, SpiderAdapterBuilder};
pub use proxy::ProxyResponse;
pub use session::{EngineSession, SessionSpec};
