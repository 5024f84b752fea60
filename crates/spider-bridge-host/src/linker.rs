//! Host global registration for a spider context.
//!
//! [`register_all`] installs everything a spider script may reach besides
//! its own module: the `console` shim, the `local` store and the capability
//! surface.

use std::sync::Arc;

use rquickjs::Ctx;
use tracing::warn;

use spider_bridge_common::{BridgeError, CapabilityConfig};
use spider_bridge_core::JsResultExt;

use crate::capability::{CapabilityBridge, CapabilityProvider};
use crate::local::LocalStore;
use crate::logging::{GuestLogs, LoggingHost};

/// Host objects shared with one spider context.
#[derive(Clone)]
pub struct HostGlobals {
    /// Identifier of the spider, used to tag its logs.
    pub spider: String,

    /// Buffer receiving the spider's console output.
    pub logs: GuestLogs,

    /// Backing store of the `local` global.
    pub local: LocalStore,

    /// Capability provider, if the host supplies one.
    pub capabilities: Option<Arc<dyn CapabilityProvider>>,
}

impl std::fmt::Debug for HostGlobals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostGlobals")
            .field("spider", &self.spider)
            .field("local_entries", &self.local.len())
            .field("capabilities", &self.capabilities.is_some())
            .finish_non_exhaustive()
    }
}

/// Register all host globals on `ctx`.
///
/// This registers:
/// - `console` - Logging for guest code
/// - `local` (name configurable) - Key/value storage, unless disabled
/// - `jsapi` (name configurable) - The capability surface, when a provider is set
///
/// A failing capability install is logged and skipped; the spider then runs
/// without the capability global.
///
/// # Errors
///
/// Returns an error if the console or local bindings cannot be created.
pub fn register_all(
    ctx: &Ctx<'_>,
    config: &CapabilityConfig,
    globals: &HostGlobals,
) -> Result<(), BridgeError> {
    register_console(ctx, globals)?;

    if config.local_enabled {
        register_local(ctx, &config.local_global, &globals.local)?;
    }

    if let Some(provider) = &globals.capabilities {
        register_capabilities(ctx, &config.global_name, provider);
    }

    Ok(())
}

/// Register the `console` global.
///
/// # Errors
///
/// Returns an error if the console object cannot be created.
pub fn register_console(ctx: &Ctx<'_>, globals: &HostGlobals) -> Result<(), BridgeError> {
    LoggingHost::install(ctx, &globals.spider, &globals.logs).or_bridge(ctx)
}

/// Register the `local` store under `name`.
///
/// # Errors
///
/// Returns an error if the store object cannot be created.
pub fn register_local(ctx: &Ctx<'_>, name: &str, store: &LocalStore) -> Result<(), BridgeError> {
    store.install(ctx, name).or_bridge(ctx)
}

/// Register the capability surface under `name`.
///
/// Returns `false` if the install failed.
pub fn register_capabilities(
    ctx: &Ctx<'_>,
    name: &str,
    provider: &Arc<dyn CapabilityProvider>,
) -> bool {
    match CapabilityBridge::install(ctx, name, provider) {
        Ok(_) => true,
        Err(e) => {
            warn!(global = name, error = %e, "Capability injection failed, continuing without it");
            false
        }
    }
}
