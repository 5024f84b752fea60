//! QuickJS runtime configuration and creation.
//!
//! The [`ScriptEngine`] bundles one runtime with one full context. It is:
//! - Owned by exactly one worker thread (QuickJS is not thread-safe)
//! - Configured with heap, stack and GC limits from [`EngineConfig`]
//!
//! [`JsResultExt`] turns engine errors into [`BridgeError`]s, capturing the
//! pending script exception when there is one.

use rquickjs::{CatchResultExt, CaughtError, Context, Ctx, Runtime};
use tracing::{debug, info};

use spider_bridge_common::{BridgeError, EngineConfig};

/// A QuickJS runtime with its single context.
///
/// # Example
///
/// ```ignore
/// use spider_bridge_common::EngineConfig;
/// use spider_bridge_core::ScriptEngine;
///
/// let engine = ScriptEngine::new(&EngineConfig::default())?;
/// engine.context().with(|ctx| ctx.eval::<(), _>("1 + 1"))?;
/// ```
pub struct ScriptEngine {
    // Field order matters: the context must go before its runtime.
    context: Context,
    runtime: Runtime,
    config: EngineConfig,
}

impl ScriptEngine {
    /// Create a new runtime and context with the given limits.
    ///
    /// # Errors
    ///
    /// Returns an error if QuickJS cannot allocate the runtime or context.
    pub fn new(config: &EngineConfig) -> Result<Self, BridgeError> {
        let runtime = Runtime::new()
            .map_err(|e| BridgeError::engine(format!("Failed to create runtime: {e}")))?;

        if let Some(limit) = config.memory_limit_bytes() {
            runtime.set_memory_limit(limit);
        }
        runtime.set_max_stack_size(config.max_stack_size_bytes());
        runtime.set_gc_threshold(config.gc_threshold_bytes());

        let context = Context::full(&runtime)
            .map_err(|e| BridgeError::engine(format!("Failed to create context: {e}")))?;

        info!(
            memory_limit_mb = config.memory_limit_mb,
            max_stack_size_kb = config.max_stack_size_kb,
            "QuickJS engine initialized"
        );

        Ok(Self {
            context,
            runtime,
            config: config.clone(),
        })
    }

    /// Get the context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Get the runtime.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run queued promise jobs until none are left.
    ///
    /// Returns the number of jobs executed.
    ///
    /// # Errors
    ///
    /// Returns an error if a job throws.
    pub fn drain_jobs(&self) -> Result<usize, BridgeError> {
        let mut executed = 0;
        while self.runtime.is_job_pending() {
            self.runtime
                .execute_pending_job()
                .map_err(|e| BridgeError::script(format!("Pending job failed: {e:?}")))?;
            executed += 1;
        }
        if executed > 0 {
            debug!(executed, "Drained pending jobs");
        }
        Ok(executed)
    }
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("memory_limit_mb", &self.config.memory_limit_mb)
            .field("max_stack_size_kb", &self.config.max_stack_size_kb)
            .finish_non_exhaustive()
    }
}

/// Translate engine results into bridge errors.
pub trait JsResultExt<'js, T> {
    /// Convert the error, rendering a thrown script value as [`BridgeError::Script`].
    fn or_bridge(self, ctx: &Ctx<'js>) -> Result<T, BridgeError>;
}

impl<'js, T> JsResultExt<'js, T> for rquickjs::Result<T> {
    fn or_bridge(self, ctx: &Ctx<'js>) -> Result<T, BridgeError> {
        self.catch(ctx).map_err(|caught| match caught {
            CaughtError::Error(e) => BridgeError::engine(e.to_string()),
            thrown => BridgeError::script(thrown.to_string()),
        })
    }
}
