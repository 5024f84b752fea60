//! Engine session owned by the adapter's worker thread.
//!
//! An [`EngineSession`] is one QuickJS runtime and context with a spider
//! module evaluated into it. It is created by [`EngineSession::bootstrap`]
//! and lives until the worker drops it; nothing outside the worker thread
//! ever touches it.

use rquickjs::function::Args;
use rquickjs::{Ctx, FromJs, Module, Object, Persistent, Value as JsValue};
use tracing::{debug, info, instrument, warn};

use spider_bridge_common::{BridgeConfig, BridgeError};
use spider_bridge_core::{JsResultExt, ModuleNormalizer, ScriptEngine, Value};
use spider_bridge_host::{HostGlobals, register_all};

/// Everything needed to bootstrap a session.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    /// Module identifier, also used as the module name inside the engine.
    pub identifier: String,

    /// Global binding the normalized module assigns its export to.
    pub binding: String,

    /// Raw module source.
    pub source: String,

    /// Bridge configuration.
    pub config: BridgeConfig,

    /// Host globals installed before the module runs.
    pub globals: HostGlobals,
}

/// A spider module evaluated in its own engine.
pub struct EngineSession {
    // Field order matters: the handle must be released before its runtime.
    exported: Persistent<Object<'static>>,
    engine: ScriptEngine,
    identifier: String,
}

impl EngineSession {
    /// Create the engine, install host globals and evaluate the module.
    ///
    /// # Errors
    ///
    /// Returns an error if the module cannot be normalized, throws while
    /// evaluating, or does not bind its exported object.
    #[instrument(skip_all, fields(spider = %spec.identifier))]
    pub fn bootstrap(spec: SessionSpec) -> Result<Self, BridgeError> {
        let SessionSpec {
            identifier,
            binding,
            source,
            config,
            globals,
        } = spec;

        let engine = ScriptEngine::new(&config.engine)?;
        let normalized =
            ModuleNormalizer::new(config.module.strict_normalization).normalize(&source, &binding)?;

        let exported = engine.context().with(|ctx| -> Result<_, BridgeError> {
            register_all(&ctx, &config.capabilities, &globals)?;

            Module::evaluate(ctx.clone(), identifier.as_str(), normalized)
                .and_then(|promise| promise.finish::<()>())
                .or_bridge(&ctx)?;

            let value: JsValue = ctx.globals().get(binding.as_str()).or_bridge(&ctx)?;
            let object = value
                .into_object()
                .ok_or_else(|| BridgeError::BindingMissing {
                    binding: binding.clone(),
                })?;

            Ok(Persistent::save(&ctx, object))
        })?;

        info!(binding = %binding, "Spider module loaded");

        Ok(Self {
            exported,
            engine,
            identifier,
        })
    }

    /// Call an exported function and convert its result to a [`Value`].
    ///
    /// # Errors
    ///
    /// See [`EngineSession::invoke_with`].
    pub fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Value, BridgeError> {
        self.invoke_with(name, args, |ctx, value| Value::from_js(ctx, value).or_bridge(ctx))
    }

    /// Call an exported function and decode its raw result with `decode`.
    ///
    /// The function runs with the exported object as `this`. A returned
    /// promise is driven to completion before decoding.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::FunctionMissing`] if the export has no function
    /// named `name`, and [`BridgeError::Script`] if the call throws.
    pub fn invoke_with<T, D>(&self, name: &str, args: Vec<Value>, decode: D) -> Result<T, BridgeError>
    where
        D: for<'js> FnOnce(&Ctx<'js>, JsValue<'js>) -> Result<T, BridgeError>,
    {
        debug!(spider = %self.identifier, function = name, args = args.len(), "Invoking spider function");

        let result = self.engine.context().with(|ctx| {
            let exported = self.exported.clone().restore(&ctx).or_bridge(&ctx)?;
            let member: JsValue = exported.get(name).or_bridge(&ctx)?;
            let function = member
                .into_function()
                .ok_or_else(|| BridgeError::function_missing(name))?;

            let mut call = Args::new(ctx.clone(), args.len());
            call.this(exported).or_bridge(&ctx)?;
            for arg in args {
                call.push_arg(arg).or_bridge(&ctx)?;
            }

            let mut result: JsValue = function.call_arg(call).or_bridge(&ctx)?;
            if let Some(promise) = result.as_promise() {
                result = promise.finish::<JsValue>().or_bridge(&ctx)?;
            }

            decode(&ctx, result)
        });

        // Stray jobs (unawaited promises) must not leak into the next call.
        if let Err(e) = self.engine.drain_jobs() {
            warn!(spider = %self.identifier, function = name, error = %e, "Pending job failed");
        }

        result
    }

    /// The module identifier.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The engine backing this session.
    pub fn engine(&self) -> &ScriptEngine {
        &self.engine
    }
}

impl std::fmt::Debug for EngineSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSession")
            .field("identifier", &self.identifier)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}
