//! Host capabilities exposed to spider scripts.
//!
//! A [`CapabilityProvider`] describes a set of callable functions, optionally
//! split into named groups. [`CapabilityBridge::install`] binds them under one
//! global object:
//!
//! ```text
//! no groups:   jsapi.md5(..)          jsapi.base64(..)
//! groups:      jsapi.crypto.md5(..)   jsapi.http.fetch(..)
//! ```
//!
//! With groups present, the root only carries the group objects.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rquickjs::function::Rest;
use rquickjs::{Ctx, FromJs, Function, IntoJs, Object, Value as JsValue};
use tracing::{debug, info};

use spider_bridge_common::{BridgeError, CapabilityError};
use spider_bridge_core::{JsResultExt, Value};

/// Source of host functions callable from scripts.
///
/// Calls arrive on the adapter's worker thread while the script is running,
/// so implementations must not block on that same adapter.
pub trait CapabilityProvider: Send + Sync {
    /// Names of the function groups. Empty means the functions live on the root.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot describe itself.
    fn groups(&self) -> Result<Vec<String>, CapabilityError>;

    /// Names of the functions on the root (`None`) or in a group.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::UnknownGroup`] for a group not listed by
    /// [`CapabilityProvider::groups`].
    fn functions(&self, group: Option<&str>) -> Result<Vec<String>, CapabilityError>;

    /// Invoke a function.
    ///
    /// # Errors
    ///
    /// Any error is reported to the script as `null`.
    fn invoke(
        &self,
        group: Option<&str>,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, CapabilityError>;
}

type CapabilityFn = Arc<dyn Fn(Vec<Value>) -> Result<Value, CapabilityError> + Send + Sync>;

/// In-process [`CapabilityProvider`] built from closures.
///
/// # Example
///
/// ```ignore
/// let registry = CapabilityRegistry::builder()
///     .group("text", |g| {
///         g.function("upper", |args| {
///             Ok(args.first().and_then(Value::as_str).unwrap_or_default().to_uppercase().into())
///         })
///     })
///     .build();
/// ```
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    root: BTreeMap<String, CapabilityFn>,
    groups: BTreeMap<String, BTreeMap<String, CapabilityFn>>,
}

impl CapabilityRegistry {
    /// Create a builder for a registry.
    pub fn builder() -> CapabilityRegistryBuilder {
        CapabilityRegistryBuilder::default()
    }

    fn lookup(&self, group: Option<&str>, name: &str) -> Result<&CapabilityFn, CapabilityError> {
        let functions = match group {
            None => &self.root,
            Some(group) => self
                .groups
                .get(group)
                .ok_or_else(|| CapabilityError::UnknownGroup {
                    group: group.to_string(),
                })?,
        };

        functions
            .get(name)
            .ok_or_else(|| CapabilityError::UnknownFunction {
                name: name.to_string(),
            })
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("root", &self.root.keys().collect::<Vec<_>>())
            .field(
                "groups",
                &self
                    .groups
                    .iter()
                    .map(|(group, functions)| (group, functions.keys().collect::<Vec<_>>()))
                    .collect::<BTreeMap<_, _>>(),
            )
            .finish()
    }
}

impl CapabilityProvider for CapabilityRegistry {
    fn groups(&self) -> Result<Vec<String>, CapabilityError> {
        Ok(self.groups.keys().cloned().collect())
    }

    fn functions(&self, group: Option<&str>) -> Result<Vec<String>, CapabilityError> {
        match group {
            None => Ok(self.root.keys().cloned().collect()),
            Some(group) => self
                .groups
                .get(group)
                .map(|functions| functions.keys().cloned().collect())
                .ok_or_else(|| CapabilityError::UnknownGroup {
                    group: group.to_string(),
                }),
        }
    }

    fn invoke(
        &self,
        group: Option<&str>,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, CapabilityError> {
        let function = self.lookup(group, name)?;
        function(args)
    }
}

/// Builder for [`CapabilityRegistry`].
#[derive(Default)]
pub struct CapabilityRegistryBuilder {
    inner: CapabilityRegistry,
}

impl CapabilityRegistryBuilder {
    /// Register a function on the root.
    #[must_use]
    pub fn function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, CapabilityError> + Send + Sync + 'static,
    {
        self.inner.root.insert(name.into(), Arc::new(function));
        self
    }

    /// Register a group of functions.
    #[must_use]
    pub fn group<F>(mut self, name: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(GroupBuilder) -> GroupBuilder,
    {
        let group = build(GroupBuilder::default());
        self.inner
            .groups
            .entry(name.into())
            .or_default()
            .extend(group.functions);
        self
    }

    /// Build the registry.
    #[must_use]
    pub fn build(self) -> CapabilityRegistry {
        self.inner
    }
}

/// Collects the functions of one group.
#[derive(Default)]
pub struct GroupBuilder {
    functions: BTreeMap<String, CapabilityFn>,
}

impl GroupBuilder {
    /// Register a function in this group.
    #[must_use]
    pub fn function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, CapabilityError> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }
}

/// What [`CapabilityBridge::install`] bound.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySurface {
    /// Groups bound as sub-objects. Empty for a flat surface.
    pub groups: Vec<String>,

    /// Total number of bound functions.
    pub functions: usize,
}

/// Binds a [`CapabilityProvider`] into a script context.
pub struct CapabilityBridge;

impl CapabilityBridge {
    /// Install `provider` on the global object of `ctx` under `global_name`.
    ///
    /// The global is assigned only once every group and function has been
    /// bound, so a failed install leaves no partial surface behind.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails or the engine cannot allocate the
    /// bindings.
    pub fn install<'js>(
        ctx: &Ctx<'js>,
        global_name: &str,
        provider: &Arc<dyn CapabilityProvider>,
    ) -> Result<CapabilitySurface, BridgeError> {
        let root = Object::new(ctx.clone()).or_bridge(ctx)?;
        let groups = provider.groups()?;
        let mut surface = CapabilitySurface::default();

        if groups.is_empty() {
            surface.functions = bind_functions(ctx, &root, provider, None)?;
        } else {
            for group in &groups {
                let target = Object::new(ctx.clone()).or_bridge(ctx)?;
                surface.functions += bind_functions(ctx, &target, provider, Some(group))?;
                root.set(group.as_str(), target).or_bridge(ctx)?;
            }
            surface.groups = groups;
        }

        ctx.globals().set(global_name, root).or_bridge(ctx)?;

        info!(
            global = global_name,
            groups = surface.groups.len(),
            functions = surface.functions,
            "Capabilities installed"
        );

        Ok(surface)
    }
}

fn bind_functions<'js>(
    ctx: &Ctx<'js>,
    target: &Object<'js>,
    provider: &Arc<dyn CapabilityProvider>,
    group: Option<&str>,
) -> Result<usize, BridgeError> {
    let names = provider.functions(group)?;

    for name in &names {
        let provider = Arc::clone(provider);
        let owned_group = group.map(str::to_owned);
        let owned_name = name.clone();

        let function = Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, args: Rest<JsValue<'js>>| -> JsValue<'js> {
                call_capability(
                    &ctx,
                    provider.as_ref(),
                    owned_group.as_deref(),
                    &owned_name,
                    args.0,
                )
            },
        )
        .and_then(|function| function.with_name(name))
        .or_bridge(ctx)?;

        target.set(name.as_str(), function).or_bridge(ctx)?;
    }

    Ok(names.len())
}

/// Run one capability call, turning every failure into `null`.
fn call_capability<'js>(
    ctx: &Ctx<'js>,
    provider: &dyn CapabilityProvider,
    group: Option<&str>,
    name: &str,
    args: Vec<JsValue<'js>>,
) -> JsValue<'js> {
    let args = args
        .into_iter()
        .map(|arg| Value::from_js(ctx, arg))
        .collect::<rquickjs::Result<Vec<_>>>()
        .map_err(|e| CapabilityError::failed(format!("argument conversion: {e}")));

    let result = args.and_then(|args| {
        panic::catch_unwind(AssertUnwindSafe(|| provider.invoke(group, name, args)))
            .unwrap_or_else(|_| Err(CapabilityError::failed("provider panicked")))
    });

    let converted = result.and_then(|value| {
        value
            .into_js(ctx)
            .map_err(|e| CapabilityError::failed(format!("result conversion: {e}")))
    });

    match converted {
        Ok(value) => value,
        Err(err) => {
            // Drop any exception a failed conversion left pending.
            let _ = ctx.catch();
            debug!(group = ?group, function = name, error = %err, "Capability call failed");
            JsValue::new_null(ctx.clone())
        }
    }
}
