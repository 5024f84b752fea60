//! The public spider adapter.
//!
//! [`SpiderAdapter`] binds one spider module to its own worker thread and
//! exposes the fixed spider operation set. Every operation is a blocking
//! round-trip through the worker's [`TaskQueue`]; callers may sit on any
//! thread.
//!
//! # Example
//!
//! ```ignore
//! use spider_bridge_adapter::SpiderAdapter;
//!
//! let spider = SpiderAdapter::builder("sites/demo.js").build()?;
//! spider.init(None)?;
//! println!("{}", spider.home(true)?);
//! spider.destroy();
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use rquickjs::{Ctx, Value as JsValue};
use tracing::{debug, info, instrument};

use spider_bridge_common::{BridgeConfig, BridgeError, QueueError};
use spider_bridge_core::{
    FileLoader, JsResultExt, ModuleLoader, TaskQueue, Value, new_binding_name,
};
use spider_bridge_host::{CapabilityProvider, GuestLogs, HostGlobals, LocalStore, LogEntry};

use crate::proxy::{self, ProxyResponse};
use crate::session::{EngineSession, SessionSpec};

type Worker = Option<EngineSession>;

/// A loaded spider module.
///
/// Dropping the adapter destroys it.
pub struct SpiderAdapter {
    identifier: String,
    binding: String,
    queue: TaskQueue<Worker>,
    logs: GuestLogs,
    local: LocalStore,
}

impl SpiderAdapter {
    /// Create a builder for the module `identifier`.
    pub fn builder(identifier: impl Into<String>) -> SpiderAdapterBuilder {
        SpiderAdapterBuilder::new(identifier)
    }

    /// Run the spider's `init` with an optional extension value.
    ///
    /// An extension holding a JSON object or array is passed as structured
    /// data, anything else as the raw string. `None` passes `null`.
    ///
    /// # Errors
    ///
    /// Returns an error if the script fails or the adapter is destroyed.
    pub fn init(&self, extend: Option<&str>) -> Result<(), BridgeError> {
        let extend = extend.map_or(Value::Null, parse_extend);
        self.call("init", vec![extend]).map(drop)
    }

    /// Home page listing.
    ///
    /// # Errors
    ///
    /// Returns an error if the script fails.
    pub fn home(&self, filter: bool) -> Result<String, BridgeError> {
        self.call_text("home", vec![Value::Bool(filter)])
    }

    /// Home page video listing.
    ///
    /// # Errors
    ///
    /// Returns an error if the script fails.
    pub fn home_video(&self) -> Result<String, BridgeError> {
        self.call_text("homeVod", vec![])
    }

    /// Category listing for `tid` at page `page`.
    ///
    /// # Errors
    ///
    /// Returns an error if the script fails.
    pub fn category(
        &self,
        tid: &str,
        page: &str,
        filter: bool,
        extend: Option<&BTreeMap<String, String>>,
    ) -> Result<String, BridgeError> {
        let extend = extend.map_or_else(|| Value::Object(BTreeMap::new()), Value::from);
        self.call_text(
            "category",
            vec![Value::from(tid), Value::from(page), Value::Bool(filter), extend],
        )
    }

    /// Detail for the first of `ids`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidArgument`] if `ids` is empty.
    pub fn detail(&self, ids: &[String]) -> Result<String, BridgeError> {
        let id = ids
            .first()
            .ok_or_else(|| BridgeError::invalid_argument("detail requires at least one id"))?;
        self.call_text("detail", vec![Value::from(id.as_str())])
    }

    /// Search for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the script fails.
    pub fn search(&self, key: &str, quick: bool) -> Result<String, BridgeError> {
        self.call_text("search", vec![Value::from(key), Value::Bool(quick)])
    }

    /// Resolve playback of `id` from source `flag`.
    ///
    /// # Errors
    ///
    /// Returns an error if the script fails.
    pub fn player(&self, flag: &str, id: &str, vip_flags: &[String]) -> Result<String, BridgeError> {
        self.call_text(
            "play",
            vec![Value::from(flag), Value::from(id), Value::from(vip_flags)],
        )
    }

    /// Whether the spider needs its pages checked by hand.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidResult`] if the script does not return a boolean.
    pub fn manual_video_check(&self) -> Result<bool, BridgeError> {
        self.call_bool("sniffer", vec![])
    }

    /// Whether `url` points at a playable stream.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidResult`] if the script does not return a boolean.
    pub fn is_video_format(&self, url: &str) -> Result<bool, BridgeError> {
        self.call_bool("isVideo", vec![Value::from(url)])
    }

    /// Run the spider's proxy handler.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidResult`] if the script does not return an array.
    pub fn proxy(&self, params: &BTreeMap<String, String>) -> Result<ProxyResponse, BridgeError> {
        let args = vec![Value::from(params)];
        self.with_session(move |session| session.invoke_with("proxy", args, proxy::decode))
    }

    /// Call any exported function.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::FunctionMissing`] if there is no such function.
    pub fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, BridgeError> {
        let name = name.to_string();
        self.with_session(move |session| session.invoke(&name, args))
    }

    /// Tear down the engine and stop the worker.
    ///
    /// Pending operations are dropped. Later calls fail with
    /// [`BridgeError::Destroyed`]; calling `destroy` again does nothing.
    pub fn destroy(&self) {
        let identifier = self.identifier.clone();
        let stopped = self.queue.shutdown(move |slot: &mut Worker| {
            if slot.take().is_some() {
                debug!(spider = %identifier, "Engine session dropped");
            }
        });

        if stopped {
            info!(spider = %self.identifier, "Spider destroyed");
        }
    }

    /// Whether [`SpiderAdapter::destroy`] has run.
    pub fn is_destroyed(&self) -> bool {
        self.queue.is_closed()
    }

    /// The module identifier.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The global name the module's export is bound to.
    pub fn binding(&self) -> &str {
        &self.binding
    }

    /// Console output recorded so far, oldest first.
    pub fn logs(&self) -> Vec<LogEntry> {
        self.logs.snapshot()
    }

    /// The store behind the spider's `local` global.
    pub fn local_store(&self) -> &LocalStore {
        &self.local
    }

    fn call_text(&self, function: &'static str, args: Vec<Value>) -> Result<String, BridgeError> {
        self.with_session(move |session| session.invoke_with(function, args, script_text))
    }

    fn call_bool(&self, function: &'static str, args: Vec<Value>) -> Result<bool, BridgeError> {
        let value = self.call(function, args)?;
        value.as_bool().ok_or_else(|| {
            BridgeError::invalid_result(function, format!("expected a boolean, got {value}"))
        })
    }

    fn with_session<T, F>(&self, work: F) -> Result<T, BridgeError>
    where
        T: Send + 'static,
        F: FnOnce(&EngineSession) -> Result<T, BridgeError> + Send + 'static,
    {
        let result = self.queue.run(move |slot: &mut Worker| match slot {
            Some(session) => work(session),
            None => Err(BridgeError::Destroyed),
        });

        match result {
            Ok(outcome) => outcome,
            Err(QueueError::Closed | QueueError::Cancelled) => Err(BridgeError::Destroyed),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for SpiderAdapter {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for SpiderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpiderAdapter")
            .field("identifier", &self.identifier)
            .field("binding", &self.binding)
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

/// Builder for [`SpiderAdapter`].
pub struct SpiderAdapterBuilder {
    identifier: String,
    loader: Option<Arc<dyn ModuleLoader>>,
    capabilities: Option<Arc<dyn CapabilityProvider>>,
    local: Option<LocalStore>,
    config: BridgeConfig,
}

impl SpiderAdapterBuilder {
    fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            loader: None,
            capabilities: None,
            local: None,
            config: BridgeConfig::default(),
        }
    }

    /// Set the module loader. Defaults to a [`FileLoader`].
    #[must_use]
    pub fn loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Set the capability provider.
    #[must_use]
    pub fn capabilities(mut self, provider: Arc<dyn CapabilityProvider>) -> Self {
        self.capabilities = Some(provider);
        self
    }

    /// Share an existing `local` store.
    #[must_use]
    pub fn local_store(mut self, store: LocalStore) -> Self {
        self.local = Some(store);
        self
    }

    /// Set the bridge configuration.
    #[must_use]
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Load the module and bootstrap its engine.
    ///
    /// The source is fetched on the calling thread; everything else runs on
    /// the new worker.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidConfig`] for an unusable configuration,
    /// or an error if the module cannot be loaded, normalized or evaluated,
    /// or the worker thread cannot be spawned.
    #[instrument(skip(self), fields(spider = %self.identifier))]
    pub fn build(self) -> Result<SpiderAdapter, BridgeError> {
        let Self {
            identifier,
            loader,
            capabilities,
            local,
            config,
        } = self;

        config.validate()?;

        let loader = loader.unwrap_or_else(|| Arc::new(FileLoader::new()));
        let source = loader.load(&identifier)?;

        let binding = new_binding_name();
        let logs = GuestLogs::new(config.module.log_buffer);
        let local = local.unwrap_or_default();

        let spec = SessionSpec {
            identifier: identifier.clone(),
            binding: binding.clone(),
            source,
            globals: HostGlobals {
                spider: identifier.clone(),
                logs: logs.clone(),
                local: local.clone(),
                capabilities,
            },
            config: config.clone(),
        };

        let queue = TaskQueue::spawn(config.engine.worker_name.clone(), || None)?;
        let adapter = SpiderAdapter {
            identifier,
            binding,
            queue,
            logs,
            local,
        };

        // A failed bootstrap drops the adapter, which stops the worker.
        adapter
            .queue
            .run(move |slot: &mut Worker| {
                *slot = Some(EngineSession::bootstrap(spec)?);
                Ok::<_, BridgeError>(())
            })
            .map_err(BridgeError::from)??;

        info!(binding = %adapter.binding, "Spider ready");
        Ok(adapter)
    }
}

/// Text form of a script result.
///
/// Strings pass through, `null` and `undefined` become empty text and
/// anything else is rendered by the engine's `JSON.stringify`.
fn script_text<'js>(ctx: &Ctx<'js>, value: JsValue<'js>) -> Result<String, BridgeError> {
    if value.is_null() || value.is_undefined() {
        return Ok(String::new());
    }
    if let Some(text) = value.as_string() {
        return text.to_string().or_bridge(ctx);
    }
    match ctx.json_stringify(value).or_bridge(ctx)? {
        Some(text) => text.to_string().or_bridge(ctx),
        None => Ok(String::new()),
    }
}

fn parse_extend(text: &str) -> Value {
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = Value::from_json_str(text) {
            return value;
        }
    }
    Value::from(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spider_bridge_core::MemoryLoader;

    fn adapter(source: &str) -> SpiderAdapter {
        let loader = MemoryLoader::new().with_module("unit.js", source);
        SpiderAdapter::builder("unit.js")
            .loader(Arc::new(loader))
            .build()
            .unwrap()
    }

    #[test]
    fn test_parse_extend() {
        let object = parse_extend(r#"{"a": 1}"#);
        assert_eq!(object.as_object().unwrap()["a"], Value::Number(1.0));

        assert!(parse_extend("[1, 2]").as_array().is_some());
        assert_eq!(parse_extend("plain"), Value::from("plain"));
        assert_eq!(parse_extend("{broken"), Value::from("{broken"));
        assert_eq!(parse_extend("42"), Value::from("42"));
    }

    #[test]
    fn test_text_results() {
        let spider = adapter(
            r"export default {
                home() { return { list: [1], class: [], skip: undefined }; },
                homeVod() { return 'raw'; },
                search() { return null; },
                detail() {},
                play() { return 7; },
            }",
        );

        // Key order and dropped members follow the engine's JSON.stringify.
        assert_eq!(spider.home(false).unwrap(), r#"{"list":[1],"class":[]}"#);
        assert_eq!(spider.home_video().unwrap(), "raw");
        assert_eq!(spider.search("x", false).unwrap(), "");
        assert_eq!(spider.detail(&["1".into()]).unwrap(), "");
        assert_eq!(spider.player("a", "b", &[]).unwrap(), "7");
    }

    #[test]
    fn test_bool_results() {
        let spider = adapter(
            "export default { sniffer() { return true; }, isVideo(url) { return url.endsWith('.m3u8') ? true : 'no'; } }",
        );

        assert!(spider.manual_video_check().unwrap());
        assert!(spider.is_video_format("a.m3u8").unwrap());
        assert!(matches!(
            spider.is_video_format("a.html").unwrap_err(),
            BridgeError::InvalidResult { .. }
        ));
    }

    #[test]
    fn test_detail_requires_id() {
        let spider = adapter("export default { detail(id) { return 'D:' + id; } }");

        assert!(matches!(
            spider.detail(&[]).unwrap_err(),
            BridgeError::InvalidArgument { .. }
        ));
        assert_eq!(
            spider.detail(&["a".into(), "b".into()]).unwrap(),
            "D:a"
        );
    }

    #[test]
    fn test_binding_is_stable() {
        let spider = adapter("export default {}");
        let binding = spider.binding().to_string();
        assert!(binding.starts_with("__"));
        assert_eq!(spider.binding(), binding);
        assert_eq!(spider.identifier(), "unit.js");
    }

    #[test]
    fn test_destroy_twice() {
        let spider = adapter("export default { home() { return 'x'; } }");

        spider.destroy();
        spider.destroy();

        assert!(spider.is_destroyed());
        assert!(spider.home(true).unwrap_err().is_destroyed());
    }
}
