//! Console shim for spider scripts.
//!
//! Spiders log through `console.log` and friends. Each call is:
//! 1. Recorded in the spider's [`GuestLogs`] buffer for later retrieval
//! 2. Emitted via the `tracing` crate for observability

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rquickjs::convert::Coerced;
use rquickjs::function::Rest;
use rquickjs::{Ctx, Function, Object, Type, Value as JsValue};
use tracing::{debug, error, info, warn};

/// Log level for guest logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug-level messages.
    Debug,
    /// Informational messages.
    Info,
    /// Warning messages.
    Warn,
    /// Error messages.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// A single log entry from guest code.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Log level.
    pub level: LogLevel,

    /// Log message content.
    pub message: String,

    /// Timestamp when the log was recorded.
    pub timestamp: Instant,
}

/// Bounded buffer of guest log entries, shared between the worker and readers.
#[derive(Debug, Clone)]
pub struct GuestLogs {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl GuestLogs {
    /// Create a buffer keeping the newest `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest one when full.
    pub fn push(&self, level: LogLevel, message: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(LogEntry {
            level,
            message: message.into(),
            timestamp: Instant::now(),
        });
    }

    /// Copy out the buffered entries, oldest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Remove and return the buffered entries.
    pub fn drain(&self) -> Vec<LogEntry> {
        self.entries.lock().drain(..).collect()
    }

    /// Number of buffered entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Host implementation of the `console` global.
pub struct LoggingHost;

impl LoggingHost {
    /// Log a message at the specified level.
    ///
    /// # Arguments
    ///
    /// * `logs` - The buffer to record the entry in
    /// * `spider` - Identifier of the spider, attached to the tracing event
    /// * `level` - The log level
    /// * `message` - The log message
    pub fn log(logs: &GuestLogs, spider: &str, level: LogLevel, message: &str) {
        logs.push(level, message);

        match level {
            LogLevel::Debug => debug!(spider, guest_log = true, "{}", message),
            LogLevel::Info => info!(spider, guest_log = true, "{}", message),
            LogLevel::Warn => warn!(spider, guest_log = true, "{}", message),
            LogLevel::Error => error!(spider, guest_log = true, "{}", message),
        }
    }

    /// Install `console` on the global object of `ctx`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot allocate the console object.
    pub fn install<'js>(ctx: &Ctx<'js>, spider: &str, logs: &GuestLogs) -> rquickjs::Result<()> {
        let spider: Arc<str> = Arc::from(spider);
        let console = Object::new(ctx.clone())?;

        for method in CONSOLE_METHODS {
            let level = level_from_method(method);
            let spider = Arc::clone(&spider);
            let logs = logs.clone();
            let function = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'js>, args: Rest<JsValue<'js>>| {
                    let message = args
                        .0
                        .into_iter()
                        .map(|arg| render(&ctx, arg))
                        .collect::<Vec<_>>()
                        .join(" ");
                    Self::log(&logs, &spider, level, &message);
                },
            )?
            .with_name(method)?;
            console.set(method, function)?;
        }

        ctx.globals().set("console", console)
    }
}

/// Render one console argument the way a browser console would print it.
fn render<'js>(ctx: &Ctx<'js>, value: JsValue<'js>) -> String {
    match value.type_of() {
        Type::String | Type::Exception | Type::Undefined | Type::Symbol => value
            .get::<Coerced<String>>()
            .map(|text| text.0)
            .unwrap_or_default(),
        _ => match ctx.json_stringify(value.clone()) {
            Ok(Some(text)) => text.to_string().unwrap_or_default(),
            _ => value
                .get::<Coerced<String>>()
                .map(|text| text.0)
                .unwrap_or_default(),
        },
    }
}

/// `console` methods installed for guest code.
pub const CONSOLE_METHODS: [&str; 6] = ["trace", "debug", "log", "info", "warn", "error"];

/// Map a `console` method name to a [`LogLevel`].
///
/// Unknown names default to Info.
pub fn level_from_method(method: &str) -> LogLevel {
    match method {
        "debug" | "trace" => LogLevel::Debug,
        "warn" => LogLevel::Warn,
        "error" => LogLevel::Error,
        _ => LogLevel::Info,
    }
}
