//! Error types for spider-bridge.
//!
//! This module defines a hierarchy of error types using `thiserror`:
//! - [`BridgeError`]: Top-level errors surfaced to host code
//! - [`NormalizeError`]: Module source rewriting failures
//! - [`CapabilityError`]: Errors from capability providers
//! - [`QueueError`]: Worker queue failures

use std::io;

use thiserror::Error;

/// Top-level bridge errors.
///
/// Only construction failures and per-operation failures reach the caller.
/// Capability injection and capability call failures are absorbed by the
/// bridge and never show up here as the result of a spider operation.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The module source could not be loaded.
    #[error("Module not found: {identifier} ({reason})")]
    ModuleNotFound {
        /// The identifier that was requested from the loader.
        identifier: String,
        /// Why the loader failed.
        reason: String,
    },

    /// The module source could not be rewritten to the canonical binding.
    #[error("Normalization failed: {0}")]
    Normalize(#[from] NormalizeError),

    /// The script threw, or evaluation of the module failed.
    #[error("Script error: {message}")]
    Script {
        /// Rendered exception (message and stack when available).
        message: String,
    },

    /// The normalized module did not assign its exported object.
    #[error("Exported object not bound under {binding}")]
    BindingMissing {
        /// The global binding name that was expected.
        binding: String,
    },

    /// The exported object has no function with the requested name.
    #[error("Spider function not found: {name}")]
    FunctionMissing {
        /// The name of the missing function.
        name: String,
    },

    /// The script returned a value the operation cannot use.
    #[error("Invalid result from {operation}: {reason}")]
    InvalidResult {
        /// The operation whose result was rejected.
        operation: String,
        /// Description of the mismatch.
        reason: String,
    },

    /// The caller passed an unusable argument.
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Description of why the argument was invalid.
        reason: String,
    },

    /// The engine failed outside of script code (allocation, conversion).
    #[error("Engine error: {reason}")]
    Engine {
        /// Description of the engine failure.
        reason: String,
    },

    /// A capability provider failed.
    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    /// The worker queue rejected or lost the work.
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// The adapter was destroyed.
    #[error("Spider has been destroyed")]
    Destroyed,

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Failures while rewriting module source to the canonical binding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// The dialect marker was present but its pattern did not match.
    #[error("{dialect} module does not match the expected pattern")]
    Unmatched {
        /// Name of the detected dialect.
        dialect: &'static str,
    },
}

/// Errors from capability providers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    /// The provider does not know the requested group.
    #[error("Unknown capability group: {group}")]
    UnknownGroup {
        /// The group that was requested.
        group: String,
    },

    /// The provider does not know the requested function.
    #[error("Unknown capability function: {name}")]
    UnknownFunction {
        /// The function that was requested.
        name: String,
    },

    /// The provider could not describe its surface.
    #[error("Capability discovery failed: {reason}")]
    Discovery {
        /// Description of the discovery failure.
        reason: String,
    },

    /// The function itself failed.
    #[error("Capability call failed: {reason}")]
    Failed {
        /// Description of the failure.
        reason: String,
    },
}

/// Worker queue errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The queue no longer accepts work.
    #[error("queue is closed")]
    Closed,

    /// The work was dropped before it started.
    #[error("work was cancelled before it ran")]
    Cancelled,

    /// The work panicked on the worker.
    #[error("work panicked on the worker thread")]
    Panicked,

    /// Blocking on the queue from its own worker would deadlock.
    #[error("cannot wait on the queue from its own worker thread")]
    Reentrant,
}

impl BridgeError {
    /// Create a new `ModuleNotFound` error.
    pub fn module_not_found(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModuleNotFound {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Create a new `Script` error.
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    /// Create a new `FunctionMissing` error.
    pub fn function_missing(name: impl Into<String>) -> Self {
        Self::FunctionMissing { name: name.into() }
    }

    /// Create a new `InvalidResult` error.
    pub fn invalid_result(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResult {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a new `InvalidArgument` error.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create a new `Engine` error.
    pub fn engine(reason: impl Into<String>) -> Self {
        Self::Engine {
            reason: reason.into(),
        }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the module source could not be loaded.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ModuleNotFound { .. })
    }

    /// Returns `true` if the adapter was torn down.
    pub fn is_destroyed(&self) -> bool {
        matches!(self, Self::Destroyed | Self::Queue(QueueError::Closed))
    }

    /// Returns `true` if the error was raised by script code.
    pub fn is_script(&self) -> bool {
        matches!(self, Self::Script { .. })
    }

    /// Returns `true` if this error happened while loading the module.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Self::ModuleNotFound { .. } | Self::Normalize(_) | Self::BindingMissing { .. }
        )
    }
}

impl CapabilityError {
    /// Create a new `Failed` error.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Create a new `Discovery` error.
    pub fn discovery(reason: impl Into<String>) -> Self {
        Self::Discovery {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::module_not_found("site.js", "no such file");
        assert_eq!(err.to_string(), "Module not found: site.js (no such file)");

        let err = BridgeError::Destroyed;
        assert_eq!(err.to_string(), "Spider has been destroyed");

        let err = NormalizeError::Unmatched {
            dialect: "eval-return",
        };
        assert_eq!(
            err.to_string(),
            "eval-return module does not match the expected pattern"
        );
    }

    #[test]
    fn test_error_from_capability() {
        let cap_err = CapabilityError::failed("boom");
        let bridge_err: BridgeError = cap_err.into();

        assert!(matches!(bridge_err, BridgeError::Capability(_)));
    }

    #[test]
    fn test_is_destroyed() {
        assert!(BridgeError::Destroyed.is_destroyed());
        assert!(BridgeError::Queue(QueueError::Closed).is_destroyed());
        assert!(!BridgeError::Queue(QueueError::Cancelled).is_destroyed());
        assert!(!BridgeError::script("x").is_destroyed());
    }

    #[test]
    fn test_is_not_found() {
        assert!(BridgeError::module_not_found("a", "b").is_not_found());
        assert!(!BridgeError::Destroyed.is_not_found());
    }

    #[test]
    fn test_is_construction() {
        assert!(BridgeError::module_not_found("a", "b").is_construction());
        assert!(
            BridgeError::BindingMissing {
                binding: "__x__".into()
            }
            .is_construction()
        );
        assert!(!BridgeError::function_missing("home").is_construction());
    }
}
