//! Module source providers.
//!
//! A [`ModuleLoader`] turns a spider identifier into module source text.
//! Fetching and caching remote sources is the host's business; this crate
//! ships a filesystem loader and an in-memory loader, and accepts any
//! closure with the right shape.

use std::path::{Path, PathBuf};

use dashmap::DashMap;
use tracing::debug;
use url::Url;

use spider_bridge_common::BridgeError;

/// Supplies module source text for an identifier.
pub trait ModuleLoader: Send + Sync {
    /// Load the full source of `identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ModuleNotFound`] when the source is unavailable.
    fn load(&self, identifier: &str) -> Result<String, BridgeError>;
}

impl<F> ModuleLoader for F
where
    F: Fn(&str) -> Result<String, BridgeError> + Send + Sync,
{
    fn load(&self, identifier: &str) -> Result<String, BridgeError> {
        self(identifier)
    }
}

/// Loads modules from the local filesystem.
///
/// Identifiers may be plain paths or `file://` URLs. Relative paths are
/// resolved against the configured root, if any.
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    root: Option<PathBuf>,
}

impl FileLoader {
    /// Create a loader resolving relative paths against the working directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loader resolving relative paths against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Resolve an identifier to a filesystem path.
    ///
    /// # Errors
    ///
    /// Returns an error for URLs with a scheme other than `file`.
    pub fn resolve(&self, identifier: &str) -> Result<PathBuf, BridgeError> {
        let path = match Url::parse(identifier) {
            // Single letters are Windows drive prefixes, not schemes.
            Ok(url) if url.scheme().len() > 1 => {
                if url.scheme() != "file" {
                    return Err(BridgeError::module_not_found(
                        identifier,
                        format!("unsupported scheme '{}'", url.scheme()),
                    ));
                }
                url.to_file_path().map_err(|()| {
                    BridgeError::module_not_found(identifier, "invalid file URL")
                })?
            }
            _ => PathBuf::from(identifier),
        };

        Ok(match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path,
        })
    }
}

impl ModuleLoader for FileLoader {
    fn load(&self, identifier: &str) -> Result<String, BridgeError> {
        let path = self.resolve(identifier)?;
        let source = read(&path).map_err(|e| BridgeError::module_not_found(identifier, e))?;
        debug!(path = %path.display(), bytes = source.len(), "Module source loaded");
        Ok(source)
    }
}

fn read(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))
}

/// Serves module sources registered in memory.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    modules: DashMap<String, String>,
}

impl MemoryLoader {
    /// Create an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the source for `identifier`.
    pub fn insert(&self, identifier: impl Into<String>, source: impl Into<String>) {
        self.modules.insert(identifier.into(), source.into());
    }

    /// Builder-style [`MemoryLoader::insert`].
    #[must_use]
    pub fn with_module(self, identifier: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(identifier, source);
        self
    }

    /// Remove the source for `identifier`.
    pub fn remove(&self, identifier: &str) -> Option<String> {
        self.modules.remove(identifier).map(|(_, v)| v)
    }

    /// Number of registered modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if no module is registered.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleLoader for MemoryLoader {
    fn load(&self, identifier: &str) -> Result<String, BridgeError> {
        self.modules
            .get(identifier)
            .map(|source| source.value().clone())
            .ok_or_else(|| BridgeError::module_not_found(identifier, "not registered"))
    }
}
