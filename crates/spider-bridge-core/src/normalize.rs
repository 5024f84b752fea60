//! Module source normalization.
//!
//! Spiders come in three export dialects. [`ModuleNormalizer`] rewrites each
//! of them so that evaluating the module assigns the exported object to
//! `globalThis.<binding>`:
//!
//! | dialect | marker | rewrite |
//! |---|---|---|
//! | [`Dialect::EvalReturn`] | `__jsEvalReturn` | prefix + `globalThis.<binding> = <returned expression>` |
//! | [`Dialect::Placeholder`] | `__JS_SPIDER__` | every marker becomes `globalThis.<binding>` |
//! | [`Dialect::DefaultExport`] | anything else | first `export default ... {` becomes `globalThis.<binding> = {` |
//!
//! Detection is ordered; the first marker found wins.

use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::LazyLock;

use regex::{NoExpand, Regex};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use spider_bridge_common::NormalizeError;

const EVAL_RETURN_MARKER: &str = "__jsEvalReturn";
const PLACEHOLDER_MARKER: &str = "__JS_SPIDER__";

static EVAL_RETURN_FN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"export\s+function\s+__jsEvalReturn.*?[{]").expect("valid eval-return regex")
});

static RETURN_EXPR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s?return\s?([\s\S]*)\s?\}").expect("valid return regex"));

static DEFAULT_EXPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"export default.*?[{]").expect("valid default-export regex"));

/// Generate a fresh binding name.
///
/// The name is a valid identifier and unique per call, so several modules can
/// share one global scope pattern without clobbering each other.
pub fn new_binding_name() -> String {
    format!("__{}__", Uuid::new_v4().simple())
}

/// Export convention of a spider module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `export function __jsEvalReturn() { return { ... } }`
    EvalReturn,
    /// `__JS_SPIDER__ = { ... }`
    Placeholder,
    /// `export default { ... }`
    DefaultExport,
}

impl Dialect {
    /// Short name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Dialect::EvalReturn => "eval-return",
            Dialect::Placeholder => "placeholder",
            Dialect::DefaultExport => "default-export",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rewrites spider source to the canonical binding form.
#[derive(Debug, Clone, Copy)]
pub struct ModuleNormalizer {
    strict: bool,
}

impl Default for ModuleNormalizer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ModuleNormalizer {
    /// Create a normalizer.
    ///
    /// A strict normalizer fails on modules whose dialect pattern does not
    /// match; a lenient one passes them through unchanged.
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    /// Whether unmatched modules are rejected.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Detect the export dialect of `source`.
    pub fn detect(source: &str) -> Dialect {
        if source.contains(EVAL_RETURN_MARKER) {
            Dialect::EvalReturn
        } else if source.contains(PLACEHOLDER_MARKER) {
            Dialect::Placeholder
        } else {
            Dialect::DefaultExport
        }
    }

    /// Rewrite `source` written in `dialect` to bind its export under `binding`.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::Unmatched`] when the dialect's pattern is not
    /// found and the normalizer is strict.
    pub fn rewrite(
        &self,
        source: &str,
        dialect: Dialect,
        binding: &str,
    ) -> Result<String, NormalizeError> {
        let target = format!("globalThis.{binding}");

        let rewritten = match dialect {
            Dialect::EvalReturn => rewrite_eval_return(source, &target),
            Dialect::Placeholder => Some(source.replace(PLACEHOLDER_MARKER, &target)),
            Dialect::DefaultExport => DEFAULT_EXPORT.is_match(source).then(|| {
                DEFAULT_EXPORT
                    .replace(source, NoExpand(&format!("{target} = {{")))
                    .into_owned()
            }),
        };

        match rewritten {
            Some(text) => Ok(text),
            None if self.strict => Err(NormalizeError::Unmatched {
                dialect: dialect.name(),
            }),
            None => {
                warn!(
                    dialect = %dialect,
                    "Module does not match its dialect pattern, evaluating unchanged"
                );
                Ok(source.to_string())
            }
        }
    }

    /// Detect and rewrite in one step.
    ///
    /// # Errors
    ///
    /// See [`ModuleNormalizer::rewrite`].
    #[instrument(skip(self, source), fields(source_len = source.len()))]
    pub fn normalize(&self, source: &str, binding: &str) -> Result<String, NormalizeError> {
        let dialect = Self::detect(source);
        let normalized = self.rewrite(source, dialect, binding)?;

        debug!(
            dialect = %dialect,
            content_hash = %compute_hash(source.as_bytes()),
            "Module normalized"
        );

        Ok(normalized)
    }
}

fn rewrite_eval_return(source: &str, target: &str) -> Option<String> {
    let opener = EVAL_RETURN_FN.find(source)?;
    let (before, body) = (&source[..opener.start()], &source[opener.end()..]);
    let body = EVAL_RETURN_FN
        .find(body)
        .map_or(body, |next| &body[..next.start()]);
    let expression = RETURN_EXPR.captures(body)?.get(1)?.as_str();
    Some(format!("{before}{target} = {expression}"))
}

/// Compute a hash of the given bytes.
fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BINDING: &str = "__abc__";

    #[test]
    fn test_detect() {
        assert_eq!(
            ModuleNormalizer::detect("export function __jsEvalReturn() { return {} }"),
            Dialect::EvalReturn
        );
        assert_eq!(
            ModuleNormalizer::detect("__JS_SPIDER__ = {}"),
            Dialect::Placeholder
        );
        assert_eq!(
            ModuleNormalizer::detect("export default {}"),
            Dialect::DefaultExport
        );
    }

    #[test]
    fn test_eval_return_rewrite() {
        let source = "import { md5 } from 'lib';\nconst site = 'x';\nexport function __jsEvalReturn() {\n  return { init() {}, home(f) { return 'R:' + f } };\n}\n";
        let normalized = ModuleNormalizer::default()
            .normalize(source, BINDING)
            .unwrap();

        assert!(normalized.starts_with("import { md5 } from 'lib';\nconst site = 'x';\n"));
        assert!(normalized.contains("globalThis.__abc__ = { init() {}, home(f) { return 'R:' + f } };"));
        assert!(!normalized.contains("__jsEvalReturn"));
    }

    #[test]
    fn test_placeholder_rewrite_replaces_all() {
        let source = "__JS_SPIDER__ = { home() {} };\n__JS_SPIDER__.extra = 1;";
        let normalized = ModuleNormalizer::default()
            .normalize(source, BINDING)
            .unwrap();

        assert_eq!(
            normalized,
            "globalThis.__abc__ = { home() {} };\nglobalThis.__abc__.extra = 1;"
        );
    }

    #[test]
    fn test_default_export_rewrite_first_only() {
        let source = "export const helper = 1;\nexport default {\n  home() { return `export default {` }\n};";
        let normalized = ModuleNormalizer::default()
            .normalize(source, BINDING)
            .unwrap();

        assert_eq!(
            normalized,
            "export const helper = 1;\nglobalThis.__abc__ = {\n  home() { return `export default {` }\n};"
        );
    }

    #[test]
    fn test_eval_return_takes_precedence() {
        let source = "const note = '__JS_SPIDER__';\nexport function __jsEvalReturn() {\n  return { marker: note };\n}";
        let normalized = ModuleNormalizer::default()
            .normalize(source, BINDING)
            .unwrap();

        assert!(normalized.contains("const note = '__JS_SPIDER__';"));
        assert!(normalized.contains("globalThis.__abc__ = { marker: note };"));
    }

    #[test]
    fn test_unmatched_eval_return_strict() {
        let source = "function __jsEvalReturn() { return {} }";
        let err = ModuleNormalizer::new(true)
            .normalize(source, BINDING)
            .unwrap_err();

        assert_eq!(
            err,
            NormalizeError::Unmatched {
                dialect: "eval-return"
            }
        );
    }

    #[test]
    fn test_unmatched_lenient_passes_through() {
        let source = "function __jsEvalReturn() { return {} }";
        let normalized = ModuleNormalizer::new(false)
            .normalize(source, BINDING)
            .unwrap();
        assert_eq!(normalized, source);

        let source = "globalThis.whatever = {};";
        let normalized = ModuleNormalizer::new(false)
            .normalize(source, BINDING)
            .unwrap();
        assert_eq!(normalized, source);
    }

    #[test]
    fn test_missing_default_export_strict() {
        let err = ModuleNormalizer::default()
            .normalize("const x = 1;", BINDING)
            .unwrap_err();
        assert_eq!(
            err,
            NormalizeError::Unmatched {
                dialect: "default-export"
            }
        );
    }

    #[test]
    fn test_binding_is_not_expanded() {
        let normalized = ModuleNormalizer::default()
            .normalize("export default { a: 1 }", "__$1__")
            .unwrap();
        assert_eq!(normalized, "globalThis.__$1__ = { a: 1 }");
    }

    #[test]
    fn test_binding_names_are_unique_identifiers() {
        let a = new_binding_name();
        let b = new_binding_name();

        assert_ne!(a, b);
        assert!(a.starts_with("__") && a.ends_with("__"));
        assert!(a.chars().all(|c| c == '_' || c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_compute_hash() {
        let hash1 = compute_hash(b"hello");
        let hash2 = compute_hash(b"hello");
        let hash3 = compute_hash(b"world");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 16);
    }
}
