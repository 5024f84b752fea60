//! Per-rule key/value storage exposed to spiders as `local`.
//!
//! Scripts call `local.get(rule, key)`, `local.set(rule, key, value)` and
//! `local.delete(rule, key)`. Entries are namespaced by rule so unrelated
//! spiders sharing one store cannot collide. A single [`LocalStore`] may be
//! shared by any number of adapters.

use std::sync::Arc;

use dashmap::DashMap;
use rquickjs::convert::Coerced;
use rquickjs::{Ctx, Function, Object};
use tracing::trace;

/// Thread-safe string store shared across spider sessions.
#[derive(Debug, Clone, Default)]
pub struct LocalStore {
    entries: Arc<DashMap<(String, String), String>>,
}

impl LocalStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the value stored for `key` under `rule`.
    pub fn get(&self, rule: &str, key: &str) -> Option<String> {
        self.entries
            .get(&(rule.to_string(), key.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Store `value` for `key` under `rule`, returning the previous value.
    pub fn set(
        &self,
        rule: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Option<String> {
        self.entries.insert((rule.into(), key.into()), value.into())
    }

    /// Remove `key` under `rule`, returning the removed value.
    pub fn delete(&self, rule: &str, key: &str) -> Option<String> {
        self.entries
            .remove(&(rule.to_string(), key.to_string()))
            .map(|(_, value)| value)
    }

    /// Number of stored entries across all rules.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Install the store on the global object of `ctx` as `name`.
    ///
    /// `get` of a missing key yields an empty string.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot allocate the binding.
    pub fn install(&self, ctx: &Ctx<'_>, name: &str) -> rquickjs::Result<()> {
        let object = Object::new(ctx.clone())?;

        let store = self.clone();
        object.set(
            "get",
            Function::new(
                ctx.clone(),
                move |rule: Coerced<String>, key: Coerced<String>| -> String {
                    store.get(&rule.0, &key.0).unwrap_or_default()
                },
            )?,
        )?;

        let store = self.clone();
        object.set(
            "set",
            Function::new(
                ctx.clone(),
                move |rule: Coerced<String>, key: Coerced<String>, value: Coerced<String>| {
                    trace!(rule = %rule.0, key = %key.0, "local.set");
                    store.set(rule.0, key.0, value.0);
                },
            )?,
        )?;

        let store = self.clone();
        object.set(
            "delete",
            Function::new(
                ctx.clone(),
                move |rule: Coerced<String>, key: Coerced<String>| {
                    store.delete(&rule.0, &key.0);
                },
            )?,
        )?;

        ctx.globals().set(name, object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spider_bridge_common::EngineConfig;
    use spider_bridge_core::ScriptEngine;

    #[test]
    fn test_namespaced_by_rule() {
        let store = LocalStore::new();
        store.set("site-a", "token", "1");
        store.set("site-b", "token", "2");

        assert_eq!(store.get("site-a", "token").as_deref(), Some("1"));
        assert_eq!(store.get("site-b", "token").as_deref(), Some("2"));
        assert_eq!(store.len(), 2);

        assert_eq!(store.delete("site-a", "token").as_deref(), Some("1"));
        assert!(store.get("site-a", "token").is_none());

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_script_access() {
        let engine = ScriptEngine::new(&EngineConfig::default()).unwrap();
        let store = LocalStore::new();
        store.set("rule", "seeded", "yes");

        let seen: String = engine.context().with(|ctx| {
            store.install(&ctx, "local").unwrap();
            ctx.eval(
                r#"
                local.set("rule", "cookie", "abc");
                local.set("rule", "count", 3);
                local.delete("rule", "seeded");
                local.get("rule", "cookie") + "|" + local.get("rule", "missing") + "|" + local.get("rule", "seeded");
                "#,
            )
            .unwrap()
        });

        assert_eq!(seen, "abc||");
        assert_eq!(store.get("rule", "count").as_deref(), Some("3"));
        assert!(store.get("rule", "seeded").is_none());
    }

    #[test]
    fn test_clones_share_entries() {
        let store = LocalStore::new();
        let other = store.clone();
        other.set("r", "k", "v");
        assert_eq!(store.get("r", "k").as_deref(), Some("v"));
    }
}
