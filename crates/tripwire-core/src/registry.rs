//! Explicit function registry.
//!
//! A [`FunctionRegistry`] maps function names to implementation handles,
//! populated at startup and queried by exact key. Two namespaces exist to
//! keep trigger-internal functions separate from general ones; resolution
//! checks the trigger namespace first, then the function namespace.
//!
//! Whether an implementation is blocking is declared at registration time:
//! async implementations are stored as boxed-future factories and awaited on
//! the runtime, blocking ones are stored as plain closures and dispatched to
//! the blocking pool by the executor.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;

use crate::errors::FunctionError;

/// Which namespace a function is registered under.
///
/// Lookup order is `Trigger` first, then `Function`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Trigger,
    Function,
}

type AsyncHandle = Arc<dyn Fn() -> BoxFuture<'static, Result<Value, FunctionError>> + Send + Sync>;
type BlockingHandle = Arc<dyn Fn() -> Result<Value, FunctionError> + Send + Sync>;

/// An implementation handle with its blocking capability made explicit.
#[derive(Clone)]
pub enum FunctionImpl {
    /// Non-blocking; awaited in place on the calling task.
    Async(AsyncHandle),
    /// Blocking; must run on the worker pool.
    Blocking(BlockingHandle),
}

struct FunctionEntry {
    implementation: FunctionImpl,
    source: String,
}

/// Thread-safe registry of function implementations.
///
/// Cheaply cloneable (inner state is `Arc`-wrapped); all clones share the
/// same underlying registry.
#[derive(Clone)]
pub struct FunctionRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

#[derive(Default)]
struct RegistryInner {
    triggers: BTreeMap<String, FunctionEntry>,
    functions: BTreeMap<String, FunctionEntry>,
}

impl RegistryInner {
    fn namespace(&self, ns: Namespace) -> &BTreeMap<String, FunctionEntry> {
        match ns {
            Namespace::Trigger => &self.triggers,
            Namespace::Function => &self.functions,
        }
    }

    fn namespace_mut(&mut self, ns: Namespace) -> &mut BTreeMap<String, FunctionEntry> {
        match ns {
            Namespace::Trigger => &mut self.triggers,
            Namespace::Function => &mut self.functions,
        }
    }
}

impl FunctionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner::default())),
        }
    }

    /// Register an async implementation, replacing any existing entry with
    /// the same name in the same namespace.
    ///
    /// `source` is a human-readable description or source snippet surfaced
    /// by the diagnostic listing endpoint.
    pub fn register_async<F, Fut>(&self, ns: Namespace, name: &str, source: &str, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, FunctionError>> + Send + 'static,
    {
        let handle: AsyncHandle = Arc::new(move || f().boxed());
        self.insert(ns, name, source, FunctionImpl::Async(handle));
    }

    /// Register a blocking implementation.
    pub fn register_blocking<F>(&self, ns: Namespace, name: &str, source: &str, f: F)
    where
        F: Fn() -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        self.insert(ns, name, source, FunctionImpl::Blocking(Arc::new(f)));
    }

    fn insert(&self, ns: Namespace, name: &str, source: &str, implementation: FunctionImpl) {
        let mut inner = self.inner.write();
        inner.namespace_mut(ns).insert(
            name.to_string(),
            FunctionEntry {
                implementation,
                source: source.to_string(),
            },
        );
    }

    /// Resolve a name to an implementation handle.
    ///
    /// Checks the trigger namespace first, then the function namespace.
    pub fn lookup(&self, name: &str) -> Option<FunctionImpl> {
        let inner = self.inner.read();
        inner
            .triggers
            .get(name)
            .or_else(|| inner.functions.get(name))
            .map(|entry| entry.implementation.clone())
    }

    /// Returns `true` if `name` resolves in either namespace.
    pub fn contains(&self, name: &str) -> bool {
        let inner = self.inner.read();
        inner.triggers.contains_key(name) || inner.functions.contains_key(name)
    }

    /// The registered source text for `name`, if any.
    pub fn source(&self, name: &str) -> Option<String> {
        let inner = self.inner.read();
        inner
            .triggers
            .get(name)
            .or_else(|| inner.functions.get(name))
            .map(|entry| entry.source.clone())
    }

    /// Remove an entry from one namespace. Returns `true` if it existed.
    pub fn remove(&self, ns: Namespace, name: &str) -> bool {
        self.inner.write().namespace_mut(ns).remove(name).is_some()
    }

    /// Names registered in a namespace, sorted.
    pub fn names(&self, ns: Namespace) -> Vec<String> {
        self.inner.read().namespace(ns).keys().cloned().collect()
    }

    /// Total number of registered functions across both namespaces.
    pub fn len(&self) -> usize {
        let inner = self.inner.read();
        inner.triggers.len() + inner.functions.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry_with(ns: Namespace, name: &str, value: Value) -> FunctionRegistry {
        let registry = FunctionRegistry::new();
        registry.register_async(ns, name, "test", move || {
            let value = value.clone();
            async move { Ok(value) }
        });
        registry
    }

    #[test]
    fn lookup_miss_on_empty() {
        let registry = FunctionRegistry::new();
        assert!(registry.lookup("anything").is_none());
        assert!(!registry.contains("anything"));
    }

    #[test]
    fn trigger_namespace_wins() {
        let registry = FunctionRegistry::new();
        registry.register_blocking(Namespace::Function, "report", "fn", || {
            Ok(json!({"from": "function"}))
        });
        registry.register_blocking(Namespace::Trigger, "report", "trig", || {
            Ok(json!({"from": "trigger"}))
        });

        match registry.lookup("report").expect("resolves") {
            FunctionImpl::Blocking(f) => {
                assert_eq!(f().expect("runs"), json!({"from": "trigger"}));
            }
            FunctionImpl::Async(_) => panic!("expected blocking handle"),
        }
        assert_eq!(registry.source("report").as_deref(), Some("trig"));
    }

    #[test]
    fn register_replaces_existing() {
        let registry = registry_with(Namespace::Function, "f", json!(1));
        registry.register_blocking(Namespace::Function, "f", "v2", || Ok(json!(2)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.source("f").as_deref(), Some("v2"));
    }

    #[test]
    fn remove_entry() {
        let registry = registry_with(Namespace::Function, "f", json!(1));
        assert!(registry.remove(Namespace::Function, "f"));
        assert!(!registry.remove(Namespace::Function, "f"));
        assert!(registry.is_empty());
    }

    #[test]
    fn clone_shares_state() {
        let registry = FunctionRegistry::new();
        let clone = registry.clone();
        registry.register_blocking(Namespace::Function, "f", "", || Ok(json!(null)));
        assert!(clone.contains("f"));
    }

    #[test]
    fn names_sorted() {
        let registry = FunctionRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register_blocking(Namespace::Function, name, "", || Ok(json!(null)));
        }
        assert_eq!(registry.names(Namespace::Function), ["alpha", "mid", "zeta"]);
        assert!(registry.names(Namespace::Trigger).is_empty());
    }
}
