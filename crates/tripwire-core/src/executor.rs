//! Uniform function execution.
//!
//! [`FunctionExecutor`] resolves a function name through the registry and
//! invokes the implementation, normalizing the calling convention: async
//! implementations are awaited in place on the calling task, blocking ones
//! are dispatched to tokio's blocking pool so they cannot stall the
//! scheduler. Either way the caller awaits one uniform [`Value`] result.
//!
//! Nothing escapes this module: a missing implementation, a returned error,
//! or a panic all become a structured `{"error": message}` value.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde_json::{json, Value};

use crate::registry::{FunctionImpl, FunctionRegistry};

#[derive(Clone)]
pub struct FunctionExecutor {
    registry: FunctionRegistry,
}

impl FunctionExecutor {
    pub fn new(registry: FunctionRegistry) -> Self {
        Self { registry }
    }

    /// The registry this executor resolves against.
    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Resolve `name` and run its implementation.
    ///
    /// Returns the implementation's value, or `{"error": message}` when the
    /// name does not resolve, the implementation fails, or it panics.
    ///
    /// A top-level `"error"` string key is reserved as the failure sentinel:
    /// trigger firings classify the result by its presence, so a successful
    /// implementation must not return one as ordinary data.
    pub async fn execute(&self, name: &str) -> Value {
        tracing::info!(function = %name, "executing function");

        let Some(implementation) = self.registry.lookup(name) else {
            tracing::error!(function = %name, "no implementation registered");
            return json!({"error": "Function not found"});
        };

        let result = match implementation {
            FunctionImpl::Async(f) => match AssertUnwindSafe(f()).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(format!("function {name} panicked").into()),
            },
            FunctionImpl::Blocking(f) => match tokio::task::spawn_blocking(move || f()).await {
                Ok(result) => result,
                Err(join_err) => Err(format!("function {name} panicked: {join_err}").into()),
            },
        };

        match result {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(function = %name, error = %e, "function execution failed");
                json!({"error": e.to_string()})
            }
        }
    }
}
