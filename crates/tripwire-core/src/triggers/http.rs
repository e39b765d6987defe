//! HTTP trigger handler.
//!
//! Does **not** start or mutate an HTTP server. Setup registers an
//! [`HttpRoute`] into the shared [`RouteTable`]; the API layer mounts the
//! table and calls [`fire_http`] on each request. Request-handling errors
//! are converted to a `{status: error, message}` payload, never to a
//! transport-level failure.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::SetupError;
use crate::executor::FunctionExecutor;
use crate::notify::NotificationSink;

/// A route definition for the API layer to mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HttpRoute {
    /// URL path, e.g. `/api/v1/run-report`.
    pub path: String,
    /// HTTP method, uppercased, e.g. `POST`.
    pub method: String,
    /// The function this route fires.
    pub function: String,
}

/// Shared table of routes registered by HTTP trigger handlers.
///
/// Cheaply cloneable; all clones share the same underlying table.
#[derive(Clone, Default)]
pub struct RouteTable {
    inner: Arc<RwLock<Vec<HttpRoute>>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route in registration order.
    ///
    /// Each `(method, path)` pair may be registered once; a second
    /// registration fails so the caller can isolate the colliding function
    /// instead of letting the server layer panic at mount time.
    pub fn insert(&self, route: HttpRoute) -> Result<(), SetupError> {
        let mut inner = self.inner.write();
        if inner
            .iter()
            .any(|existing| existing.path == route.path && existing.method == route.method)
        {
            return Err(SetupError::DuplicateRoute {
                method: route.method,
                path: route.path,
            });
        }
        inner.push(route);
        Ok(())
    }

    /// Snapshot of all registered routes.
    pub fn routes(&self) -> Vec<HttpRoute> {
        self.inner.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

/// Handler for HTTP-triggered functions.
pub struct HttpTriggerHandler {
    pub(crate) function: String,
    pub(crate) endpoint: String,
    pub(crate) method: String,
    pub(crate) sink: NotificationSink,
    pub(crate) routes: Option<RouteTable>,
}

impl HttpTriggerHandler {
    /// Register the route with the shared table.
    pub async fn setup(&self) -> Result<(), SetupError> {
        let routes = self
            .routes
            .as_ref()
            .ok_or_else(|| SetupError::missing("HTTP route table"))?;

        self.sink
            .broadcast(format!(
                "Setting up HTTP trigger for function: {}",
                self.function
            ))
            .await;

        routes.insert(HttpRoute {
            path: self.endpoint.clone(),
            method: self.method.clone(),
            function: self.function.clone(),
        })?;
        tracing::debug!(
            function = %self.function,
            method = %self.method,
            path = %self.endpoint,
            "registered HTTP trigger route"
        );
        Ok(())
    }
}

/// One HTTP firing: log start, execute, log outcome, return the response
/// payload.
///
/// Always produces a normal `{status, message?}` body — an execution
/// failure is reported through the sink, not propagated to the transport.
pub async fn fire_http(
    executor: &FunctionExecutor,
    sink: &NotificationSink,
    function: &str,
) -> Value {
    sink.broadcast(format!("Executing HTTP-triggered function: {function}"))
        .await;

    let result = executor.execute(function).await;
    match result.get("error").and_then(|v| v.as_str()) {
        Some(message) => {
            sink.broadcast(format!("Error executing function {function}: {message}"))
                .await;
            json!({"status": "error", "message": message})
        }
        None => {
            sink.broadcast(format!("Successfully completed function: {function}"))
                .await;
            json!({"status": "success"})
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FunctionError;
    use crate::registry::{FunctionRegistry, Namespace};
    use tokio::sync::mpsc;

    fn handler(routes: Option<RouteTable>) -> HttpTriggerHandler {
        HttpTriggerHandler {
            function: "run_report".into(),
            endpoint: "/api/v1/run-report".into(),
            method: "POST".into(),
            sink: NotificationSink::new(),
            routes,
        }
    }

    #[tokio::test]
    async fn setup_registers_route() {
        let routes = RouteTable::new();
        handler(Some(routes.clone())).setup().await.expect("setup");

        let registered = routes.routes();
        assert_eq!(
            registered,
            vec![HttpRoute {
                path: "/api/v1/run-report".into(),
                method: "POST".into(),
                function: "run_report".into(),
            }]
        );
    }

    #[tokio::test]
    async fn duplicate_route_rejected_without_dropping_first() {
        let routes = RouteTable::new();
        handler(Some(routes.clone())).setup().await.expect("setup");

        let mut second = handler(Some(routes.clone()));
        second.function = "other_fn".into();
        let err = second.setup().await.unwrap_err();
        assert!(matches!(err, SetupError::DuplicateRoute { .. }));

        // The original registration survives untouched.
        let registered = routes.routes();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].function, "run_report");
    }

    #[tokio::test]
    async fn same_path_different_method_allowed() {
        let routes = RouteTable::new();
        handler(Some(routes.clone())).setup().await.expect("setup");

        let mut get_handler = handler(Some(routes.clone()));
        get_handler.method = "GET".into();
        get_handler.setup().await.expect("distinct method");
        assert_eq!(routes.len(), 2);
    }

    #[tokio::test]
    async fn setup_without_route_table_fails() {
        let err = handler(None).setup().await.unwrap_err();
        assert!(matches!(err, SetupError::MissingDependency { .. }));
    }

    #[tokio::test]
    async fn fire_success_payload_and_broadcasts() {
        let registry = FunctionRegistry::new();
        registry.register_async(Namespace::Function, "ok_fn", "", || async {
            Ok(json!({"rows": 3}))
        });
        let executor = FunctionExecutor::new(registry);
        let sink = NotificationSink::new();
        let (tx, mut rx) = mpsc::channel(8);
        sink.register(tx);

        let payload = fire_http(&executor, &sink, "ok_fn").await;
        assert_eq!(payload, json!({"status": "success"}));

        let start = rx.recv().await.expect("start message");
        assert!(start.starts_with("Executing HTTP-triggered function"));
        let done = rx.recv().await.expect("completion message");
        assert!(done.starts_with("Successfully completed function"));
    }

    #[tokio::test]
    async fn fire_failure_becomes_error_payload() {
        let registry = FunctionRegistry::new();
        registry.register_async(Namespace::Function, "bad_fn", "", || async {
            Err(FunctionError::new("no warehouse"))
        });
        let executor = FunctionExecutor::new(registry);
        let sink = NotificationSink::new();

        let payload = fire_http(&executor, &sink, "bad_fn").await;
        assert_eq!(payload, json!({"status": "error", "message": "no warehouse"}));
    }

    #[tokio::test]
    async fn error_key_in_result_classified_as_failure() {
        // A top-level "error" string is the executor's failure sentinel,
        // even when the implementation returned it as ordinary data.
        let registry = FunctionRegistry::new();
        registry.register_async(Namespace::Function, "audit", "", || async {
            Ok(json!({"error": "3 rows quarantined"}))
        });
        let executor = FunctionExecutor::new(registry);
        let sink = NotificationSink::new();

        let payload = fire_http(&executor, &sink, "audit").await;
        assert_eq!(
            payload,
            json!({"status": "error", "message": "3 rows quarantined"})
        );
    }

    #[tokio::test]
    async fn fire_unknown_function_is_error_payload() {
        let executor = FunctionExecutor::new(FunctionRegistry::new());
        let sink = NotificationSink::new();

        let payload = fire_http(&executor, &sink, "ghost").await;
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["message"], "Function not found");
    }
}
