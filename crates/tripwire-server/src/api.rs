//! HTTP surface.
//!
//! Static endpoints:
//! - `GET /api/v1/health` — static liveness probe
//! - `GET /api/v1/functions` — configured functions with their registered
//!   source attached (diagnostic use)
//! - `GET /api/v1/ws` — WebSocket status channel: echoes client text and
//!   pushes every [`NotificationSink`] broadcast
//!
//! Plus one route per HTTP-triggered function, mounted from the
//! [`RouteTable`] the trigger handlers registered into. Trigger execution
//! failures surface as a normal response with `{status: error, message}`,
//! never as a 5xx.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::{get, on, MethodFilter};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tripwire_core::{
    fire_http, FunctionDefs, FunctionExecutor, FunctionRegistry, NotificationSink, RouteTable,
};

/// Shared state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub defs: Arc<FunctionDefs>,
    pub registry: FunctionRegistry,
    pub executor: FunctionExecutor,
    pub sink: NotificationSink,
}

const STATIC_PATHS: &[&str] = &["/api/v1/health", "/api/v1/functions", "/api/v1/ws"];

/// Build the full router: static endpoints plus every registered trigger
/// route.
///
/// A trigger route that cannot be mounted — unknown method, a path shadowing
/// a static endpoint, or a duplicate `(method, path)` pair — is logged and
/// skipped; `Router::route` would panic on an overlap, and one bad route
/// must not take down the rest.
pub fn build_router(state: AppState, routes: &RouteTable) -> Router {
    let mut router = Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/functions", get(list_functions))
        .route("/api/v1/ws", get(ws_endpoint));

    let mut mounted: HashSet<(String, String)> = HashSet::new();
    for route in routes.routes() {
        let Some(filter) = method_filter(&route.method) else {
            tracing::error!(method = %route.method, path = %route.path, "unmountable trigger route");
            continue;
        };
        if STATIC_PATHS.contains(&route.path.as_str()) {
            tracing::error!(path = %route.path, function = %route.function, "trigger route shadows a built-in endpoint");
            continue;
        }
        if !mounted.insert((route.method.clone(), route.path.clone())) {
            tracing::error!(method = %route.method, path = %route.path, function = %route.function, "duplicate trigger route");
            continue;
        }
        let function = route.function.clone();
        let handler_state = state.clone();
        let handler = move || {
            let function = function.clone();
            let state = handler_state.clone();
            async move { Json(fire_http(&state.executor, &state.sink, &function).await) }
        };
        tracing::info!(method = %route.method, path = %route.path, function = %route.function, "mounting trigger route");
        router = router.route(&route.path, on(filter, handler));
    }

    router.with_state(state)
}

fn method_filter(method: &str) -> Option<MethodFilter> {
    match method {
        "GET" => Some(MethodFilter::GET),
        "POST" => Some(MethodFilter::POST),
        "PUT" => Some(MethodFilter::PUT),
        "PATCH" => Some(MethodFilter::PATCH),
        "DELETE" => Some(MethodFilter::DELETE),
        _ => None,
    }
}

async fn health() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

async fn list_functions(State(state): State<AppState>) -> Json<Value> {
    let functions: Vec<Value> = state
        .defs
        .functions
        .iter()
        .map(|descriptor| {
            let mut entry = serde_json::to_value(descriptor).unwrap_or_else(|_| json!({}));
            if let Value::Object(map) = &mut entry {
                map.insert("code".into(), json!(state.registry.source(&descriptor.name)));
            }
            entry
        })
        .collect();
    Json(json!({"functions": functions}))
}

async fn ws_endpoint(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.sink))
}

/// Drive one WebSocket connection: echo client text, forward broadcasts.
async fn handle_socket(mut socket: WebSocket, sink: NotificationSink) {
    let (tx, mut rx) = mpsc::channel::<String>(64);
    let id = sink.register(tx);

    loop {
        tokio::select! {
            Some(broadcast) = rx.recv() => {
                if socket.send(Message::Text(broadcast)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let echo = format!("Message received: {text}");
                    if socket.send(Message::Text(echo)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "websocket error");
                    break;
                }
            }
        }
    }

    sink.unregister(id);
    tracing::info!("client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use tripwire_core::{FunctionDescriptor, HttpRoute, Namespace, TriggerSpec};

    fn state_with(defs: FunctionDefs) -> AppState {
        let registry = FunctionRegistry::new();
        registry.register_async(Namespace::Function, "run_report", "builtin: report", || async {
            Ok(json!({"rows": 3}))
        });
        AppState {
            defs: Arc::new(defs),
            registry: registry.clone(),
            executor: FunctionExecutor::new(registry),
            sink: NotificationSink::new(),
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let router = build_router(state_with(FunctionDefs::default()), &RouteTable::new());

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "healthy"}));
    }

    #[tokio::test]
    async fn functions_listing_attaches_source() {
        let defs = FunctionDefs {
            functions: vec![FunctionDescriptor {
                name: "run_report".into(),
                trigger: TriggerSpec {
                    kind: "http".into(),
                    endpoint: Some("/api/v1/run-report".into()),
                    method: Some("POST".into()),
                    ..Default::default()
                },
            }],
        };
        let router = build_router(state_with(defs), &RouteTable::new());

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/v1/functions")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        let body = body_json(response).await;
        let entry = &body["functions"][0];
        assert_eq!(entry["name"], "run_report");
        assert_eq!(entry["code"], "builtin: report");
        assert_eq!(entry["trigger"]["type"], "http");
    }

    #[tokio::test]
    async fn trigger_route_mounted_and_fires() {
        let routes = RouteTable::new();
        routes
            .insert(HttpRoute {
                path: "/api/v1/run-report".into(),
                method: "POST".into(),
                function: "run_report".into(),
            })
            .expect("insert");
        let router = build_router(state_with(FunctionDefs::default()), &routes);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/run-report")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "success"}));
    }

    #[tokio::test]
    async fn route_shadowing_builtin_skipped_not_fatal() {
        let routes = RouteTable::new();
        routes
            .insert(HttpRoute {
                path: "/api/v1/health".into(),
                method: "GET".into(),
                function: "run_report".into(),
            })
            .expect("insert");
        routes
            .insert(HttpRoute {
                path: "/api/v1/run-report".into(),
                method: "POST".into(),
                function: "run_report".into(),
            })
            .expect("insert");

        // Building must not panic; the static endpoint keeps its handler
        // and the well-formed trigger route still mounts.
        let router = build_router(state_with(FunctionDefs::default()), &routes);

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(body_json(response).await, json!({"status": "healthy"}));

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/run-report")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(body_json(response).await, json!({"status": "success"}));
    }

    #[tokio::test]
    async fn trigger_route_failure_is_normal_response() {
        let routes = RouteTable::new();
        routes
            .insert(HttpRoute {
                path: "/api/v1/ghost".into(),
                method: "POST".into(),
                function: "ghost".into(),
            })
            .expect("insert");
        let router = build_router(state_with(FunctionDefs::default()), &routes);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/ghost")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        // Execution failure is payload-level, not transport-level.
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Function not found");
    }
}
