use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use tripwire_core::{
    ChangeDetector, FunctionDefs, FunctionExecutor, FunctionRegistry, NotificationSink,
    Orchestrator, RouteTable, Scheduler, TriggerContext,
};
use tripwire_server::warehouse::{SqlWarehouse, WarehouseConfig};
use tripwire_server::{api, builtins, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("fatal: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("TRIPWIRE_CONFIG").ok())
        .unwrap_or_else(|| "app.yaml".to_string());
    let defs = FunctionDefs::from_path(&config_path)?;
    tracing::info!(path = %config_path, functions = defs.functions.len(), "loaded function definitions");

    let registry = FunctionRegistry::new();
    builtins::register_builtins(&registry);

    let sink = NotificationSink::new();
    let executor = FunctionExecutor::new(registry.clone());
    let scheduler = Arc::new(Scheduler::new());
    let routes = RouteTable::new();

    // Without warehouse credentials table triggers fail setup individually;
    // everything else still registers.
    let detector = match WarehouseConfig::from_env() {
        Ok(config) => Some(Arc::new(ChangeDetector::new(Arc::new(SqlWarehouse::new(
            config,
        ))))),
        Err(e) => {
            tracing::warn!("warehouse client disabled: {e}");
            None
        }
    };

    let ctx = TriggerContext {
        executor: executor.clone(),
        sink: sink.clone(),
        scheduler: Some(Arc::clone(&scheduler)),
        routes: Some(routes.clone()),
        detector,
    };
    let registered = Orchestrator::new(ctx).setup_triggers(&defs).await;
    tracing::info!(
        registered,
        configured = defs.functions.len(),
        "trigger setup complete"
    );

    let state = AppState {
        defs: Arc::new(defs),
        registry,
        executor,
        sink,
    };
    let router = api::build_router(state, &routes);

    let addr: SocketAddr = std::env::var("TRIPWIRE_LISTEN")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8000)));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
