//! Built-in function implementations.
//!
//! Registered at startup so a fresh deployment has something runnable to
//! bind triggers to. One async and one blocking implementation, exercising
//! both execution paths of the core.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;
use tripwire_core::{FunctionRegistry, Namespace};

pub fn register_builtins(registry: &FunctionRegistry) {
    registry.register_async(
        Namespace::Function,
        "heartbeat",
        "async builtin: reports process liveness with a unix timestamp",
        || async {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default();
            Ok(json!({"status": "alive", "checked_at": now}))
        },
    );

    registry.register_blocking(
        Namespace::Function,
        "usage_rollup",
        "blocking builtin: placeholder rollup run on the worker pool",
        || {
            // Stands in for CPU-bound report generation.
            let total: u64 = (1..=1000).sum();
            Ok(json!({"status": "ok", "rows_rolled_up": total}))
        },
    );
}
