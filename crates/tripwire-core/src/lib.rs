//! tripwire-core — configuration-driven function-trigger dispatch.
//!
//! Binds named functions to event sources — inbound HTTP requests, cron
//! schedules, and polling-based change detection on warehouse tables — and
//! executes the bound function when its trigger fires, uniformly for async
//! and blocking implementations.
//!
//! This crate is the trigger-dispatch core only: it owns the handler
//! variants and their factory, the function registry and executor, the
//! change-detection state machine, the recurring-job scheduler, and the
//! status broadcast sink. It has zero dependencies on web servers or
//! warehouse clients; those plug in through narrow seams (the
//! [`RouteTable`] an API layer mounts, the [`VersionSource`] a warehouse
//! client implements, the `mpsc` senders observers register).

pub mod config;
pub mod detector;
pub mod errors;
pub mod executor;
pub mod notify;
pub mod orchestrator;
pub mod registry;
pub mod scheduler;
pub mod triggers;

// Re-export public types at the crate level.

pub use config::{
    FunctionDefs, FunctionDescriptor, TableConfig, TableRef, TriggerSpec,
    DEFAULT_CHECK_INTERVAL_SECS,
};
pub use detector::{ChangeDetector, ChangeRecord, VersionSource};
pub use errors::{ConfigError, FunctionError, QueryError, SetupError};
pub use executor::FunctionExecutor;
pub use notify::{NotificationSink, ObserverId};
pub use orchestrator::Orchestrator;
pub use registry::{FunctionImpl, FunctionRegistry, Namespace};
pub use scheduler::Scheduler;
pub use triggers::{
    build_handler, fire_http, poll_table, HttpRoute, HttpTriggerHandler, RouteTable,
    TableTriggerHandler, TimerTriggerHandler, TriggerContext, TriggerHandler,
};
