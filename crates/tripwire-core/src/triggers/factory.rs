//! Handler construction.
//!
//! [`build_handler`] maps a trigger-type tag to the matching handler
//! variant, validating the declared type's required fields as it goes. Pure
//! construction — nothing is registered until `setup()` is called on the
//! result.

use std::fmt;
use std::time::Duration;

use crate::config::{TableRef, TriggerSpec, DEFAULT_CHECK_INTERVAL_SECS};
use crate::errors::SetupError;

use super::http::HttpTriggerHandler;
use super::table::TableTriggerHandler;
use super::timer::{parse_schedule, TimerTriggerHandler};
use super::TriggerContext;

const SUPPORTED_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE"];

/// A configured trigger handler, polymorphic over the trigger kind.
pub enum TriggerHandler {
    Http(HttpTriggerHandler),
    Timer(TimerTriggerHandler),
    Table(TableTriggerHandler),
}

impl TriggerHandler {
    /// The trigger-type tag this handler was built from.
    pub fn trigger_type(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Timer(_) => "timer",
            Self::Table(_) => "unity_table",
        }
    }

    /// Register the handler's invocation path with its owning engine.
    ///
    /// Returns once registration succeeds; never executes the bound
    /// function itself.
    pub async fn setup(&self) -> Result<(), SetupError> {
        match self {
            Self::Http(handler) => handler.setup().await,
            Self::Timer(handler) => handler.setup().await,
            Self::Table(handler) => handler.setup().await,
        }
    }
}

// Manual impl: the handlers hold non-Debug executors and sinks. Only the
// configuration fields are shown.
impl fmt::Debug for TriggerHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(handler) => f
                .debug_struct("Http")
                .field("function", &handler.function)
                .field("endpoint", &handler.endpoint)
                .field("method", &handler.method)
                .finish_non_exhaustive(),
            Self::Timer(handler) => f
                .debug_struct("Timer")
                .field("function", &handler.function)
                .field("expression", &handler.expression)
                .finish_non_exhaustive(),
            Self::Table(handler) => f
                .debug_struct("Table")
                .field("function", &handler.function)
                .field("table", &handler.table)
                .field("check_interval", &handler.check_interval)
                .finish_non_exhaustive(),
        }
    }
}

/// Build the handler matching the trigger spec's type tag.
///
/// Fails with `UnknownTriggerType` for any tag outside `http`, `timer`,
/// `unity_table`, and with `Config`/`InvalidSchedule` when the declared
/// type's required fields are absent or malformed.
pub fn build_handler(
    function: &str,
    spec: &TriggerSpec,
    ctx: &TriggerContext,
) -> Result<TriggerHandler, SetupError> {
    match spec.kind.as_str() {
        "" => Err(SetupError::config(
            "trigger configuration must specify 'type'",
        )),
        "http" => build_http(function, spec, ctx),
        "timer" => build_timer(function, spec, ctx),
        "unity_table" => build_table(function, spec, ctx),
        other => Err(SetupError::UnknownTriggerType {
            tag: other.to_string(),
        }),
    }
}

fn build_http(
    function: &str,
    spec: &TriggerSpec,
    ctx: &TriggerContext,
) -> Result<TriggerHandler, SetupError> {
    let endpoint = spec
        .endpoint
        .as_deref()
        .ok_or_else(|| SetupError::config("missing 'endpoint' in config"))?;
    if !endpoint.starts_with('/') {
        return Err(SetupError::config(format!(
            "endpoint must start with '/': {endpoint}"
        )));
    }
    let method = spec
        .method
        .as_deref()
        .ok_or_else(|| SetupError::config("missing 'method' in config"))?
        .to_uppercase();
    if !SUPPORTED_METHODS.contains(&method.as_str()) {
        return Err(SetupError::config(format!(
            "unsupported HTTP method: {method}"
        )));
    }

    Ok(TriggerHandler::Http(HttpTriggerHandler {
        function: function.to_string(),
        endpoint: endpoint.to_string(),
        method,
        sink: ctx.sink.clone(),
        routes: ctx.routes.clone(),
    }))
}

fn build_timer(
    function: &str,
    spec: &TriggerSpec,
    ctx: &TriggerContext,
) -> Result<TriggerHandler, SetupError> {
    let expression = spec
        .schedule
        .as_deref()
        .ok_or_else(|| SetupError::config("missing 'schedule' in config"))?;
    let schedule = parse_schedule(expression)?;

    Ok(TriggerHandler::Timer(TimerTriggerHandler {
        function: function.to_string(),
        expression: expression.to_string(),
        schedule,
        executor: ctx.executor.clone(),
        sink: ctx.sink.clone(),
        scheduler: ctx.scheduler.clone(),
    }))
}

fn build_table(
    function: &str,
    spec: &TriggerSpec,
    ctx: &TriggerContext,
) -> Result<TriggerHandler, SetupError> {
    let table_config = spec
        .table_config
        .as_ref()
        .ok_or_else(|| SetupError::config("missing 'table_config' in config"))?;
    let (Some(catalog), Some(schema), Some(name)) = (
        table_config.catalog.as_deref(),
        table_config.schema.as_deref(),
        table_config.name.as_deref(),
    ) else {
        return Err(SetupError::config(
            "table_config must include 'catalog', 'schema', and 'name'",
        ));
    };

    let interval_secs = spec.check_interval.unwrap_or(DEFAULT_CHECK_INTERVAL_SECS);
    if interval_secs == 0 {
        return Err(SetupError::config("check_interval must be positive"));
    }

    Ok(TriggerHandler::Table(TableTriggerHandler {
        function: function.to_string(),
        table: TableRef {
            catalog: catalog.to_string(),
            schema: schema.to_string(),
            name: name.to_string(),
        },
        check_interval: Duration::from_secs(interval_secs),
        executor: ctx.executor.clone(),
        sink: ctx.sink.clone(),
        scheduler: ctx.scheduler.clone(),
        detector: ctx.detector.clone(),
    }))
}
