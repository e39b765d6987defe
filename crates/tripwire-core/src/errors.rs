//! Error types for the trigger-dispatch core.

use thiserror::Error;

/// Errors raised while loading the function-definition file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read function definitions from '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed function definitions in '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors raised while constructing or registering a trigger handler.
///
/// Every variant is scoped to one function's registration: the orchestrator
/// reports it and moves on to the next descriptor.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("trigger config error: {message}")]
    Config { message: String },
    #[error("missing dependency: {what}")]
    MissingDependency { what: String },
    #[error("unknown trigger type: {tag}")]
    UnknownTriggerType { tag: String },
    #[error("route {method} {path} is already registered")]
    DuplicateRoute { method: String, path: String },
    #[error("invalid cron schedule '{expression}': {message}")]
    InvalidSchedule {
        expression: String,
        message: String,
    },
}

impl SetupError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn missing(what: impl Into<String>) -> Self {
        Self::MissingDependency { what: what.into() }
    }
}

/// Errors from the external data store while checking a table version.
///
/// Never terminates the owning polling job; the listener reports it and
/// leaves the recorded version untouched.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("warehouse query failed: {message}")]
    Query { message: String },
    #[error("no history found for table {table}")]
    NoHistory { table: String },
}

/// Failure of a single function implementation.
///
/// Surfaced by [`FunctionExecutor`](crate::executor::FunctionExecutor) as a
/// structured `{"error": message}` value, never propagated.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct FunctionError {
    message: String,
}

impl FunctionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for FunctionError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for FunctionError {
    fn from(message: &str) -> Self {
        Self {
            message: message.into(),
        }
    }
}
