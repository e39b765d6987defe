//! Warehouse version source.
//!
//! Speaks the SQL-statements REST API of a Databricks-style warehouse to
//! answer one question: the latest version of a table, read from
//! `DESCRIBE HISTORY <table> LIMIT 1`. Credentials come from the
//! environment; a missing variable disables table triggers at startup
//! rather than failing the process.

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tripwire_core::{QueryError, VersionSource};

const STATEMENT_WAIT_TIMEOUT: &str = "30s";

/// Environment-derived connection settings.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Workspace base URL, e.g. `https://acme.cloud.databricks.com`.
    pub host: String,
    /// Bearer token.
    pub token: String,
    /// SQL warehouse to run statements on.
    pub warehouse_id: String,
}

#[derive(Debug, Error)]
pub enum WarehouseConfigError {
    #[error("missing environment variable {var}")]
    MissingEnv { var: &'static str },
}

fn env_var(var: &'static str) -> Result<String, WarehouseConfigError> {
    std::env::var(var).map_err(|_| WarehouseConfigError::MissingEnv { var })
}

impl WarehouseConfig {
    /// Read `DATABRICKS_HOST`, `DATABRICKS_TOKEN`, and
    /// `DATABRICKS_WAREHOUSE_ID`.
    pub fn from_env() -> Result<Self, WarehouseConfigError> {
        Ok(Self {
            host: env_var("DATABRICKS_HOST")?,
            token: env_var("DATABRICKS_TOKEN")?,
            warehouse_id: env_var("DATABRICKS_WAREHOUSE_ID")?,
        })
    }
}

/// SQL-statements API client implementing [`VersionSource`].
pub struct SqlWarehouse {
    http: reqwest::Client,
    config: WarehouseConfig,
}

impl SqlWarehouse {
    pub fn new(config: WarehouseConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Execute one SQL statement synchronously (API-side wait) and return
    /// the raw response document.
    async fn execute(&self, statement: &str) -> Result<Value, QueryError> {
        let url = format!(
            "{}/api/2.0/sql/statements",
            self.config.host.trim_end_matches('/')
        );
        let body = json!({
            "statement": statement,
            "warehouse_id": self.config.warehouse_id,
            "wait_timeout": STATEMENT_WAIT_TIMEOUT,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| QueryError::Query {
                message: format!("statement request failed: {e}"),
            })?
            .error_for_status()
            .map_err(|e| QueryError::Query {
                message: format!("statement rejected: {e}"),
            })?;

        response.json().await.map_err(|e| QueryError::Query {
            message: format!("malformed statement response: {e}"),
        })
    }
}

/// Pull the `version` column of the first history row out of a statement
/// response document.
fn parse_latest_version(response: &Value, table: &str) -> Result<i64, QueryError> {
    let state = response
        .pointer("/status/state")
        .and_then(|v| v.as_str())
        .unwrap_or("UNKNOWN");
    if state != "SUCCEEDED" {
        return Err(QueryError::Query {
            message: format!("statement finished in state {state}"),
        });
    }

    let columns = response
        .pointer("/manifest/schema/columns")
        .and_then(|v| v.as_array())
        .ok_or_else(|| QueryError::Query {
            message: "statement response missing result schema".into(),
        })?;
    let version_idx = columns
        .iter()
        .position(|c| c.get("name").and_then(|n| n.as_str()) == Some("version"))
        .ok_or_else(|| QueryError::Query {
            message: "history result has no 'version' column".into(),
        })?;

    let first_row = response
        .pointer("/result/data_array")
        .and_then(|v| v.as_array())
        .and_then(|rows| rows.first())
        .and_then(|row| row.as_array())
        .ok_or_else(|| QueryError::NoHistory {
            table: table.to_string(),
        })?;

    let cell = first_row.get(version_idx).ok_or_else(|| QueryError::Query {
        message: "history row shorter than its schema".into(),
    })?;
    // The statements API returns cells as strings.
    match cell {
        Value::String(s) => s.parse::<i64>().map_err(|_| QueryError::Query {
            message: format!("unparseable table version: {s}"),
        }),
        Value::Number(n) => n.as_i64().ok_or_else(|| QueryError::Query {
            message: format!("unparseable table version: {n}"),
        }),
        other => Err(QueryError::Query {
            message: format!("unexpected version cell: {other}"),
        }),
    }
}

#[async_trait]
impl VersionSource for SqlWarehouse {
    async fn latest_version(&self, table: &str) -> Result<i64, QueryError> {
        let statement = format!("DESCRIBE HISTORY {table} LIMIT 1");
        let response = self.execute(&statement).await?;
        parse_latest_version(&response, table)
    }
}
