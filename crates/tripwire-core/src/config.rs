//! Function-definition configuration.
//!
//! The definition file is one YAML list of function entries, each binding a
//! function name to exactly one trigger:
//!
//! ```yaml
//! functions:
//!   - name: nightly_report
//!     trigger:
//!       type: timer
//!       schedule: "0 2 * * *"
//!   - name: orders_changed
//!     trigger:
//!       type: unity_table
//!       table_config: { catalog: main, schema: sales, name: orders }
//!       check_interval: 30
//! ```
//!
//! The trigger block deserializes into a raw [`TriggerSpec`] (a `type` tag
//! plus optional fields) rather than a tagged enum, so an unknown tag or a
//! missing field is a per-function factory error instead of a parse failure
//! that takes down the whole file.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Default polling interval for table triggers, in seconds.
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;

/// The full function-definition file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionDefs {
    #[serde(default)]
    pub functions: Vec<FunctionDescriptor>,
}

impl FunctionDefs {
    /// Load definitions from a YAML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// One configured function: a unique name plus its trigger binding.
///
/// Immutable after load. A descriptor whose name has no registered
/// implementation is skipped with a diagnostic, not treated as fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub trigger: TriggerSpec,
}

/// Raw, unvalidated trigger configuration as it appears in the file.
///
/// Which fields are required depends on `type`; the handler factory checks
/// them and rejects anything incomplete or unrecognized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerSpec {
    /// Trigger type tag: `http`, `timer`, or `unity_table`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// HTTP: endpoint path, e.g. `/api/v1/run-report`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// HTTP: request method, e.g. `POST`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Timer: five-or-six-field crontab expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    /// Table: the watched table, all three parts required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_config: Option<TableConfig>,
    /// Table: polling interval in seconds (default 60).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_interval: Option<u64>,
}

/// Raw table coordinates. All parts are optional here so that a partial
/// entry surfaces as a factory error for that one function.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A validated, fully-specified table reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub catalog: String,
    pub schema: String,
    pub name: String,
}

/// Wrap a name component in backticks so names with spaces survive SQL.
fn escape_name(name: &str) -> String {
    format!("`{name}`")
}

impl TableRef {
    /// The fully-qualified, backtick-escaped table name.
    pub fn fully_qualified(&self) -> String {
        format!(
            "{}.{}.{}",
            escape_name(&self.catalog),
            escape_name(&self.schema),
            escape_name(&self.name)
        )
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fully_qualified())
    }
}
