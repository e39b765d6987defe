//! Table change detection.
//!
//! Polling is the only signal the warehouse offers, so the detector keeps
//! the last version it observed per table and classifies each poll against
//! it. Per table the state machine is `Unseen` → `Baseline(v)` →
//! `Baseline(v')`: the first poll records a baseline without firing
//! anything, an equal version is suppressed, and any different version —
//! including a numerically smaller one after a table restore — counts as a
//! change.
//!
//! The version map lives only in memory; a restart makes the next poll of
//! every table a first observation again.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::QueryError;

/// Contract to the external data store: the current version of a table.
///
/// Query failures surface as [`QueryError`] and must leave detector state
/// untouched.
#[async_trait]
pub trait VersionSource: Send + Sync {
    async fn latest_version(&self, table: &str) -> Result<i64, QueryError>;
}

/// Outcome of one detection attempt. Transient, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeRecord {
    /// Version unchanged since the last poll.
    NoChange,
    /// First observation of this table; baseline recorded, nothing fires.
    InitialState { version: i64 },
    /// Version differs from the recorded baseline.
    ChangesDetected { version: i64 },
}

/// Polls a [`VersionSource`] and tracks per-table baselines.
pub struct ChangeDetector {
    source: Arc<dyn VersionSource>,
    versions: Mutex<HashMap<String, i64>>,
}

impl ChangeDetector {
    pub fn new(source: Arc<dyn VersionSource>) -> Self {
        Self {
            source,
            versions: Mutex::new(HashMap::new()),
        }
    }

    /// Poll `table` once and classify the result.
    ///
    /// On `InitialState` and `ChangesDetected` the recorded version moves to
    /// the observed value; on `NoChange` and on query failure it is left
    /// untouched.
    pub async fn check(&self, table: &str) -> Result<ChangeRecord, QueryError> {
        tracing::debug!(table = %table, "querying current table version");
        let current = self.source.latest_version(table).await?;

        let mut versions = self.versions.lock();
        let record = match versions.get(table) {
            None => ChangeRecord::InitialState { version: current },
            Some(&last) if last == current => ChangeRecord::NoChange,
            Some(&last) => {
                tracing::info!(
                    table = %table,
                    from = last,
                    to = current,
                    "table version changed"
                );
                ChangeRecord::ChangesDetected { version: current }
            }
        };

        if !matches!(record, ChangeRecord::NoChange) {
            versions.insert(table.to_string(), current);
        }
        Ok(record)
    }

    /// The recorded baseline for `table`, if one exists.
    pub fn recorded_version(&self, table: &str) -> Option<i64> {
        self.versions.lock().get(table).copied()
    }
}
