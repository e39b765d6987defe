//! Table-change trigger handler.
//!
//! Registers a fixed-interval polling job. Each poll runs the listener flow
//! in [`poll_table`]: query the current table version through the change
//! detector, record a baseline on first observation, and execute the bound
//! function only when the version differs from the recorded one. Query
//! failures are reported and leave the recorded state untouched; they never
//! terminate the polling job.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::config::TableRef;
use crate::detector::{ChangeDetector, ChangeRecord};
use crate::errors::SetupError;
use crate::executor::FunctionExecutor;
use crate::notify::NotificationSink;
use crate::scheduler::Scheduler;

/// Handler for warehouse-table change triggers.
pub struct TableTriggerHandler {
    pub(crate) function: String,
    pub(crate) table: TableRef,
    pub(crate) check_interval: Duration,
    pub(crate) executor: FunctionExecutor,
    pub(crate) sink: NotificationSink,
    pub(crate) scheduler: Option<Arc<Scheduler>>,
    pub(crate) detector: Option<Arc<ChangeDetector>>,
}

impl TableTriggerHandler {
    /// Register the fixed-interval polling job with the scheduler.
    pub async fn setup(&self) -> Result<(), SetupError> {
        let scheduler = self
            .scheduler
            .as_ref()
            .ok_or_else(|| SetupError::missing("job scheduler"))?;
        let detector = self
            .detector
            .as_ref()
            .ok_or_else(|| SetupError::missing("change detector"))?;

        self.sink
            .broadcast(format!(
                "Setting up table trigger for function: {}",
                self.function
            ))
            .await;

        let fqn = self.table.fully_qualified();
        let detector = Arc::clone(detector);
        let executor = self.executor.clone();
        let sink = self.sink.clone();
        let function = self.function.clone();
        let job_table = fqn.clone();
        scheduler.add_interval_job(&self.function, self.check_interval, move || {
            let detector = Arc::clone(&detector);
            let executor = executor.clone();
            let sink = sink.clone();
            let function = function.clone();
            let table = job_table.clone();
            async move {
                let status = poll_table(&detector, &executor, &sink, &table, &function).await;
                tracing::debug!(function = %function, table = %table, %status, "poll finished");
            }
        });

        self.sink
            .broadcast(format!(
                "Watching {fqn} for function {} (checking every {} seconds)",
                self.function,
                self.check_interval.as_secs()
            ))
            .await;
        Ok(())
    }
}

/// One polling firing of a table trigger.
///
/// Returns the structured status of the attempt; all failure modes are
/// folded into a `{status: error, message}` value.
pub async fn poll_table(
    detector: &ChangeDetector,
    executor: &FunctionExecutor,
    sink: &NotificationSink,
    table: &str,
    function: &str,
) -> Value {
    sink.broadcast(format!("Checking table {table} for changes..."))
        .await;

    match detector.check(table).await {
        Ok(ChangeRecord::NoChange) => json!({
            "status": "success",
            "changes_detected": false,
        }),
        Ok(ChangeRecord::InitialState { version }) => {
            sink.broadcast(format!("Recorded initial state for table {table}"))
                .await;
            json!({
                "status": "success",
                "changes_detected": true,
                "latest_version": version,
                "action": "initial state recorded",
            })
        }
        Ok(ChangeRecord::ChangesDetected { version }) => {
            sink.broadcast(format!(
                "Detected changes in table {table} - new version: {version}"
            ))
            .await;
            sink.broadcast(format!("Triggering function {function} due to table changes"))
                .await;
            executor.execute(function).await;
            sink.broadcast(format!("Successfully executed function {function}"))
                .await;
            json!({
                "status": "success",
                "changes_detected": true,
                "latest_version": version,
                "action": "changes processed",
            })
        }
        Err(e) => {
            tracing::error!(table = %table, error = %e, "table poll failed");
            sink.broadcast(format!("Error monitoring table {table}: {e}"))
                .await;
            json!({"status": "error", "message": e.to_string()})
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::VersionSource;
    use crate::errors::QueryError;
    use crate::registry::{FunctionRegistry, Namespace};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

    struct ScriptedSource {
        version: AtomicI64,
        fail: AtomicBool,
    }

    #[async_trait]
    impl VersionSource for ScriptedSource {
        async fn latest_version(&self, _table: &str) -> Result<i64, QueryError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(QueryError::Query {
                    message: "warehouse offline".into(),
                });
            }
            Ok(self.version.load(Ordering::SeqCst))
        }
    }

    fn scripted(version: i64) -> Arc<ScriptedSource> {
        Arc::new(ScriptedSource {
            version: AtomicI64::new(version),
            fail: AtomicBool::new(false),
        })
    }

    fn counting_executor(counter: Arc<AtomicUsize>) -> FunctionExecutor {
        let registry = FunctionRegistry::new();
        registry.register_async(Namespace::Function, "g", "", move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"ok": true}))
            }
        });
        FunctionExecutor::new(registry)
    }

    fn table_ref() -> TableRef {
        TableRef {
            catalog: "c".into(),
            schema: "s".into(),
            name: "t".into(),
        }
    }

    #[tokio::test]
    async fn first_poll_records_baseline_without_invoking() {
        let count = Arc::new(AtomicUsize::new(0));
        let executor = counting_executor(Arc::clone(&count));
        let detector = ChangeDetector::new(scripted(1));
        let sink = NotificationSink::new();

        let status = poll_table(&detector, &executor, &sink, "`c`.`s`.`t`", "g").await;
        assert_eq!(status["action"], "initial state recorded");
        assert_eq!(status["latest_version"], 1);
        assert_eq!(count.load(Ordering::SeqCst), 0, "baseline must not fire");
    }

    #[tokio::test]
    async fn changed_version_invokes_exactly_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let executor = counting_executor(Arc::clone(&count));
        let source = scripted(1);
        let detector = ChangeDetector::new(Arc::clone(&source) as Arc<dyn VersionSource>);
        let sink = NotificationSink::new();

        poll_table(&detector, &executor, &sink, "t", "g").await;
        source.version.store(2, Ordering::SeqCst);

        let status = poll_table(&detector, &executor, &sink, "t", "g").await;
        assert_eq!(status["action"], "changes processed");
        assert_eq!(status["latest_version"], 2);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // A further unchanged poll does nothing.
        let status = poll_table(&detector, &executor, &sink, "t", "g").await;
        assert_eq!(status["changes_detected"], false);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn query_failure_yields_error_status() {
        let count = Arc::new(AtomicUsize::new(0));
        let executor = counting_executor(Arc::clone(&count));
        let source = scripted(1);
        let detector = ChangeDetector::new(Arc::clone(&source) as Arc<dyn VersionSource>);
        let sink = NotificationSink::new();

        source.fail.store(true, Ordering::SeqCst);
        let status = poll_table(&detector, &executor, &sink, "t", "g").await;
        assert_eq!(status["status"], "error");
        assert!(status["message"]
            .as_str()
            .expect("message")
            .contains("warehouse offline"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(detector.recorded_version("t"), None);
    }

    #[tokio::test]
    async fn setup_requires_scheduler_and_detector() {
        let executor = counting_executor(Arc::new(AtomicUsize::new(0)));
        let handler = TableTriggerHandler {
            function: "g".into(),
            table: table_ref(),
            check_interval: Duration::from_secs(30),
            executor: executor.clone(),
            sink: NotificationSink::new(),
            scheduler: None,
            detector: Some(Arc::new(ChangeDetector::new(scripted(1)))),
        };
        assert!(matches!(
            handler.setup().await.unwrap_err(),
            SetupError::MissingDependency { .. }
        ));

        let handler = TableTriggerHandler {
            function: "g".into(),
            table: table_ref(),
            check_interval: Duration::from_secs(30),
            executor,
            sink: NotificationSink::new(),
            scheduler: Some(Arc::new(Scheduler::new())),
            detector: None,
        };
        assert!(matches!(
            handler.setup().await.unwrap_err(),
            SetupError::MissingDependency { .. }
        ));
    }

    #[tokio::test]
    async fn interval_job_polls_and_fires_on_change() {
        tokio::time::pause();

        let count = Arc::new(AtomicUsize::new(0));
        let executor = counting_executor(Arc::clone(&count));
        let source = scripted(1);
        let detector = Arc::new(ChangeDetector::new(
            Arc::clone(&source) as Arc<dyn VersionSource>
        ));
        let scheduler = Arc::new(Scheduler::new());

        let handler = TableTriggerHandler {
            function: "g".into(),
            table: table_ref(),
            check_interval: Duration::from_secs(30),
            executor,
            sink: NotificationSink::new(),
            scheduler: Some(Arc::clone(&scheduler)),
            detector: Some(Arc::clone(&detector)),
        };
        handler.setup().await.expect("setup");
        assert_eq!(scheduler.job_count(), 1);

        // Let the spawned job start its interval before time moves, so the
        // first tick is measured from now rather than from after the
        // advance.
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }

        // First interval elapses: baseline poll, no invocation.
        tokio::time::advance(Duration::from_secs(31)).await;
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(detector.recorded_version("`c`.`s`.`t`"), Some(1));

        // Version moves; the next poll fires exactly once. The first tick
        // was observed at t=31s, so delayed missed-tick behavior put the
        // next deadline at t=61s — advance past it, not exactly onto it.
        source.version.store(2, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(31)).await;
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);

        scheduler.shutdown().await;
    }
}
