//! Timer trigger handler.
//!
//! Registers a cron-schedule job with the scheduler. Each firing executes
//! the bound function with errors caught and reported, so the job stays
//! scheduled for future firings.

use std::str::FromStr;
use std::sync::Arc;

use cron::Schedule;

use crate::errors::SetupError;
use crate::executor::FunctionExecutor;
use crate::notify::NotificationSink;
use crate::scheduler::Scheduler;

/// Convert a 5-or-6-field crontab expression to the 7-field format the
/// `cron` crate expects.
///
/// Crontab:      `min hour day month weekday`
/// Cron crate:   `sec min hour day month weekday year`
fn normalize_cron_expression(expr: &str) -> String {
    match expr.split_whitespace().count() {
        5 => format!("0 {expr} *"),
        6 => format!("0 {expr}"),
        _ => expr.to_string(),
    }
}

/// Parse a crontab expression, accepting 5/6-field crontab syntax.
pub(crate) fn parse_schedule(expression: &str) -> Result<Schedule, SetupError> {
    let normalized = normalize_cron_expression(expression);
    Schedule::from_str(&normalized).map_err(|e| SetupError::InvalidSchedule {
        expression: expression.to_string(),
        message: e.to_string(),
    })
}

/// Handler for cron-scheduled functions.
pub struct TimerTriggerHandler {
    pub(crate) function: String,
    pub(crate) expression: String,
    pub(crate) schedule: Schedule,
    pub(crate) executor: FunctionExecutor,
    pub(crate) sink: NotificationSink,
    pub(crate) scheduler: Option<Arc<Scheduler>>,
}

impl TimerTriggerHandler {
    /// Register the recurring job with the scheduler.
    pub async fn setup(&self) -> Result<(), SetupError> {
        let scheduler = self
            .scheduler
            .as_ref()
            .ok_or_else(|| SetupError::missing("job scheduler"))?;

        self.sink
            .broadcast(format!(
                "Setting up timer trigger for function: {}",
                self.function
            ))
            .await;

        let executor = self.executor.clone();
        let sink = self.sink.clone();
        let function = self.function.clone();
        scheduler.add_cron_job(&self.function, self.schedule.clone(), move || {
            let executor = executor.clone();
            let sink = sink.clone();
            let function = function.clone();
            async move {
                fire_scheduled(&executor, &sink, &function).await;
            }
        });

        self.sink
            .broadcast(format!(
                "Scheduled function {} with cron: {}",
                self.function, self.expression
            ))
            .await;
        Ok(())
    }
}

/// One scheduled firing: start broadcast, execution, outcome broadcast.
pub(crate) async fn fire_scheduled(
    executor: &FunctionExecutor,
    sink: &NotificationSink,
    function: &str,
) {
    sink.broadcast(format!("Executing scheduled function: {function}"))
        .await;

    let result = executor.execute(function).await;
    match result.get("error").and_then(|v| v.as_str()) {
        Some(message) => {
            sink.broadcast(format!("Error in scheduled function {function}: {message}"))
                .await;
        }
        None => {
            sink.broadcast(format!(
                "Successfully completed scheduled function: {function}"
            ))
            .await;
        }
    }
}
