//! Recurring-job scheduling over tokio tasks.
//!
//! One [`Scheduler`] owns every recurring job in the process: each job is a
//! tokio task looping over its own timing source (a cron schedule or a
//! fixed interval) and a shared shutdown broadcast. A firing runs to
//! completion before the loop looks at the next tick, so a single job never
//! overlaps itself; different jobs run concurrently with no ordering
//! guarantee between them.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use cron::Schedule;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub struct Scheduler {
    shutdown_tx: broadcast::Sender<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Run `job` on each tick of a cron schedule until shutdown.
    ///
    /// The loop sleeps until the next upcoming occurrence, runs the job to
    /// completion, then recomputes — a firing that overruns its slot delays
    /// subsequent ticks instead of stacking them.
    pub fn add_cron_job<F, Fut>(&self, name: &str, schedule: Schedule, job: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let name = name.to_string();
        let mut shutdown = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let Some(next) = schedule.upcoming(Utc).next() else {
                    tracing::warn!(job = %name, "cron schedule has no upcoming occurrences");
                    return;
                };
                let delay = (next - now)
                    .to_std()
                    .unwrap_or(Duration::from_millis(100));

                tokio::select! {
                    _ = tokio::time::sleep(delay) => job().await,
                    _ = shutdown.recv() => return,
                }
            }
        });
        self.handles.lock().push(handle);
    }

    /// Run `job` every `period` until shutdown, starting one period from now.
    ///
    /// Uses delayed missed-tick behavior: if a firing runs long, the next
    /// tick is rescheduled a full period after it completes.
    pub fn add_interval_job<F, Fut>(&self, name: &str, period: Duration, job: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let name = name.to_string();
        let mut shutdown = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::debug!(job = %name, period_secs = period.as_secs(), "interval job started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => job().await,
                    _ = shutdown.recv() => return,
                }
            }
        });
        self.handles.lock().push(handle);
    }

    /// Number of jobs registered so far.
    pub fn job_count(&self) -> usize {
        self.handles.lock().len()
    }

    /// Signal every job to stop and await their tasks.
    pub async fn shutdown(&self) {
        // Ignore send error — with no jobs there are no receivers.
        let _ = self.shutdown_tx.send(());
        let handles: Vec<JoinHandle<()>> = self.handles.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
