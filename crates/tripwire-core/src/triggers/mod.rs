//! Trigger handlers — binding configured functions to event sources.
//!
//! Each configured function gets one handler built by [`build_handler`] and
//! registered once via [`TriggerHandler::setup`]. Handlers never execute the
//! bound function during setup; firing goes through the shared
//! [`FunctionExecutor`](crate::executor::FunctionExecutor).

mod factory;
mod http;
mod table;
mod timer;

use std::sync::Arc;

use crate::detector::ChangeDetector;
use crate::executor::FunctionExecutor;
use crate::notify::NotificationSink;
use crate::scheduler::Scheduler;

pub use factory::{build_handler, TriggerHandler};
pub use http::{fire_http, HttpRoute, HttpTriggerHandler, RouteTable};
pub use table::{poll_table, TableTriggerHandler};
pub use timer::TimerTriggerHandler;

/// Shared collaborators handed to every handler at construction.
///
/// The scheduler, route table, and detector are optional: a handler whose
/// required handle is absent fails `setup()` with `MissingDependency`.
#[derive(Clone)]
pub struct TriggerContext {
    pub executor: FunctionExecutor,
    pub sink: NotificationSink,
    pub scheduler: Option<Arc<Scheduler>>,
    pub routes: Option<RouteTable>,
    pub detector: Option<Arc<ChangeDetector>>,
}
