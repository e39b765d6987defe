//! Best-effort status fan-out.
//!
//! Every handler reports progress through a [`NotificationSink`]: a live,
//! ordered set of observers, each an `mpsc` sender the server side drains
//! into its own transport (WebSocket connections, test probes). Broadcast is
//! best-effort with no retention — an observer that is not registered at
//! broadcast time never sees the message, and an observer whose channel has
//! closed is dropped from the set mid-broadcast while delivery continues to
//! the rest.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Opaque handle identifying one registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverId(u64);

struct Observer {
    id: ObserverId,
    tx: mpsc::Sender<String>,
}

/// Cheaply-cloneable broadcast sink; clones share the observer set.
#[derive(Clone)]
pub struct NotificationSink {
    inner: Arc<SinkInner>,
}

struct SinkInner {
    observers: Mutex<Vec<Observer>>,
    next_id: AtomicU64,
}

impl NotificationSink {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SinkInner {
                observers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Append an observer to the live set.
    pub fn register(&self, tx: mpsc::Sender<String>) -> ObserverId {
        let id = ObserverId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.observers.lock().push(Observer { id, tx });
        id
    }

    /// Remove an observer. Returns `true` if it was still registered.
    pub fn unregister(&self, id: ObserverId) -> bool {
        let mut observers = self.inner.observers.lock();
        let before = observers.len();
        observers.retain(|o| o.id != id);
        observers.len() < before
    }

    /// Deliver `message` to every currently registered observer, in
    /// registration order.
    ///
    /// Never fails as a whole: an observer whose channel is closed is
    /// removed from the set and delivery continues to the rest. The message
    /// is also emitted on the process log.
    pub async fn broadcast(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{message}");

        // Snapshot under the lock, deliver outside it: sends may suspend.
        let observers: Vec<(ObserverId, mpsc::Sender<String>)> = self
            .inner
            .observers
            .lock()
            .iter()
            .map(|o| (o.id, o.tx.clone()))
            .collect();

        let mut closed = Vec::new();
        for (id, tx) in observers {
            if tx.send(message.clone()).await.is_err() {
                closed.push(id);
            }
        }

        if !closed.is_empty() {
            let mut observers = self.inner.observers.lock();
            observers.retain(|o| !closed.contains(&o.id));
            tracing::debug!(dropped = closed.len(), "removed closed observers");
        }
    }

    /// Number of currently registered observers.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.lock().len()
    }
}

impl Default for NotificationSink {
    fn default() -> Self {
        Self::new()
    }
}
