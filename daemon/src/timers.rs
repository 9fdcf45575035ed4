use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::event::DaemonEvent;
use crate::host::{HostError, TimerSlot};

/// Keyed registry of one-shot timers, at most one pending timer per [`TimerSlot`].
///
/// Scheduling a slot aborts whatever was pending there: the last
/// `schedule_once` call wins. A fired timer delivers
/// [`DaemonEvent::TimerFired`] to the daemon's event loop.
///
/// Timers run on tokio's monotonic clock, so wall-clock changes do not move them.
pub struct TimerRegistry {
    pending: Mutex<HashMap<TimerSlot, JoinHandle<()>>>,
    tx: mpsc::Sender<DaemonEvent>,
}

impl TimerRegistry {
    pub fn new(tx: mpsc::Sender<DaemonEvent>) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            tx,
        }
    }

    /// Arms `slot` to fire once after `after`, replacing any pending timer in that slot.
    /// Must be called from within a tokio runtime.
    pub fn schedule_once(&self, slot: TimerSlot, after: Duration) -> Result<(), HostError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| HostError::Schedule {
            slot,
            reason: e.to_string(),
        })?;

        let tx = self.tx.clone();
        let task = runtime.spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(DaemonEvent::TimerFired(slot)).await;
        });

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = pending.insert(slot, task) {
            if !previous.is_finished() {
                debug!("Replacing pending {slot} timer");
            }
            previous.abort();
        }
        Ok(())
    }

    /// True while a timer for `slot` is pending and has not fired yet.
    pub fn is_armed(&self, slot: TimerSlot) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&slot)
            .is_some_and(|task| !task.is_finished())
    }

    /// Aborts every pending timer. Used on daemon shutdown.
    pub fn cancel_all(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        for (_, task) in pending.drain() {
            task.abort();
        }
    }
}
