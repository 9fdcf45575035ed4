/// Keep-alive supervision of the background listener.
///
/// Two mechanisms share one goal, keeping the listener running:
///   - the watchdog: a 15-minute one-shot timer that, on every fire, asks the
///     host to ensure the listener is running and then re-arms itself;
///   - the restart supervisor: a trivial always-ready unit that, when the host
///     reclaims or destroys it, asks for the listener and for itself to be
///     started again.
///
/// Every host request is fire-and-forget. A failure is logged and remembered
/// for the status file, and the next timer fire or kill signal is the retry.
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ExtractorConfig;
use crate::extractor;
use crate::host::{Host, HostError, ServiceUnit, TimerSlot};
use crate::queue::EventQueue;
use crate::record::{NotificationEvent, PlaybackRecord};
use crate::store::KeyValueStore;

/// Fixed delay between watchdog fires.
pub const WATCHDOG_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorState {
    /// Not started, or the last invocation ended after a reclaim/destroy signal.
    Stopped,
    /// Started and asking the host to keep the process alive.
    Running,
}

/// What the supervisor asks of the host when it is started.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StartDirective {
    /// Restart this unit if the host ever kills it.
    KeepAlive,
}

/// Entry points the host invokes. Each call runs to completion before the next
/// call of the same kind.
pub trait HostCallbacks {
    /// A notification was posted. Returns the record that was queued, if any.
    fn on_event(&mut self, event: &NotificationEvent) -> Option<PlaybackRecord>;

    /// A scheduled timer fired.
    fn on_timer_fire(&mut self, slot: TimerSlot);

    /// The host is reclaiming this process, e.g. the app was swiped away.
    fn on_reclaimed(&mut self);

    /// The host destroyed the supervisor.
    fn on_destroyed(&mut self);
}

/// Owns the extraction write path and both keep-alive mechanisms.
pub struct Supervisor<H, S> {
    host: Arc<H>,
    queue: EventQueue<S>,
    extractor: ExtractorConfig,
    state: SupervisorState,
    last_error: Option<String>,
}

impl<H: Host, S: KeyValueStore> Supervisor<H, S> {
    pub fn new(host: Arc<H>, queue: EventQueue<S>, extractor: ExtractorConfig) -> Self {
        Self {
            host,
            queue,
            extractor,
            state: SupervisorState::Stopped,
            last_error: None,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Most recent host or store failure, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn set_extractor_config(&mut self, extractor: ExtractorConfig) {
        self.extractor = extractor;
    }

    /// Number of queued records, or 0 if the store cannot be read.
    pub fn queue_len(&self) -> usize {
        match self.queue.read_all() {
            Ok(records) => records.len(),
            Err(e) => {
                warn!("Failed to read queue: {e}");
                0
            }
        }
    }

    /// Start trigger of the restart supervisor. Idempotent.
    pub fn start(&mut self) -> StartDirective {
        if self.state != SupervisorState::Running {
            info!("Restart supervisor started");
        }
        self.state = SupervisorState::Running;
        StartDirective::KeepAlive
    }

    /// Arms the first watchdog fire. The listener is not checked until that fire.
    pub fn start_watchdog(&mut self) -> Result<(), HostError> {
        self.arm_watchdog()
    }

    fn arm_watchdog(&mut self) -> Result<(), HostError> {
        match self.host.schedule_once(TimerSlot::Watchdog, WATCHDOG_INTERVAL) {
            Ok(()) => {
                info!("Next watchdog check in {} minutes", WATCHDOG_INTERVAL.as_secs() / 60);
                Ok(())
            }
            Err(e) => {
                self.record_failure(&e);
                Err(e)
            }
        }
    }

    fn request_start(&mut self, unit: ServiceUnit) {
        match self.host.ensure_running(unit) {
            Ok(()) => info!("Requested start of {unit}"),
            Err(e) => self.record_failure(&e),
        }
    }

    fn record_failure(&mut self, error: &HostError) {
        warn!("{error}");
        self.last_error = Some(error.to_string());
    }
}

impl<H: Host, S: KeyValueStore> HostCallbacks for Supervisor<H, S> {
    fn on_event(&mut self, event: &NotificationEvent) -> Option<PlaybackRecord> {
        let record = extractor::extract_from_host(self.host.as_ref(), event, &self.extractor)?;
        match self.queue.append(record.clone()) {
            Ok(len) => {
                info!("Queued '{}' ({len} pending)", record.title);
                Some(record)
            }
            Err(e) => {
                warn!("Failed to queue '{}': {e}", record.title);
                self.last_error = Some(e.to_string());
                None
            }
        }
    }

    fn on_timer_fire(&mut self, slot: TimerSlot) {
        match slot {
            TimerSlot::Watchdog => {
                info!("Watchdog fired, checking listener");
                self.request_start(ServiceUnit::Listener);
                // Re-arm regardless of the outcome above; a failure here is only logged.
                let _ = self.arm_watchdog();
            }
        }
    }

    fn on_reclaimed(&mut self) {
        warn!("Host is reclaiming the process, restarting services");
        self.request_start(ServiceUnit::Listener);
        self.request_start(ServiceUnit::RestartSupervisor);
        self.state = SupervisorState::Stopped;
    }

    fn on_destroyed(&mut self) {
        warn!("Restart supervisor destroyed, requesting restart");
        self.request_start(ServiceUnit::RestartSupervisor);
        self.state = SupervisorState::Stopped;
    }
}
