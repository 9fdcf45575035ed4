/// Capabilities the host environment provides to the supervisor and extractor.
///
/// Everything the daemon asks of the outside world goes through [`Host`], so the
/// supervisor and the extractor can be driven by a fake in tests.
///   - service manager: idempotent "ensure this unit is running"
///   - alarm scheduler: one-shot, wake-capable, keyed by [`TimerSlot`]
///   - session subsystem: resolve a [`SessionHandle`] to metadata
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::config::ListenerConfig;
use crate::event::DaemonEvent;
use crate::record::{SessionHandle, SessionMetadata};
use crate::services::ProcessServiceManager;
use crate::sessions::SessionRegistry;
use crate::timers::TimerRegistry;

/// A background unit the host's service manager can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceUnit {
    /// The monitored notification listener.
    Listener,
    /// The restart supervisor itself. Starting it re-delivers its Start trigger.
    RestartSupervisor,
}

impl fmt::Display for ServiceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceUnit::Listener => f.write_str("listener"),
            ServiceUnit::RestartSupervisor => f.write_str("restart supervisor"),
        }
    }
}

/// Identity of a scheduled one-shot timer. Scheduling a slot replaces whatever
/// was pending in it, so each slot has at most one outstanding timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerSlot {
    Watchdog,
}

impl fmt::Display for TimerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerSlot::Watchdog => f.write_str("watchdog"),
        }
    }
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to start {unit}: {reason}")]
    ServiceStart { unit: ServiceUnit, reason: String },

    #[error("failed to schedule {slot} timer: {reason}")]
    Schedule { slot: TimerSlot, reason: String },

    #[error("media session {0} is unavailable")]
    SessionUnavailable(SessionHandle),

    #[error("daemon event channel is closed")]
    ChannelClosed,
}

pub trait Host: Send + Sync {
    /// Starts `unit` unless it is already running. Starting a running unit is a no-op.
    fn ensure_running(&self, unit: ServiceUnit) -> Result<(), HostError>;

    /// Arms `slot` to fire once after `after` on a monotonic clock. The last call wins.
    fn schedule_once(&self, slot: TimerSlot, after: Duration) -> Result<(), HostError>;

    /// Looks up the metadata currently published by the session behind `handle`.
    fn resolve_session(&self, handle: &SessionHandle) -> Result<SessionMetadata, HostError>;
}

// ── Daemon host ────────────────────────────────────────────────────────────────

/// [`Host`] implementation backing the running daemon.
pub struct DaemonHost {
    services: ProcessServiceManager,
    timers: TimerRegistry,
    sessions: Arc<SessionRegistry>,
    /// The daemon's own event loop; used to re-deliver the supervisor's Start trigger.
    events: mpsc::Sender<DaemonEvent>,
}

impl DaemonHost {
    pub fn new(
        services: ProcessServiceManager,
        timers: TimerRegistry,
        sessions: Arc<SessionRegistry>,
        events: mpsc::Sender<DaemonEvent>,
    ) -> Self {
        Self {
            services,
            timers,
            sessions,
            events,
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn set_listener(&self, listener: ListenerConfig) {
        self.services.set_listener(listener);
    }

    pub fn is_armed(&self, slot: TimerSlot) -> bool {
        self.timers.is_armed(slot)
    }

    pub fn cancel_timers(&self) {
        self.timers.cancel_all();
    }
}

impl Host for DaemonHost {
    fn ensure_running(&self, unit: ServiceUnit) -> Result<(), HostError> {
        match unit {
            ServiceUnit::Listener => self.services.ensure_listener_running(),
            // Called from inside the event loop, so never wait for channel capacity.
            ServiceUnit::RestartSupervisor => match self.events.try_send(DaemonEvent::SupervisorStart) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => Err(HostError::ServiceStart {
                    unit,
                    reason: "event queue is full".to_string(),
                }),
                Err(TrySendError::Closed(_)) => Err(HostError::ChannelClosed),
            },
        }
    }

    fn schedule_once(&self, slot: TimerSlot, after: Duration) -> Result<(), HostError> {
        self.timers.schedule_once(slot, after)
    }

    fn resolve_session(&self, handle: &SessionHandle) -> Result<SessionMetadata, HostError> {
        self.sessions.resolve(handle)
    }
}

// ── Test host ──────────────────────────────────────────────────────────────────
