use crate::config::Config;
use crate::host::TimerSlot;
use crate::record::{NotificationEvent, SessionHandle, SessionMetadata};

pub enum DaemonEvent {
    /// The host posted a notification.
    Notification(NotificationEvent),
    /// A media session published or refreshed its metadata.
    SessionPublished {
        handle: SessionHandle,
        metadata: SessionMetadata,
    },
    /// A media session went away; its handle is now stale.
    SessionEnded(SessionHandle),
    /// Start trigger of the restart supervisor, from the shell or a self-requeue.
    SupervisorStart,
    /// The shell asked for the watchdog to be armed.
    WatchdogStart,
    /// A keyed one-shot timer fired.
    TimerFired(TimerSlot),
    /// The host is reclaiming the process (task removed).
    TaskRemoved,
    /// The host destroyed the restart supervisor.
    Destroyed,
    /// The config file changed on disk and was successfully re-parsed.
    ConfigReloaded(Config),
    /// Ctrl+C received; the daemon should write its final status and exit.
    Shutdown,
}
