use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::supervisor::SupervisorState;

/// Runtime status written by the daemon to `<data dir>/status.toml`.
/// The surrounding shell reads this file (read-only) to show what the daemon is doing.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DaemonStatus {
    /// Daemon binary version (set from Cargo.toml at compile time).
    pub version: String,
    /// State of the restart supervisor.
    pub supervisor: SupervisorState,
    /// Whether a watchdog fire is currently pending.
    pub watchdog_armed: bool,
    /// RFC 3339 timestamp of the most recent watchdog fire, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_watchdog_fire: Option<String>,
    /// Records waiting in the scrobble queue.
    pub queue_length: usize,
    /// Title of the most recently queued record, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_title: Option<String>,
    /// Most recent non-fatal failure, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonStatus {
    /// Constructs the initial status on daemon startup.
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            supervisor: SupervisorState::Stopped,
            watchdog_armed: false,
            last_watchdog_fire: None,
            queue_length: 0,
            last_title: None,
            error: None,
        }
    }

    /// Whether `latest` differs from the error currently reported.
    pub fn error_changed(&self, latest: Option<&str>) -> bool {
        self.error.as_deref() != latest
    }
}

/// Serializes `status` to TOML and writes it to `path`.
/// Creates the parent directory if it does not exist.
/// Failures are logged, never returned.
pub fn write_status(path: &Path, status: &DaemonStatus) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("Failed to create directory {}: {e}", parent.display());
            return;
        }
    }
    match toml::to_string_pretty(status) {
        Ok(content) => {
            if let Err(e) = std::fs::write(path, content) {
                warn!("Failed to write status file: {e}");
            }
        }
        Err(e) => warn!("Failed to serialize status: {e}"),
    }
}
