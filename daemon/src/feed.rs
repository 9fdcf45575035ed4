/// Inbound host protocol: one JSON object per line on stdin, tagged by `kind`.
///
/// ```text
/// {"kind":"notification","package":"…","title":"…","text":"A • B","sub_text":"…","session":"tok"}
/// {"kind":"session","handle":"tok","title":"…","artist":"…","album":"…","duration":200000}
/// {"kind":"session_ended","handle":"tok"}
/// {"kind":"start_supervisor"}   {"kind":"start_watchdog"}
/// {"kind":"task_removed"}       {"kind":"destroyed"}
/// {"kind":"listener_connected"} {"kind":"listener_disconnected"}
/// ```
///
/// Malformed lines are logged and skipped. End of input stops the feed but not
/// the daemon; the watchdog keeps running on its own.
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::event::DaemonEvent;
use crate::record::{NotificationEvent, SessionHandle, SessionMetadata};

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostMessage {
    Notification(NotificationEvent),
    Session(SessionUpdate),
    SessionEnded { handle: SessionHandle },
    StartSupervisor,
    StartWatchdog,
    TaskRemoved,
    Destroyed,
    ListenerConnected,
    ListenerDisconnected,
}

#[derive(Debug, Deserialize)]
pub struct SessionUpdate {
    pub handle: SessionHandle,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub duration: Option<i64>,
}

impl HostMessage {
    /// Maps the message to a daemon event. Connection notices have no event.
    pub fn into_event(self) -> Option<DaemonEvent> {
        match self {
            HostMessage::Notification(n) => Some(DaemonEvent::Notification(n)),
            HostMessage::Session(s) => Some(DaemonEvent::SessionPublished {
                handle: s.handle,
                metadata: SessionMetadata {
                    title: s.title,
                    artist: s.artist,
                    album: s.album,
                    duration: s.duration,
                },
            }),
            HostMessage::SessionEnded { handle } => Some(DaemonEvent::SessionEnded(handle)),
            HostMessage::StartSupervisor => Some(DaemonEvent::SupervisorStart),
            HostMessage::StartWatchdog => Some(DaemonEvent::WatchdogStart),
            HostMessage::TaskRemoved => Some(DaemonEvent::TaskRemoved),
            HostMessage::Destroyed => Some(DaemonEvent::Destroyed),
            HostMessage::ListenerConnected => {
                info!("Notification listener connected");
                None
            }
            HostMessage::ListenerDisconnected => {
                info!("Notification listener disconnected");
                None
            }
        }
    }
}

/// Parses one line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> serde_json::Result<Option<HostMessage>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

/// Reads host messages from `reader` until EOF and forwards them to the event loop.
pub async fn run<R>(mut reader: R, tx: mpsc::Sender<DaemonEvent>)
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                info!("Host feed closed");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Failed to read host feed: {e}");
                return;
            }
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(e) => {
                warn!("Skipping host message that is not UTF-8: {e}");
                continue;
            }
        };

        let message = match parse_line(line) {
            Ok(Some(m)) => m,
            Ok(None) => continue,
            Err(e) => {
                warn!("Skipping malformed host message: {e}");
                continue;
            }
        };

        if let Some(event) = message.into_event() {
            if tx.send(event).await.is_err() {
                break;
            }
        }
    }
}
