/// Turns a music app's notification into a [`PlaybackRecord`].
///
/// Two sources are layered:
///   1. The notification's free text. Always present but ambiguous: the
///      sub-text is sometimes the album and sometimes a navigation label, and
///      the body is usually "Artist • Album".
///   2. The structured media session, when the notification carries a handle
///      that still resolves. Each non-empty session field overrides the
///      free-text guess; the session is the only source of a duration.
///
/// A record is produced only when a non-empty title survives both phases.
use chrono::Utc;
use tracing::{debug, warn};

use crate::config::ExtractorConfig;
use crate::host::Host;
use crate::record::{NotificationEvent, PlaybackRecord, SessionMetadata};

/// Separates artist from album in the notification body.
pub const SEPARATOR: &str = " • ";

/// Field candidates after the free-text phase.
#[derive(Debug, Default, PartialEq, Eq)]
struct Candidates {
    title: String,
    artist: String,
    album: String,
    duration: u64,
}

/// Resolves the event's session through `host`, then extracts a record stamped
/// with the current time.
///
/// Events from other packages are dropped before the host is consulted. A
/// session that cannot be resolved only disables the override phase.
pub fn extract_from_host<H: Host + ?Sized>(
    host: &H,
    event: &NotificationEvent,
    config: &ExtractorConfig,
) -> Option<PlaybackRecord> {
    if !config.is_target(&event.package) {
        debug!("Ignoring notification from {}", event.package);
        return None;
    }

    let session = event
        .session
        .as_ref()
        .and_then(|handle| match host.resolve_session(handle) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!("No session metadata, using notification text only: {e}");
                None
            }
        });

    extract(event, session.as_ref(), config, Utc::now().timestamp_millis())
}

/// Pure extraction over one event and its optional session metadata.
pub fn extract(
    event: &NotificationEvent,
    session: Option<&SessionMetadata>,
    config: &ExtractorConfig,
    now_ms: i64,
) -> Option<PlaybackRecord> {
    if !config.is_target(&event.package) {
        return None;
    }

    let mut candidates = from_notification_text(event, config);
    if let Some(session) = session {
        apply_session(&mut candidates, session);
    }

    let record = PlaybackRecord::new(
        now_ms,
        candidates.title,
        candidates.artist,
        candidates.album,
        candidates.duration,
        event.package.clone(),
    );
    if record.is_none() {
        debug!("Notification from {} has no title; dropped", event.package);
    }
    record
}

fn from_notification_text(event: &NotificationEvent, config: &ExtractorConfig) -> Candidates {
    let text = non_empty(event.text.as_deref());

    let mut album = match non_empty(event.sub_text.as_deref()) {
        Some(sub) if !config.is_denied_subtext(sub) => sub.to_string(),
        _ => String::new(),
    };

    let artist = match text {
        Some(text) => {
            let mut parts = text.split(SEPARATOR);
            let first = parts.next().unwrap_or_default();
            match parts.next() {
                Some(second) => {
                    if album.is_empty() {
                        album = second.trim().to_string();
                    }
                    first.trim().to_string()
                }
                None => text.to_string(),
            }
        }
        None => String::new(),
    };

    Candidates {
        title: event.title.clone().unwrap_or_default(),
        artist,
        album,
        duration: 0,
    }
}

fn apply_session(candidates: &mut Candidates, session: &SessionMetadata) {
    if let Some(title) = non_empty(session.title.as_deref()) {
        candidates.title = title.to_string();
    }
    if let Some(artist) = non_empty(session.artist.as_deref()) {
        candidates.artist = artist.to_string();
    }
    if let Some(album) = non_empty(session.album.as_deref()) {
        candidates.album = album.to_string();
    }
    if let Some(duration) = session.duration.filter(|d| *d > 0) {
        candidates.duration = duration as u64;
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}
