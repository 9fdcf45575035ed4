use serde::{Deserialize, Serialize};
use std::fmt;

/// One observed playback, as stored in the scrobble queue.
///
/// Only [`PlaybackRecord::new`] builds records inside the daemon, and it refuses
/// an empty title. Every other field may be empty or zero, meaning "unknown".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackRecord {
    /// Milliseconds since the Unix epoch, taken at extraction time.
    pub timestamp: i64,
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    /// Track length in milliseconds; 0 when unknown.
    #[serde(default)]
    pub duration: u64,
    /// Package identifier of the app that posted the notification.
    pub source: String,
}

impl PlaybackRecord {
    /// Returns `None` when `title` is empty.
    pub fn new(
        timestamp: i64,
        title: impl Into<String>,
        artist: impl Into<String>,
        album: impl Into<String>,
        duration: u64,
        source: impl Into<String>,
    ) -> Option<Self> {
        let title = title.into();
        if title.is_empty() {
            return None;
        }
        Some(Self {
            timestamp,
            title,
            artist: artist.into(),
            album: album.into(),
            duration,
            source: source.into(),
        })
    }
}

/// Opaque reference to a media session, carried by a notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(pub String);

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A notification posted by some application on the host.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationEvent {
    /// Application identifier of the poster.
    pub package: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Body text. Music apps usually put "Artist • Album" here.
    #[serde(default)]
    pub text: Option<String>,
    /// Secondary line; sometimes the album, sometimes a navigation label.
    #[serde(default)]
    pub sub_text: Option<String>,
    #[serde(default)]
    pub session: Option<SessionHandle>,
}

/// Structured metadata published by a media session. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SessionMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    /// Milliseconds. Zero or negative values mean "unknown".
    #[serde(default)]
    pub duration: Option<i64>,
}
