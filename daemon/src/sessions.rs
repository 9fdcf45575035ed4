use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::host::HostError;
use crate::record::{SessionHandle, SessionMetadata};

/// Media sessions currently published by the host, keyed by handle.
///
/// Sessions come and go independently of notifications; a notification may
/// reference a handle that was never published or has already ended.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionHandle, SessionMetadata>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes or replaces the metadata behind `handle`.
    pub fn publish(&self, handle: SessionHandle, metadata: SessionMetadata) {
        debug!("Session {handle} published");
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(handle, metadata);
    }

    /// Forgets `handle`; later lookups fail as stale.
    pub fn end(&self, handle: &SessionHandle) {
        if self
            .sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(handle)
            .is_some()
        {
            debug!("Session {handle} ended");
        }
    }

    pub fn resolve(&self, handle: &SessionHandle) -> Result<SessionMetadata, HostError> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(handle)
            .cloned()
            .ok_or_else(|| HostError::SessionUnavailable(handle.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(s: &str) -> SessionHandle {
        SessionHandle(s.to_string())
    }

    fn meta(title: &str) -> SessionMetadata {
        SessionMetadata {
            title: Some(title.to_string()),
            ..SessionMetadata::default()
        }
    }

    #[test]
    fn unknown_handle_is_unavailable() {
        let r = SessionRegistry::new();
        assert!(matches!(r.resolve(&handle("x")), Err(HostError::SessionUnavailable(_))));
    }

    #[test]
    fn publish_then_resolve() {
        let r = SessionRegistry::new();
        r.publish(handle("a"), meta("Song"));
        assert_eq!(r.resolve(&handle("a")).unwrap(), meta("Song"));
    }

    #[test]
    fn publish_replaces_previous_metadata() {
        let r = SessionRegistry::new();
        r.publish(handle("a"), meta("One"));
        r.publish(handle("a"), meta("Two"));
        assert_eq!(r.resolve(&handle("a")).unwrap().title.as_deref(), Some("Two"));
    }

    #[test]
    fn ended_handle_becomes_stale() {
        let r = SessionRegistry::new();
        r.publish(handle("a"), meta("Song"));
        r.end(&handle("a"));
        assert!(r.resolve(&handle("a")).is_err());
    }

    #[test]
    fn ending_unknown_handle_is_harmless() {
        let r = SessionRegistry::new();
        r.end(&handle("never"));
        assert!(r.resolve(&handle("never")).is_err());
    }
}
