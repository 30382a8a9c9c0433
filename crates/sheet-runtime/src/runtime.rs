#![forbid(unsafe_code)]

//! Control-thread registry of live sessions.
//!
//! [`SheetRuntime`] is the natural state for a [`crate::control::ControlLoop`]:
//! it owns every session created through it, shares one coordinator and one
//! config between them, and lets cross-thread callers address sessions by id.

use ahash::AHashMap;
use tracing::debug;

use crate::config::SheetConfig;
use crate::coordinator::Coordinator;
use crate::host::SheetHost;
use crate::session::{Session, SessionId};

/// Sessions sharing one coordinator.
#[derive(Debug)]
pub struct SheetRuntime {
    coordinator: Coordinator,
    config: SheetConfig,
    sessions: AHashMap<SessionId, Session>,
}

impl Default for SheetRuntime {
    fn default() -> Self {
        Self::new(Coordinator::new(), SheetConfig::default())
    }
}

impl SheetRuntime {
    #[must_use]
    pub fn new(coordinator: Coordinator, config: SheetConfig) -> Self {
        Self {
            coordinator,
            config,
            sessions: AHashMap::new(),
        }
    }

    /// Runtime bound to the thread's global coordinator.
    #[must_use]
    pub fn with_global_coordinator(config: SheetConfig) -> Self {
        Self::new(Coordinator::global(), config)
    }

    #[inline]
    #[must_use]
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &SheetConfig {
        &self.config
    }

    /// Create and register a session bound to `host`.
    pub fn create_session(&mut self, host: impl SheetHost + 'static) -> Session {
        let session = Session::new(host, &self.coordinator, &self.config);
        self.sessions.insert(session.id(), session.clone());
        session
    }

    #[must_use]
    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Unregister a session. It is torn down once its last handle drops.
    pub fn remove_session(&mut self, id: SessionId) -> Option<Session> {
        let removed = self.sessions.remove(&id);
        if removed.is_some() {
            debug!(session = %id, "session unregistered");
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Ids of registered sessions, in ascending order.
    #[must_use]
    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Sessions currently presenting or presented.
    #[must_use]
    pub fn open_sessions(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.is_open())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::FallbackHost;

    #[test]
    fn create_lookup_remove() {
        let mut runtime = SheetRuntime::default();
        let session = runtime.create_session(FallbackHost::default());
        assert_eq!(runtime.len(), 1);
        assert!(runtime.session(session.id()).is_some());
        assert_eq!(runtime.session_ids(), vec![session.id()]);
        assert!(runtime.remove_session(session.id()).is_some());
        assert!(runtime.remove_session(session.id()).is_none());
        assert!(runtime.is_empty());
    }

    #[test]
    fn fallback_sessions_never_open() {
        let mut runtime = SheetRuntime::default();
        let session = runtime.create_session(FallbackHost::new("test"));
        session.on_host_attach();
        session.present();
        assert!(runtime.open_sessions().is_empty());
    }
}
