//! Session registry: session id → live transport
//!
//! The registry is shared by the stream and message endpoints. A transport
//! removes itself when it closes, so lookups never yield a closed session.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::transport::{CloseReason, SseTransport};
use crate::{Result, TransportError};

#[derive(Default)]
pub(crate) struct RegistryInner {
    sessions: Mutex<HashMap<String, Arc<SseTransport>>>,
}

impl RegistryInner {
    /// Remove `session_id` only if it still maps to `transport`.
    pub(crate) fn remove_if_same(&self, session_id: &str, transport: &SseTransport) -> bool {
        let mut sessions = self.sessions.lock();
        match sessions.get(session_id) {
            Some(current) if std::ptr::eq(Arc::as_ptr(current), transport) => {
                sessions.remove(session_id);
                debug!(session_id, "Session unregistered on close");
                true
            }
            _ => false,
        }
    }
}

/// Thread-safe map of open sessions. Clones share the same map.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh UUID v7 session id
    pub fn create_session_id() -> String {
        Uuid::now_v7().to_string()
    }

    /// Register a transport under its own session id.
    ///
    /// A live transport already under that id is a `SessionConflict` and is
    /// left untouched. Closed transports and transports owned by another
    /// registry fail with `InvalidState`. A transport removed with
    /// [`unregister`](Self::unregister) may be registered again here.
    pub fn register(&self, transport: Arc<SseTransport>) -> Result<()> {
        let session_id = transport.session_id().to_string();
        let mut sessions = self.inner.sessions.lock();

        if let Some(existing) = sessions.get(&session_id) {
            if !existing.is_closed() {
                return Err(TransportError::SessionConflict(session_id));
            }
        }

        let state = transport.state();
        if state == crate::TransportState::Closed {
            return Err(TransportError::InvalidState {
                operation: "register",
                state,
            });
        }
        if !transport.attach_registry(&self.inner) {
            // Owned by another registry
            return Err(TransportError::InvalidState {
                operation: "register",
                state,
            });
        }

        sessions.insert(session_id.clone(), transport);
        info!(session_id = %session_id, total = sessions.len(), "Session registered");
        Ok(())
    }

    /// Find the open transport for a session id
    pub fn lookup(&self, session_id: &str) -> Result<Arc<SseTransport>> {
        self.inner
            .sessions
            .lock()
            .get(session_id)
            .filter(|transport| !transport.is_closed())
            .cloned()
            .ok_or_else(|| TransportError::NotFound(session_id.to_string()))
    }

    /// Remove an entry without closing it. Absent ids are a no-op.
    pub fn unregister(&self, session_id: &str) -> bool {
        let removed = self.inner.sessions.lock().remove(session_id).is_some();
        if removed {
            debug!(session_id, "Session unregistered");
        }
        removed
    }

    /// Whether an open transport is registered under `session_id`
    pub fn contains(&self, session_id: &str) -> bool {
        self.lookup(session_id).is_ok()
    }

    /// Number of registered sessions
    pub fn len(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    /// Whether no session is registered
    pub fn is_empty(&self) -> bool {
        self.inner.sessions.lock().is_empty()
    }

    /// Ids of every registered session, in no particular order
    pub fn session_ids(&self) -> Vec<String> {
        self.inner.sessions.lock().keys().cloned().collect()
    }

    /// Close every registered session with `CloseReason::Shutdown`.
    ///
    /// Returns how many sessions were closed.
    pub fn close_all(&self) -> usize {
        let transports: Vec<Arc<SseTransport>> = self
            .inner
            .sessions
            .lock()
            .drain()
            .map(|(_, transport)| transport)
            .collect();

        // Lock released: on_close callbacks may touch the registry
        let closed = transports
            .iter()
            .filter(|transport| transport.terminate(CloseReason::Shutdown))
            .count();
        if closed > 0 {
            info!(closed, "Closed all SSE sessions");
        }
        closed
    }
}
