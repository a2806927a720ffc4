//! In-process session registry.
//!
//! One unbounded channel per connected client. Socket tasks own the
//! receiving end and write frames out; the gateway only ever sees
//! [`ClientTransport`].

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;
use vany_bus::SessionId;
use vany_telemetry::GATEWAY_SESSIONS;

use crate::transport::{ClientTransport, OutboundFrame};
use crate::DeliveryError;

/// Frames waiting for one session.
pub type SessionReceiver = mpsc::UnboundedReceiver<OutboundFrame>;

/// Connected client sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, mpsc::UnboundedSender<OutboundFrame>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session under a fresh random id.
    pub fn open_session(&self) -> (SessionId, SessionReceiver) {
        let sid = SessionId::new(Uuid::new_v4().simple().to_string());
        let receiver = self.open_session_with(sid.clone());
        (sid, receiver)
    }

    /// Register a session under a caller-chosen id, replacing any existing
    /// session with that id.
    pub fn open_session_with(&self, sid: SessionId) -> SessionReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.sessions.insert(sid.clone(), tx).is_some() {
            warn!(sid = %sid, "Session id reused, previous session detached");
        }
        GATEWAY_SESSIONS.set(self.sessions.len() as f64);
        debug!(sid = %sid, "Session opened");
        rx
    }

    /// Forget a session. Returns whether it was registered.
    pub fn close_session(&self, sid: &SessionId) -> bool {
        let removed = self.sessions.remove(sid).is_some();
        if removed {
            GATEWAY_SESSIONS.set(self.sessions.len() as f64);
            debug!(sid = %sid, "Session closed");
        }
        removed
    }

    #[must_use]
    pub fn contains(&self, sid: &SessionId) -> bool {
        self.sessions.contains_key(sid)
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl ClientTransport for SessionRegistry {
    fn emit_to(&self, sid: &SessionId, frame: OutboundFrame) -> Result<(), DeliveryError> {
        let sent = match self.sessions.get(sid) {
            Some(sender) => sender.send(frame).is_ok(),
            None => return Err(DeliveryError::UnknownSession(sid.clone())),
        };
        if sent {
            Ok(())
        } else {
            self.close_session(sid);
            Err(DeliveryError::SessionClosed(sid.clone()))
        }
    }

    fn broadcast(&self, frame: OutboundFrame) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();
        for entry in self.sessions.iter() {
            if entry.value().send(frame.clone()).is_ok() {
                delivered += 1;
            } else {
                closed.push(entry.key().clone());
            }
        }
        for sid in &closed {
            self.close_session(sid);
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: &str) -> OutboundFrame {
        OutboundFrame {
            event: event.to_string(),
            payload: "{}".to_string(),
        }
    }

    #[test]
    fn test_emit_to_reaches_only_that_session() {
        let registry = SessionRegistry::new();
        let (a, mut rx_a) = registry.open_session();
        let (_b, mut rx_b) = registry.open_session();

        registry.emit_to(&a, frame("btscan_response")).unwrap();

        assert_eq!(rx_a.try_recv().unwrap().event, "btscan_response");
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_reaches_all() {
        let registry = SessionRegistry::new();
        let mut receivers: Vec<_> = (0..3).map(|_| registry.open_session().1).collect();

        assert_eq!(registry.broadcast(frame("hello_response")), 3);
        for rx in &mut receivers {
            assert_eq!(rx.try_recv().unwrap().event, "hello_response");
        }
    }

    #[test]
    fn test_unknown_and_closed_sessions() {
        let registry = SessionRegistry::new();
        let ghost = SessionId::new("ghost");
        assert_eq!(
            registry.emit_to(&ghost, frame("x")),
            Err(DeliveryError::UnknownSession(ghost))
        );

        let (sid, rx) = registry.open_session();
        drop(rx);
        assert_eq!(
            registry.emit_to(&sid, frame("x")),
            Err(DeliveryError::SessionClosed(sid.clone()))
        );
        assert!(!registry.contains(&sid));
    }

    #[test]
    fn test_broadcast_prunes_dropped_sessions() {
        let registry = SessionRegistry::new();
        let (_live, _rx) = registry.open_session();
        let (_dead, rx_dead) = registry.open_session();
        drop(rx_dead);

        assert_eq!(registry.broadcast(frame("hello_response")), 1);
        assert_eq!(registry.session_count(), 1);
    }

    #[test]
    fn test_open_with_and_close() {
        let registry = SessionRegistry::new();
        let sid = SessionId::new("s1");
        let _rx = registry.open_session_with(sid.clone());
        assert!(registry.contains(&sid));
        assert!(registry.close_session(&sid));
        assert!(!registry.close_session(&sid));
    }
}
