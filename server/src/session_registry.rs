//! Session tracking for connected clients
//!
//! This module handles the server-side bookkeeping of live connections:
//! - Session lifecycle (connect, join, disconnect)
//! - Declared identity (username and color) with defaults
//! - Join state, which gates whether a session may capture cells
//!
//! Sessions are never persisted. A session exists from the moment its
//! connection is accepted until the connection closes.

use log::{debug, info};
use shared::{DEFAULT_COLOR, DEFAULT_USERNAME};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

/// Registry-assigned connection handle
pub type SessionId = u64;

/// Self-declared identity of a joined session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub color: String,
}

impl Identity {
    /// Builds an identity from join fields, substituting the defaults for
    /// missing or empty values.
    pub fn from_join(username: Option<String>, color: Option<String>) -> Self {
        Self {
            username: non_empty_or(username, DEFAULT_USERNAME),
            color: non_empty_or(color, DEFAULT_COLOR),
        }
    }
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// A live connection and its declared identity
#[derive(Debug)]
pub struct Session {
    /// Unique session identifier assigned by the registry
    pub id: SessionId,
    /// Peer address of the connection
    pub addr: SocketAddr,
    /// When the connection was accepted
    pub connected_at: Instant,
    /// Identity recorded by the first `join`; None until then
    pub identity: Option<Identity>,
}

impl Session {
    pub fn new(id: SessionId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            identity: None,
        }
    }

    pub fn is_joined(&self) -> bool {
        self.identity.is_some()
    }
}

/// Owns every live session, keyed by session id
///
/// Session ids start at 1 and are never reused within a process, so a late
/// message from a closed connection can never be attributed to a newer one.
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
    next_session_id: SessionId,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            next_session_id: 1,
        }
    }

    /// Registers a new connection and returns its session id
    pub fn on_connect(&mut self, addr: SocketAddr) -> SessionId {
        let session_id = self.next_session_id;
        self.next_session_id += 1;

        info!("Session {} connected from {}", session_id, addr);
        self.sessions.insert(session_id, Session::new(session_id, addr));
        session_id
    }

    /// Records the identity declared by `join`.
    ///
    /// The identity is set once per connection: a repeated join keeps the
    /// first identity. Returns the session's identity, or None when the
    /// session is unknown.
    pub fn on_join(
        &mut self,
        session_id: SessionId,
        username: Option<String>,
        color: Option<String>,
    ) -> Option<&Identity> {
        let session = self.sessions.get_mut(&session_id)?;

        if session.identity.is_some() {
            debug!("Session {} joined again, keeping its identity", session_id);
        } else {
            session.identity = Some(Identity::from_join(username, color));
        }

        session.identity.as_ref()
    }

    /// Discards the session. Returns false if it was already gone.
    pub fn on_disconnect(&mut self, session_id: &SessionId) -> bool {
        if let Some(session) = self.sessions.remove(session_id) {
            info!(
                "Session {} disconnected after {:.1}s",
                session.id,
                session.connected_at.elapsed().as_secs_f32()
            );
            true
        } else {
            false
        }
    }

    pub fn identity_of(&self, session_id: SessionId) -> Option<&Identity> {
        self.sessions
            .get(&session_id)
            .and_then(|session| session.identity.as_ref())
    }

    pub fn session(&self, session_id: SessionId) -> Option<&Session> {
        self.sessions.get(&session_id)
    }

    /// Number of sessions that have joined
    pub fn joined_count(&self) -> usize {
        self.sessions.values().filter(|s| s.is_joined()).count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
