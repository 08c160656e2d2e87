//! Delivery of server events to sessions
//!
//! The coordinator talks to sessions only through [`Transport`]: unicast for
//! the join response, broadcast for captures. [`ChannelTransport`] is the
//! production implementation; each session gets a bounded outbound queue
//! that its connection task drains into the WebSocket. Sending never waits:
//! a session whose queue is full is detached, which closes its connection,
//! so a stalled client can neither block the event loop nor grow it.

use crate::session_registry::SessionId;
use axum::extract::ws::{Message, Utf8Bytes};
use log::{debug, error, warn};
use shared::ServerEvent;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Messages a session may have queued before it counts as stalled
pub const OUTBOUND_CAPACITY: usize = 256;

/// Outbound queue of a single connection
pub type Outbound = mpsc::Sender<Message>;

/// Creates the outbound queue for a new connection
pub fn outbound_channel() -> (Outbound, mpsc::Receiver<Message>) {
    mpsc::channel(OUTBOUND_CAPACITY)
}

pub trait Transport {
    /// Sends an event to one session
    fn send_to(&mut self, session_id: SessionId, event: &ServerEvent);

    /// Sends an event to every attached session
    fn broadcast(&mut self, event: &ServerEvent);

    /// Stops delivering to a session
    fn detach(&mut self, session_id: SessionId);
}

/// Fans events out over per-session mpsc queues
#[derive(Default)]
pub struct ChannelTransport {
    peers: HashMap<SessionId, Outbound>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, session_id: SessionId, sender: Outbound) {
        self.peers.insert(session_id, sender);
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    fn encode(event: &ServerEvent) -> Option<Utf8Bytes> {
        match event.encode() {
            Ok(text) => Some(Utf8Bytes::from(text)),
            Err(e) => {
                error!("Failed to encode {} event: {}", event.name(), e);
                None
            }
        }
    }

    /// Queues a frame; false when the session must be detached
    fn deliver(session_id: SessionId, peer: &Outbound, text: Utf8Bytes) -> bool {
        match peer.try_send(Message::Text(text)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Session {} has {} undelivered messages, dropping it",
                    session_id, OUTBOUND_CAPACITY
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Session {} outbound queue closed", session_id);
                false
            }
        }
    }
}

impl Transport for ChannelTransport {
    fn send_to(&mut self, session_id: SessionId, event: &ServerEvent) {
        let Some(peer) = self.peers.get(&session_id) else {
            debug!("Dropping {} for detached session {}", event.name(), session_id);
            return;
        };
        let Some(text) = Self::encode(event) else {
            return;
        };

        if !Self::deliver(session_id, peer, text) {
            self.detach(session_id);
        }
    }

    fn broadcast(&mut self, event: &ServerEvent) {
        if self.peers.is_empty() {
            return;
        }
        // Encode once, share the bytes across all sessions
        let Some(text) = Self::encode(event) else {
            return;
        };

        self.peers
            .retain(|&session_id, peer| Self::deliver(session_id, peer, text.clone()));
    }

    fn detach(&mut self, session_id: SessionId) {
        self.peers.remove(&session_id);
    }
}

/// Transport that records deliveries, for exercising the coordinator
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingTransport {
    pub unicasts: Vec<(SessionId, ServerEvent)>,
    pub broadcasts: Vec<ServerEvent>,
    pub detached: Vec<SessionId>,
}

#[cfg(test)]
impl RecordingTransport {
    pub fn clear(&mut self) {
        self.unicasts.clear();
        self.broadcasts.clear();
    }
}

#[cfg(test)]
impl Transport for RecordingTransport {
    fn send_to(&mut self, session_id: SessionId, event: &ServerEvent) {
        self.unicasts.push((session_id, event.clone()));
    }

    fn broadcast(&mut self, event: &ServerEvent) {
        self.broadcasts.push(event.clone());
    }

    fn detach(&mut self, session_id: SessionId) {
        self.detached.push(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{CellOwner, LeaderboardEntry};

    fn text_of(message: Message) -> String {
        match message {
            Message::Text(text) => text.as_str().to_string(),
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    fn update_event() -> ServerEvent {
        ServerEvent::GridUpdate {
            cell_id: 3,
            owner: CellOwner {
                username: "alice".to_string(),
                color: "#f00".to_string(),
                timestamp: 9,
            },
        }
    }

    #[test]
    fn test_send_to_reaches_only_target() {
        let mut transport = ChannelTransport::new();
        let (tx1, mut rx1) = outbound_channel();
        let (tx2, mut rx2) = outbound_channel();
        transport.attach(1, tx1);
        transport.attach(2, tx2);

        transport.send_to(2, &ServerEvent::LeaderboardUpdate(Vec::new()));

        assert!(rx1.try_recv().is_err());
        assert_eq!(
            text_of(rx2.try_recv().unwrap()),
            r#"{"event":"leaderboard:update","data":[]}"#
        );
    }

    #[test]
    fn test_broadcast_reaches_every_peer() {
        let mut transport = ChannelTransport::new();
        let mut receivers = Vec::new();
        for id in 1..=3 {
            let (tx, rx) = outbound_channel();
            transport.attach(id, tx);
            receivers.push(rx);
        }

        transport.broadcast(&update_event());

        for rx in &mut receivers {
            let decoded = ServerEvent::decode(&text_of(rx.try_recv().unwrap())).unwrap();
            assert_eq!(decoded, update_event());
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn test_detach_stops_delivery() {
        let mut transport = ChannelTransport::new();
        let (tx, mut rx) = outbound_channel();
        transport.attach(7, tx);
        transport.detach(7);

        transport.broadcast(&update_event());
        transport.send_to(7, &update_event());

        assert!(transport.is_empty());
        // Sender was dropped on detach, so the queue is closed and empty
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_closed_peer_does_not_block_others() {
        let mut transport = ChannelTransport::new();
        let (tx1, rx1) = outbound_channel();
        let (tx2, mut rx2) = outbound_channel();
        transport.attach(1, tx1);
        transport.attach(2, tx2);
        drop(rx1);

        let board = vec![LeaderboardEntry {
            username: "alice".to_string(),
            color: "#f00".to_string(),
            count: 1,
        }];
        transport.broadcast(&ServerEvent::LeaderboardUpdate(board.clone()));

        let decoded = ServerEvent::decode(&text_of(rx2.try_recv().unwrap())).unwrap();
        assert_eq!(decoded, ServerEvent::LeaderboardUpdate(board));
        assert_eq!(transport.len(), 1);
    }

    #[test]
    fn test_full_queue_detaches_stalled_session() {
        let mut transport = ChannelTransport::new();
        let (stalled_tx, mut stalled_rx) = outbound_channel();
        let (reader_tx, mut reader_rx) = outbound_channel();
        transport.attach(1, stalled_tx);
        transport.attach(2, reader_tx);

        for _ in 0..OUTBOUND_CAPACITY {
            transport.broadcast(&update_event());
            assert!(reader_rx.try_recv().is_ok());
        }
        assert_eq!(transport.len(), 2);

        // One more than the stalled session can hold
        transport.broadcast(&update_event());

        assert_eq!(transport.len(), 1);
        assert!(reader_rx.try_recv().is_ok());

        transport.send_to(1, &update_event());
        for _ in 0..OUTBOUND_CAPACITY {
            assert!(stalled_rx.try_recv().is_ok());
        }
        // Sender was dropped on detach, so nothing more arrives
        assert!(matches!(
            stalled_rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_full_queue_on_unicast_detaches() {
        let mut transport = ChannelTransport::new();
        let (tx, _rx) = outbound_channel();
        transport.attach(3, tx);

        for _ in 0..OUTBOUND_CAPACITY {
            transport.send_to(3, &ServerEvent::GridInit(vec![None; 4]));
        }
        assert_eq!(transport.len(), 1);

        transport.send_to(3, &ServerEvent::GridInit(vec![None; 4]));
        assert!(transport.is_empty());
    }
}
