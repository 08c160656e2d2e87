//! Capture coordination: the authoritative rules of the game
//!
//! The coordinator owns the grid and the session registry and is driven by
//! one event at a time from the server loop. A capture succeeds only for a
//! joined session, an in-range cell and an unclaimed cell; every rejection is
//! silent, because the protocol has no error channel. A successful capture
//! is broadcast to every session together with the recomputed leaderboard,
//! then persisted without waiting for the disk.

use crate::grid_store::GridStore;
use crate::leaderboard;
use crate::persistence::SnapshotWriter;
use crate::session_registry::{SessionId, SessionRegistry};
use crate::transport::Transport;
use crate::utils::get_timestamp;
use log::{debug, info};
use shared::{CellOwner, LeaderboardEntry, ServerEvent};
use std::net::SocketAddr;

/// Result of a capture request. Never sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Captured,
    NotJoined,
    OutOfRange,
    AlreadyClaimed,
}

pub struct CaptureCoordinator<T: Transport> {
    grid: GridStore,
    sessions: SessionRegistry,
    transport: T,
    snapshots: SnapshotWriter,
    last_timestamp: u64,
}

impl<T: Transport> CaptureCoordinator<T> {
    pub fn new(grid: GridStore, transport: T, snapshots: SnapshotWriter) -> Self {
        let last_timestamp = grid.latest_timestamp();
        Self {
            grid,
            sessions: SessionRegistry::new(),
            transport,
            snapshots,
            last_timestamp,
        }
    }

    pub fn handle_connect(&mut self, addr: SocketAddr) -> SessionId {
        self.sessions.on_connect(addr)
    }

    /// Records the session's identity and sends it, and only it, the full
    /// grid and the current leaderboard.
    pub fn handle_join(
        &mut self,
        session_id: SessionId,
        username: Option<String>,
        color: Option<String>,
    ) {
        let Some(identity) = self.sessions.on_join(session_id, username, color) else {
            debug!("Ignoring join from unknown session {}", session_id);
            return;
        };
        info!(
            "Session {} joined as {} ({})",
            session_id, identity.username, identity.color
        );

        let grid = ServerEvent::GridInit(self.grid.cells().to_vec());
        let board = ServerEvent::LeaderboardUpdate(self.leaderboard());
        self.transport.send_to(session_id, &grid);
        self.transport.send_to(session_id, &board);
    }

    /// Validates and applies a capture request.
    pub fn handle_capture(&mut self, session_id: SessionId, cell_id: i64) -> CaptureOutcome {
        let Some(identity) = self.sessions.identity_of(session_id).cloned() else {
            debug!("Session {} tried to capture before joining", session_id);
            return CaptureOutcome::NotJoined;
        };
        let Some(index) = self.grid.index_of(cell_id) else {
            debug!("Session {} sent out-of-range cell {}", session_id, cell_id);
            return CaptureOutcome::OutOfRange;
        };
        if self.grid.get(index).is_some_and(|cell| cell.is_some()) {
            return CaptureOutcome::AlreadyClaimed;
        }

        let owner = CellOwner {
            username: identity.username,
            color: identity.color,
            timestamp: self.next_timestamp(),
        };

        if !self.grid.try_set_if_unclaimed(index, owner.clone()) {
            return CaptureOutcome::AlreadyClaimed;
        }
        debug!("Session {} captured cell {} as {}", session_id, index, owner.username);

        self.transport.broadcast(&ServerEvent::GridUpdate {
            cell_id: index,
            owner,
        });
        let board = ServerEvent::LeaderboardUpdate(self.leaderboard());
        self.transport.broadcast(&board);
        self.snapshots.publish(self.grid.snapshot());

        CaptureOutcome::Captured
    }

    pub fn handle_disconnect(&mut self, session_id: SessionId) {
        self.sessions.on_disconnect(&session_id);
        self.transport.detach(session_id);
    }

    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        leaderboard::compute(self.grid.cells())
    }

    pub fn grid(&self) -> &GridStore {
        &self.grid
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Wall-clock milliseconds, forced strictly above the previous capture.
    /// Saturates at `u64::MAX` when a restored grid already holds it.
    fn next_timestamp(&mut self) -> u64 {
        self.last_timestamp = get_timestamp().max(self.last_timestamp.saturating_add(1));
        self.last_timestamp
    }
}
