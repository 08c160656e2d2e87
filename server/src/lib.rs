//! # Grid Server Library
//!
//! This library provides the authoritative server for a shared grid of cells
//! that connected players race to claim. A cell is claimed at most once; the
//! first capture request the server processes wins, and every connected
//! session learns about it through a broadcast.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative State
//! The server owns the only writable copy of the grid. Clients never mutate
//! it directly; they send `join` and `capture` events and conform to the
//! `grid:init`, `grid:update` and `leaderboard:update` events they receive.
//!
//! ### Session Management
//! Tracks every WebSocket connection from connect to disconnect, including
//! the identity (username and color) a session declares when it joins.
//! Sessions that never join may watch the grid but cannot capture cells.
//!
//! ### Persistence
//! After each successful capture the grid is handed to a background writer
//! that stores it as a JSON snapshot, so the board survives restarts.
//!
//! ## Architecture Design
//!
//! ### Single Event Loop
//! Each connection runs in its own task, but all game events funnel into a
//! single loop that owns the [`game::CaptureCoordinator`]. Events are handled
//! one at a time, which makes capture conflicts impossible to interleave.
//!
//! ### WebSocket Transport
//! Clients connect over WebSocket at `/ws`. The HTTP root answers with a
//! plain-text liveness message. Cross-origin access is governed by
//! [`config::CorsOrigin`].
//!
//! ## Module Organization
//!
//! - `config`: server settings and the cross-origin policy
//! - `game`: the capture coordinator, where every event is decided
//! - `grid_store`: the cell array and its snapshot file format
//! - `leaderboard`: ranking of players by claimed cells
//! - `network`: HTTP/WebSocket handling and the server loop
//! - `persistence`: non-blocking snapshot writing
//! - `session_registry`: connection lifecycle and player identities
//! - `transport`: delivery of server events to sessions
//! - `utils`: timestamps and file helpers
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = ServerConfig::default();
//!     server::network::serve(config, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```

pub mod config;
pub mod game;
pub mod grid_store;
pub mod leaderboard;
pub mod network;
pub mod persistence;
pub mod session_registry;
pub mod transport;
pub mod utils;

pub use config::{CorsOrigin, ServerConfig};
pub use game::{CaptureCoordinator, CaptureOutcome};
pub use grid_store::GridStore;
pub use network::{serve, serve_listener};
