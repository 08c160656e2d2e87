//! # Grid Client Library
//!
//! This library provides a headless client for the grid server. It connects
//! over WebSocket, speaks the JSON event protocol from the `shared` crate and
//! keeps a local mirror of the grid and leaderboard.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! [`GridMirror`] applies `grid:init`, `grid:update` and `leaderboard:update`
//! events to a local copy of the board. The mirror is never authoritative;
//! a capture only shows up after the server broadcasts it.
//!
//! ### Network Module (`network`)
//! [`GridClient`] wraps a single WebSocket connection:
//! - Connection establishment, optionally with a browser-style `Origin`
//! - Sending `join` and `capture` events
//! - Receiving server events, with or without a deadline
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::{GridClient, GridMirror};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), client::ClientError> {
//! let mut client = GridClient::connect("ws://127.0.0.1:3001/ws").await?;
//! let mut mirror = GridMirror::new();
//!
//! client.join(Some("alice"), Some("#ff0000")).await?;
//! while !mirror.is_initialized() {
//!     mirror.apply(&client.next_event_timeout(Duration::from_secs(5)).await?);
//! }
//!
//! if let Some(&cell) = mirror.unclaimed_cells().first() {
//!     client.capture(cell as i64).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod game;
pub mod network;

pub use game::GridMirror;
pub use network::{ClientError, GridClient};
