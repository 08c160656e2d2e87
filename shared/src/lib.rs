//! Wire protocol and data types shared by the grid server and its clients.
//!
//! Every WebSocket text frame carries exactly one event encoded as a JSON
//! envelope: `{"event": "<name>", "data": <payload>}`. Event names follow the
//! `noun:verb` convention used by browser clients (`grid:init`,
//! `grid:update`, `leaderboard:update`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default grid side length (60 × 60 = 3600 cells).
pub const DEFAULT_GRID_SIZE: usize = 60;
pub const DEFAULT_PORT: u16 = 3001;

/// Username recorded when a client joins without one.
pub const DEFAULT_USERNAME: &str = "Anonymous";
/// Color recorded when a client joins without one.
pub const DEFAULT_COLOR: &str = "#888888";

/// Maximum number of entries in a leaderboard update.
pub const LEADERBOARD_SIZE: usize = 10;

/// Number of cells in a square grid of the given side length.
pub fn total_cells(side: usize) -> usize {
    side * side
}

/// Owner record of a claimed cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellOwner {
    pub username: String,
    pub color: String,
    /// Capture time in milliseconds since the Unix epoch
    pub timestamp: u64,
}

/// A grid cell: `None` while unclaimed, serialized as JSON `null`.
pub type Cell = Option<CellOwner>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub username: String,
    pub color: String,
    pub count: usize,
}

/// Events sent by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "join")]
    Join {
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        color: Option<String>,
    },
    /// `cellId` is signed so that out-of-range requests such as `-1` still
    /// decode and can be rejected by the server instead of the codec.
    #[serde(rename = "capture")]
    Capture {
        #[serde(rename = "cellId")]
        cell_id: i64,
    },
}

/// Events sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Full grid, unicast to a session right after it joins
    #[serde(rename = "grid:init")]
    GridInit(Vec<Cell>),
    /// A single successful capture, broadcast to every session
    #[serde(rename = "grid:update")]
    GridUpdate {
        #[serde(rename = "cellId")]
        cell_id: usize,
        owner: CellOwner,
    },
    #[serde(rename = "leaderboard:update")]
    LeaderboardUpdate(Vec<LeaderboardEntry>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    Serialization(String),
    Deserialization(String),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialization(e) => write!(f, "serialization error: {e}"),
            Self::Deserialization(e) => write!(f, "deserialization error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl ClientEvent {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }
}

impl ServerEvent {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }

    /// Event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GridInit(_) => "grid:init",
            Self::GridUpdate { .. } => "grid:update",
            Self::LeaderboardUpdate(_) => "leaderboard:update",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_join() {
        let event = ClientEvent::decode(r##"{"event":"join","data":{"username":"alice","color":"#f00"}}"##)
            .unwrap();
        assert_eq!(
            event,
            ClientEvent::Join {
                username: Some("alice".to_string()),
                color: Some("#f00".to_string()),
            }
        );
    }

    #[test]
    fn test_decode_join_missing_fields() {
        let event = ClientEvent::decode(r#"{"event":"join","data":{"username":null}}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::Join {
                username: None,
                color: None,
            }
        );
    }

    #[test]
    fn test_decode_capture_negative_cell() {
        let event = ClientEvent::decode(r#"{"event":"capture","data":{"cellId":-1}}"#).unwrap();
        assert_eq!(event, ClientEvent::Capture { cell_id: -1 });
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let cases = [
            "not json",
            r#"{"event":"capture","data":{"cellId":"7"}}"#,
            r#"{"event":"capture","data":{"cellId":1.5}}"#,
            r#"{"event":"explode","data":{}}"#,
            r#"{"data":{"cellId":1}}"#,
        ];

        for case in cases {
            let result = ClientEvent::decode(case);
            assert!(
                matches!(result, Err(ProtocolError::Deserialization(_))),
                "should reject: {}",
                case
            );
        }
    }

    #[test]
    fn test_grid_update_wire_shape() {
        let event = ServerEvent::GridUpdate {
            cell_id: 1,
            owner: CellOwner {
                username: "alice".to_string(),
                color: "#f00".to_string(),
                timestamp: 42,
            },
        };

        let value: serde_json::Value = serde_json::from_str(&event.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "grid:update",
                "data": {
                    "cellId": 1,
                    "owner": { "username": "alice", "color": "#f00", "timestamp": 42 }
                }
            })
        );
    }

    #[test]
    fn test_grid_init_encodes_unclaimed_as_null() {
        let event = ServerEvent::GridInit(vec![None, None, None, None]);
        let value: serde_json::Value = serde_json::from_str(&event.encode().unwrap()).unwrap();
        assert_eq!(value, json!({ "event": "grid:init", "data": [null, null, null, null] }));
    }

    #[test]
    fn test_empty_leaderboard_wire_shape() {
        let event = ServerEvent::LeaderboardUpdate(Vec::new());
        assert_eq!(
            event.encode().unwrap(),
            r#"{"event":"leaderboard:update","data":[]}"#
        );
        assert_eq!(event.name(), "leaderboard:update");
    }

    #[test]
    fn test_total_cells() {
        assert_eq!(total_cells(DEFAULT_GRID_SIZE), 3600);
        assert_eq!(total_cells(2), 4);
        assert_eq!(total_cells(1), 1);
    }
}
