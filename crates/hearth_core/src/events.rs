//! Wire payload types for the substrate's server-emitted events (spec §6).
//!
//! These are plain serializable DTOs; the actual `{event, payload}` framing
//! and dispatch lives in `hearth_server::connection`. Keeping the payload
//! shapes here lets both the connection hub and the lifecycle coordinator
//! share one definition without a dependency cycle.

use crate::room::ConnectionStatus;
use crate::types::{ConnectionId, PlayerId, RoomCode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub player_id: PlayerId,
    pub name: String,
    pub is_host: bool,
    pub status: ConnectionStatus,
}

/// A substrate-level, plugin-agnostic snapshot of a room. Plugins add their
/// own `game_state` view on top via `serialize_room` — the substrate never
/// needs to know what's inside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub code: RoomCode,
    pub game_id: String,
    pub host_player_id: PlayerId,
    pub players: Vec<PlayerSummary>,
    pub phase: crate::room::RoomPhase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomCreatedEvent {
    pub room: RoomSnapshot,
    pub session_token: String,
    pub your_player_id: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomJoinedEvent {
    pub room: RoomSnapshot,
    pub session_token: String,
    pub your_player_id: PlayerId,
    pub reconnected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerJoinedEvent {
    pub player: PlayerSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerLeftEvent {
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDisconnectedEvent {
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostDisconnectedEvent {
    pub former_host_id: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageEvent {
    pub player_id: PlayerId,
    pub name: String,
    pub text: String,
    pub sent_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub message: String,
    pub code: Option<String>,
}

impl ErrorEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), code: None }
    }

    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self { message: message.into(), code: Some(code.into()) }
    }
}

/// Stable error codes referenced by spec §7 (`NotFound` taxonomy).
pub mod error_codes {
    pub const ROOM_NOT_FOUND: &str = "ROOM_NOT_FOUND";
    pub const ROOM_FULL: &str = "ROOM_FULL";
    pub const WRONG_PHASE: &str = "WRONG_PHASE";
    pub const NOT_IN_ROOM: &str = "NOT_IN_ROOM";
    pub const NOT_HOST: &str = "NOT_HOST";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Echo payload used by `webrtc:*` relay events. The server never inspects
/// `data` — only `to_connection_id` for unicast targeting (spec §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebrtcRelayEvent {
    pub from_player_id: PlayerId,
    pub to_connection_id: Option<ConnectionId>,
    #[serde(flatten)]
    pub data: serde_json::Value,
}
