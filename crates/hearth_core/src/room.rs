//! The `Room` and `Player` data model. See spec §3.
//!
//! Rooms own players by value keyed by `ConnectionId` — there is no
//! `Player -> Room` back-reference, avoiding the aliasing cycle the teacher
//! warns against for similar arena-style ownership (spec §9, "Back
//! references").

use crate::types::{current_timestamp_ms, ConnectionId, GameId, PlayerId, RoomCode, SessionToken};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Bounded chat history per room (spec §9 open question: fixed at 100).
pub const CHAT_HISTORY_CAP: usize = 100;
/// A room with no activity for this long is reaped (spec §3).
pub const ROOM_IDLE_TIMEOUT_SECS: u64 = 2 * 60 * 60;

/// Lifecycle phase of a room. Plugins extend state further within
/// [`GameState::data`] without the substrate needing to understand it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomPhase {
    Lobby,
    Waiting,
    Running,
    Ended,
}

impl RoomPhase {
    /// New players may only join while the room is in one of these phases
    /// (spec §3 invariant).
    pub fn accepts_new_players(self) -> bool {
        matches!(self, RoomPhase::Lobby | RoomPhase::Waiting)
    }
}

/// Per-plugin opaque game state. The substrate never reads `data` — only
/// the owning plugin's `serialize_room` knows its shape (spec §9, "tagged
/// variants" note: plugins model `data` as their own sum type and the
/// substrate only ever sees the serialized JSON it produces).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub phase: RoomPhase,
    pub data: serde_json::Value,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            phase: RoomPhase::Lobby,
            data: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSettings {
    pub min_players: usize,
    pub max_players: usize,
    /// Plugin-specific settings bag (e.g. `roundsToWin`, `arenaSize`).
    pub extra: serde_json::Value,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            min_players: 1,
            max_players: 8,
            extra: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub player_id: PlayerId,
    pub connection_id: ConnectionId,
    pub name: String,
    pub is_host: bool,
    pub status: ConnectionStatus,
    pub disconnected_at: Option<u64>,
    pub joined_at: u64,
    pub last_activity: u64,
    pub session_token: Option<SessionToken>,
    /// Opaque per-plugin scratch data, analogous to [`GameState::data`].
    pub game_data: serde_json::Value,
}

impl Player {
    pub fn new(connection_id: ConnectionId, name: String, is_host: bool) -> Self {
        let now = current_timestamp_ms();
        Self {
            player_id: PlayerId::new(),
            connection_id,
            name,
            is_host,
            status: ConnectionStatus::Connected,
            disconnected_at: None,
            joined_at: now,
            last_activity: now,
            session_token: None,
            game_data: serde_json::Value::Null,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = current_timestamp_ms();
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub player_id: PlayerId,
    pub name: String,
    pub text: String,
    pub sent_at: u64,
}

#[derive(Debug, Clone)]
pub struct Room {
    pub code: RoomCode,
    pub game_id: GameId,
    pub host_player_id: PlayerId,
    pub host_connection_id: ConnectionId,
    /// Keyed by connection id, per spec §3 — "ordered-enough map of
    /// connectionId -> Player". A `HashMap` already gives O(1) membership
    /// checks; iteration order is "deterministic but unspecified" per §4.C,
    /// which a hash map satisfies for a single process run.
    pub players: HashMap<ConnectionId, Player>,
    pub game_state: GameState,
    pub settings: RoomSettings,
    pub created_at: u64,
    pub last_activity: u64,
    pub messages: VecDeque<ChatMessage>,
    /// Set when the room was created via the external platform's flow
    /// (`room:create { isPlatformRoom: true }`); governs which
    /// `platform:return` semantics apply.
    pub is_platform_room: bool,
}

impl Room {
    pub fn new(
        code: RoomCode,
        game_id: GameId,
        host: Player,
        settings: RoomSettings,
        is_platform_room: bool,
    ) -> Self {
        let now = current_timestamp_ms();
        let host_player_id = host.player_id;
        let host_connection_id = host.connection_id;
        let mut players = HashMap::new();
        players.insert(host_connection_id, host);
        Self {
            code,
            game_id,
            host_player_id,
            host_connection_id,
            players,
            game_state: GameState::default(),
            settings,
            created_at: now,
            last_activity: now,
            messages: VecDeque::new(),
            is_platform_room,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = current_timestamp_ms();
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.settings.max_players
    }

    pub fn is_idle(&self) -> bool {
        let now = current_timestamp_ms();
        now.saturating_sub(self.last_activity) > ROOM_IDLE_TIMEOUT_SECS * 1000
    }

    pub fn player_by_id(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.values().find(|p| p.player_id == player_id)
    }

    pub fn player_by_id_mut(&mut self, player_id: PlayerId) -> Option<&mut Player> {
        self.players.values_mut().find(|p| p.player_id == player_id)
    }

    /// Appends a chat message, evicting the oldest once the ring is full
    /// (spec §9 open question, fixed at [`CHAT_HISTORY_CAP`]).
    pub fn push_chat(&mut self, message: ChatMessage) {
        if self.messages.len() >= CHAT_HISTORY_CAP {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    /// Picks the next host after the current host leaves: the first
    /// remaining player in iteration order (deterministic but unspecified
    /// priority, spec §4.C).
    pub fn pick_next_host(&self) -> Option<ConnectionId> {
        self.players.keys().next().copied()
    }
}
