//! Creates/destroys rooms, adds/removes players, indexes by code and
//! connection id, and reaps idle rooms. See spec §4.C.
//!
//! Rooms are each owned by an `Arc<Mutex<Room>>`: cross-room operations can
//! proceed in parallel (the index maps are `dashmap`s), but every mutation
//! of a single room's state is serialized through that room's mutex — this
//! is implementation shape (b) from spec §5 ("per-room task + shared
//! read-mostly registries").

use crate::room::{Player, Room, RoomSettings};
use crate::types::{current_timestamp_ms, ConnectionId, GameId, PlayerId, RoomCode};
use crate::validator;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const CODE_GENERATION_ATTEMPTS: usize = 100;
/// The registry sweeps idle rooms every 5 minutes (spec §4.C).
pub const REAP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5 * 60);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("room not found")]
    RoomNotFound,
    #[error("room is full")]
    RoomFull,
    #[error("room is not accepting new players in its current phase")]
    WrongPhase,
}

/// A room handle shared by every task that touches this room. Cloning is
/// cheap (it's an `Arc`); locking it is how callers get exclusive access.
pub type RoomHandle = Arc<Mutex<Room>>;

#[derive(Default)]
pub struct RoomRegistry {
    by_code: DashMap<RoomCode, RoomHandle>,
    /// Reverse index: which room (if any) currently holds this connection.
    by_connection: DashMap<ConnectionId, RoomCode>,
}

impl RoomRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a new room hosted by `host`, generating a unique code unless
    /// `code_override` is supplied (used for platform-originated rooms that
    /// must reuse an externally assigned code).
    pub async fn create_room(
        &self,
        game_id: GameId,
        mut host: Player,
        settings: RoomSettings,
        code_override: Option<String>,
        is_platform_room: bool,
    ) -> RoomHandle {
        let code = match code_override {
            Some(code) => RoomCode(code),
            None => self.allocate_code(),
        };

        host.is_host = true;
        let room = Room::new(code.clone(), game_id, host, settings, is_platform_room);
        let connection_id = room.host_connection_id;
        let handle: RoomHandle = Arc::new(Mutex::new(room));

        self.by_code.insert(code.clone(), handle.clone());
        self.by_connection.insert(connection_id, code.clone());
        info!(%code, "room created");
        handle
    }

    /// Generates a unique code, retrying up to [`CODE_GENERATION_ATTEMPTS`]
    /// times before falling back to a truncated UUID (spec §4.C).
    fn allocate_code(&self) -> RoomCode {
        for _ in 0..CODE_GENERATION_ATTEMPTS {
            let candidate = RoomCode(validator::generate_room_code());
            if !self.by_code.contains_key(&candidate) {
                return candidate;
            }
        }
        warn!("room code generation exhausted retries, falling back to UUID suffix");
        let suffix: String = uuid::Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(6)
            .collect::<String>()
            .to_uppercase();
        RoomCode(suffix)
    }

    pub fn get_by_code(&self, code: &str) -> Option<RoomHandle> {
        self.by_code.get(code).map(|e| e.clone())
    }

    pub fn get_by_connection(&self, connection_id: ConnectionId) -> Option<RoomHandle> {
        let code = self.by_connection.get(&connection_id)?.clone();
        self.get_by_code(&code.0)
    }

    /// Adds `player` to the room at `code`. Rejects per the rules in
    /// spec §4.C: unknown room, full room, or wrong phase.
    pub async fn add_player(&self, code: &str, player: Player) -> Result<RoomHandle, JoinError> {
        let handle = self.get_by_code(code).ok_or(JoinError::RoomNotFound)?;
        {
            let mut room = handle.lock().await;
            if room.is_full() {
                return Err(JoinError::RoomFull);
            }
            if !room.game_state.phase.accepts_new_players() {
                return Err(JoinError::WrongPhase);
            }
            let connection_id = player.connection_id;
            room.players.insert(connection_id, player);
            room.touch();
            self.by_connection.insert(connection_id, room.code.clone());
        }
        Ok(handle)
    }

    /// Removes the connection's player, transferring host if necessary and
    /// destroying the room if it becomes empty. Returns the room (if it
    /// still exists) and the removed player, for the caller to use in
    /// lifecycle notifications.
    pub async fn remove_player(&self, connection_id: ConnectionId) -> (Option<RoomHandle>, Option<Player>) {
        let Some(handle) = self.get_by_connection(connection_id) else {
            return (None, None);
        };

        let (removed, destroy, code) = {
            let mut room = handle.lock().await;
            let removed = room.players.remove(&connection_id);
            let was_host = removed
                .as_ref()
                .map(|p| p.player_id == room.host_player_id)
                .unwrap_or(false);

            if was_host {
                if let Some(next_connection) = room.pick_next_host() {
                    room.host_connection_id = next_connection;
                    if let Some(next_player) = room.players.get_mut(&next_connection) {
                        next_player.is_host = true;
                        room.host_player_id = next_player.player_id;
                    }
                }
            }
            room.touch();
            let destroy = room.players.is_empty();
            (removed, destroy, room.code.clone())
        };

        self.by_connection.remove(&connection_id);
        if destroy {
            self.by_code.remove(&code);
            debug!(%code, "room emptied and destroyed");
            (None, removed)
        } else {
            (Some(handle), removed)
        }
    }

    /// Immediately tears down a room regardless of occupancy (used for
    /// host-disconnect, which destroys the room without a grace period).
    pub async fn destroy_room(&self, code: &str) -> Option<RoomHandle> {
        let (_, handle) = self.by_code.remove(code)?;
        let room = handle.lock().await;
        for connection_id in room.players.keys() {
            self.by_connection.remove(connection_id);
        }
        drop(room);
        info!(code, "room destroyed");
        Some(handle)
    }

    /// Marks a connection as disconnected without removing it, enabling a
    /// client-side countdown during the grace window (spec §4.C).
    pub async fn mark_disconnected(&self, connection_id: ConnectionId) {
        if let Some(handle) = self.get_by_connection(connection_id) {
            let mut room = handle.lock().await;
            if let Some(player) = room.players.get_mut(&connection_id) {
                player.status = crate::room::ConnectionStatus::Disconnected;
                player.disconnected_at = Some(current_timestamp_ms());
            }
        }
    }

    /// Rebinds a player from `old_connection_id` to `new_connection_id`,
    /// clearing its disconnect flags. Resilient to the "already migrated"
    /// race described in spec §4.C: if `old_connection_id` is no longer a
    /// member (another path already rebound it), the caller should fall
    /// back to [`Self::reconnect_by_player`].
    pub async fn reconnect(
        &self,
        old_connection_id: ConnectionId,
        new_connection_id: ConnectionId,
    ) -> (Option<RoomHandle>, Option<Player>) {
        let Some(handle) = self.get_by_connection(old_connection_id) else {
            return (None, None);
        };

        let player = {
            let mut room = handle.lock().await;
            let Some(mut player) = room.players.remove(&old_connection_id) else {
                return (Some(handle), None);
            };
            player.connection_id = new_connection_id;
            player.status = crate::room::ConnectionStatus::Connected;
            player.disconnected_at = None;
            player.touch();
            if room.host_connection_id == old_connection_id {
                room.host_connection_id = new_connection_id;
            }
            room.players.insert(new_connection_id, player.clone());
            room.touch();
            player
        };

        self.by_connection.remove(&old_connection_id);
        self.by_connection.insert(new_connection_id, player_room_code(&handle).await);
        (Some(handle), Some(player))
    }

    /// Fallback rebind path keyed by the stable `player_id` rather than the
    /// (possibly already-stolen) old connection id — see spec §4.C.
    pub async fn reconnect_by_player(
        &self,
        code: &str,
        player_id: PlayerId,
        new_connection_id: ConnectionId,
    ) -> (Option<RoomHandle>, Option<Player>) {
        let Some(handle) = self.get_by_code(code) else {
            return (None, None);
        };

        let player = {
            let mut room = handle.lock().await;
            let Some(old_connection_id) = room
                .players
                .iter()
                .find(|(_, p)| p.player_id == player_id)
                .map(|(c, _)| *c)
            else {
                return (Some(handle), None);
            };
            let mut player = room.players.remove(&old_connection_id).expect("found above");
            player.connection_id = new_connection_id;
            player.status = crate::room::ConnectionStatus::Connected;
            player.disconnected_at = None;
            player.touch();
            if room.host_connection_id == old_connection_id {
                room.host_connection_id = new_connection_id;
            }
            room.players.insert(new_connection_id, player.clone());
            room.touch();
            self.by_connection.remove(&old_connection_id);
            player
        };

        self.by_connection.insert(new_connection_id, RoomCode(code.to_string()));
        (Some(handle), Some(player))
    }

    pub async fn get_player(&self, connection_id: ConnectionId) -> Option<Player> {
        let handle = self.get_by_connection(connection_id)?;
        let room = handle.lock().await;
        room.players.get(&connection_id).cloned()
    }

    pub fn room_count(&self) -> usize {
        self.by_code.len()
    }

    pub fn room_count_for_game(&self, game_id: &str) -> usize {
        self.by_code
            .iter()
            .filter(|e| {
                let handle = e.value().clone();
                handle.try_lock().map(|r| r.game_id == game_id).unwrap_or(false)
            })
            .count()
    }

    pub fn all_codes(&self) -> Vec<RoomCode> {
        self.by_code.iter().map(|e| e.key().clone()).collect()
    }

    /// Destroys every room idle for more than [`crate::room::ROOM_IDLE_TIMEOUT_SECS`].
    pub async fn reap_idle(&self) -> usize {
        let codes: Vec<RoomCode> = self.by_code.iter().map(|e| e.key().clone()).collect();
        let mut reaped = 0;
        for code in codes {
            let Some(handle) = self.get_by_code(&code.0) else { continue };
            let idle = handle.lock().await.is_idle();
            if idle {
                self.destroy_room(&code.0).await;
                reaped += 1;
            }
        }
        if reaped > 0 {
            debug!(reaped, "reaped idle rooms");
        }
        reaped
    }
}

async fn player_room_code(handle: &RoomHandle) -> RoomCode {
    handle.lock().await.code.clone()
}

/// Spawns the background idle-room reaper (spec §4.C); cancellable via
/// `shutdown`, matching the pattern used for the session reaper.
pub fn spawn_reaper(
    registry: Arc<RoomRegistry>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REAP_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    registry.reap_idle().await;
                }
                _ = shutdown.recv() => {
                    debug!("room reaper stopping");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConnectionIdAllocator;

    fn host(conn: ConnectionId) -> Player {
        Player::new(conn, "Host".to_string(), true)
    }

    #[tokio::test]
    async fn create_and_lookup_by_code() {
        let registry = RoomRegistry::new();
        let alloc = ConnectionIdAllocator::new();
        let handle = registry
            .create_room("lightcycles".into(), host(alloc.next()), RoomSettings::default(), None, false)
            .await;
        let code = handle.lock().await.code.clone();
        assert!(registry.get_by_code(&code.0).is_some());
    }

    #[tokio::test]
    async fn rejects_join_when_full() {
        let registry = RoomRegistry::new();
        let alloc = ConnectionIdAllocator::new();
        let mut settings = RoomSettings::default();
        settings.max_players = 1;
        let handle = registry
            .create_room("lightcycles".into(), host(alloc.next()), settings, None, false)
            .await;
        let code = handle.lock().await.code.clone();
        let second = Player::new(alloc.next(), "Second".to_string(), false);
        let result = registry.add_player(&code.0, second).await;
        assert_eq!(result.unwrap_err(), JoinError::RoomFull);
    }

    #[tokio::test]
    async fn host_transfers_to_next_player_on_leave() {
        let registry = RoomRegistry::new();
        let alloc = ConnectionIdAllocator::new();
        let host_conn = alloc.next();
        let handle = registry
            .create_room("lightcycles".into(), host(host_conn), RoomSettings::default(), None, false)
            .await;
        let code = handle.lock().await.code.clone();
        let second_conn = alloc.next();
        registry
            .add_player(&code.0, Player::new(second_conn, "Second".into(), false))
            .await
            .unwrap();

        let (room, removed) = registry.remove_player(host_conn).await;
        assert!(removed.unwrap().is_host);
        let room = room.unwrap();
        let room = room.lock().await;
        assert_eq!(room.host_connection_id, second_conn);
        assert!(room.players.get(&second_conn).unwrap().is_host);
    }

    #[tokio::test]
    async fn room_destroyed_when_last_player_leaves() {
        let registry = RoomRegistry::new();
        let alloc = ConnectionIdAllocator::new();
        let host_conn = alloc.next();
        let handle = registry
            .create_room("lightcycles".into(), host(host_conn), RoomSettings::default(), None, false)
            .await;
        let code = handle.lock().await.code.clone();
        let (room, _) = registry.remove_player(host_conn).await;
        assert!(room.is_none());
        assert!(registry.get_by_code(&code.0).is_none());
    }

    #[tokio::test]
    async fn reconnect_rebinds_connection_and_clears_disconnect_flags() {
        let registry = RoomRegistry::new();
        let alloc = ConnectionIdAllocator::new();
        let host_conn = alloc.next();
        registry
            .create_room("lightcycles".into(), host(host_conn), RoomSettings::default(), None, false)
            .await;
        registry.mark_disconnected(host_conn).await;

        let new_conn = alloc.next();
        let (room, player) = registry.reconnect(host_conn, new_conn).await;
        let player = player.unwrap();
        assert_eq!(player.connection_id, new_conn);
        assert_eq!(player.status, crate::room::ConnectionStatus::Connected);
        assert!(player.disconnected_at.is_none());
        assert_eq!(room.unwrap().lock().await.host_connection_id, new_conn);
    }

    #[tokio::test]
    async fn reconnect_by_player_is_the_fallback_when_old_connection_already_migrated() {
        let registry = RoomRegistry::new();
        let alloc = ConnectionIdAllocator::new();
        let host_conn = alloc.next();
        let handle = registry
            .create_room("lightcycles".into(), host(host_conn), RoomSettings::default(), None, false)
            .await;
        let code = handle.lock().await.code.clone();
        let player_id = handle.lock().await.host_player_id;

        // Simulate the old connection id no longer being a member at all.
        let newer_conn = alloc.next();
        let (room, player) = registry.reconnect_by_player(&code.0, player_id, newer_conn).await;
        assert!(room.is_some());
        assert_eq!(player.unwrap().connection_id, newer_conn);
    }
}
