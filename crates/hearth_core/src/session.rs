//! Issues and validates opaque session tokens tied to `(playerId, roomCode)`
//! with sliding expiry. See spec §4.B.

use crate::types::{current_timestamp_ms, PlayerId, RoomCode, SessionToken};
use dashmap::DashMap;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// 30 minutes of inactivity expires a session (spec §3, §8 invariant 4).
pub const SESSION_TTL: Duration = Duration::from_secs(30 * 60);
/// The reaper sweeps expired sessions every 5 minutes (spec §4.B).
pub const REAP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub player_id: PlayerId,
    pub room_code: RoomCode,
    pub created_at: u64,
    pub last_activity: u64,
}

impl Session {
    fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_activity) > SESSION_TTL.as_millis() as u64
    }
}

/// Shared, concurrency-safe session table.
///
/// Two indices are kept in lockstep: `by_token` for `validate`/`deleteByToken`,
/// and `by_player` so `create` can find (and replace) a player's prior
/// session in O(1) — mirroring the one-active-token-per-player invariant in
/// spec §3.
#[derive(Debug, Default)]
pub struct SessionStore {
    by_token: DashMap<SessionToken, Session>,
    by_player: DashMap<PlayerId, SessionToken>,
}

impl SessionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mints (or reuses) a session for `player_id` in `room_code`.
    ///
    /// If the player already has a session for the *same* room, that
    /// session's token is reused and its activity refreshed (idempotent
    /// creation, spec §8). Rebinding to a different room issues a fresh
    /// token and evicts the old mapping.
    pub fn create(&self, player_id: PlayerId, room_code: RoomCode) -> SessionToken {
        if let Some(existing_token) = self.by_player.get(&player_id).map(|e| e.clone()) {
            if let Some(mut session) = self.by_token.get_mut(&existing_token) {
                if session.room_code == room_code {
                    session.last_activity = current_timestamp_ms();
                    trace!(%player_id, %room_code, "reused existing session");
                    return session.token.clone();
                }
            }
            // Rebinding to a new room: drop the stale mapping before minting.
            self.by_token.remove(&existing_token);
        }

        let token = SessionToken(generate_token());
        let now = current_timestamp_ms();
        self.by_player.insert(player_id, token.clone());
        self.by_token.insert(
            token.clone(),
            Session {
                token: token.clone(),
                player_id,
                room_code,
                created_at: now,
                last_activity: now,
            },
        );
        debug!(%player_id, %token, "session created");
        token
    }

    /// Returns the session for `token`, refreshing its activity timestamp,
    /// or `None` if the token is missing or expired. Total: never panics or
    /// raises on an invalid token (spec §4.B failure modes).
    pub fn validate(&self, token: &SessionToken) -> Option<Session> {
        let now = current_timestamp_ms();
        let mut entry = self.by_token.get_mut(token)?;
        if entry.is_expired(now) {
            drop(entry);
            self.by_token.remove(token);
            return None;
        }
        entry.last_activity = now;
        Some(entry.clone())
    }

    pub fn delete_by_token(&self, token: &SessionToken) {
        if let Some((_, session)) = self.by_token.remove(token) {
            self.by_player.remove(&session.player_id);
        }
    }

    /// Invalidates every session bound to `room_code`. Called when a room is
    /// destroyed so no stale token can later be used to "reconnect" into it.
    pub fn delete_by_room(&self, room_code: &RoomCode) {
        let stale: Vec<SessionToken> = self
            .by_token
            .iter()
            .filter(|e| &e.room_code == room_code)
            .map(|e| e.token.clone())
            .collect();
        for token in stale {
            self.delete_by_token(&token);
        }
    }

    /// Drops every session whose activity is older than [`SESSION_TTL`].
    /// Intended to be called periodically by a background reaper task.
    pub fn reap_expired(&self) -> usize {
        let now = current_timestamp_ms();
        let stale: Vec<SessionToken> = self
            .by_token
            .iter()
            .filter(|e| e.is_expired(now))
            .map(|e| e.token.clone())
            .collect();
        let count = stale.len();
        for token in stale {
            self.delete_by_token(&token);
        }
        if count > 0 {
            debug!(count, "reaped expired sessions");
        }
        count
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }
}

fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Spawns the background reaper loop described in spec §4.B. Stops as soon
/// as `shutdown` fires, matching the cancellable-timer policy in §5.
pub fn spawn_reaper(
    store: Arc<SessionStore>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REAP_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    store.reap_expired();
                }
                _ = shutdown.recv() => {
                    debug!("session reaper stopping");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(code: &str) -> RoomCode {
        RoomCode(code.to_string())
    }

    #[test]
    fn create_is_idempotent_for_same_room() {
        let store = SessionStore::new();
        let player = PlayerId::new();
        let t1 = store.create(player, room("AAAAAA"));
        let t2 = store.create(player, room("AAAAAA"));
        assert_eq!(t1, t2);
    }

    #[test]
    fn rebinding_to_new_room_issues_new_token() {
        let store = SessionStore::new();
        let player = PlayerId::new();
        let t1 = store.create(player, room("AAAAAA"));
        let t2 = store.create(player, room("BBBBBB"));
        assert_ne!(t1, t2);
        assert!(store.validate(&t1).is_none());
        assert_eq!(store.validate(&t2).unwrap().room_code, room("BBBBBB"));
    }

    #[test]
    fn validate_returns_none_for_unknown_token() {
        let store = SessionStore::new();
        assert!(store.validate(&SessionToken("nope".into())).is_none());
    }

    #[test]
    fn session_expires_after_ttl_of_inactivity() {
        let mut session = Session {
            token: SessionToken("t".into()),
            player_id: PlayerId::new(),
            room_code: room("AAAAAA"),
            created_at: 0,
            last_activity: 0,
        };
        let just_inside = SESSION_TTL.as_millis() as u64;
        let just_outside = just_inside + 2;
        assert!(!session.is_expired(just_inside));
        assert!(session.is_expired(just_outside));
        session.last_activity = just_outside; // refreshed activity resets the clock
        assert!(!session.is_expired(just_outside));
    }

    #[test]
    fn delete_by_room_purges_all_matching_sessions() {
        let store = SessionStore::new();
        let p1 = PlayerId::new();
        let p2 = PlayerId::new();
        let t1 = store.create(p1, room("ZZZZZZ"));
        let t2 = store.create(p2, room("ZZZZZZ"));
        store.delete_by_room(&room("ZZZZZZ"));
        assert!(store.validate(&t1).is_none());
        assert!(store.validate(&t2).is_none());
    }
}
