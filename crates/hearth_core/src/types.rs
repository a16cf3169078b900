//! Core identifier types shared across the substrate.
//!
//! These are thin wrapper types so that a `PlayerId` can never be passed
//! where a `ConnectionId` is expected and vice versa, mirroring the
//! type-safety discipline the rest of the workspace follows.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identity of a participant, assigned once at first join and kept
/// for the lifetime of their membership in a room (across reconnects).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a single transport connection. Rotates on every reconnect;
/// unique across the whole process at any instant (invariant 1 in §8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Generator for process-unique `ConnectionId`s.
#[derive(Debug, Default)]
pub struct ConnectionIdAllocator(std::sync::atomic::AtomicU64);

impl ConnectionIdAllocator {
    pub fn new() -> Self {
        Self(std::sync::atomic::AtomicU64::new(1))
    }

    pub fn next(&self) -> ConnectionId {
        ConnectionId(self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed))
    }
}

/// A 6-character human-readable room code drawn from the unambiguous
/// alphabet (see [`crate::validator`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomCode(pub String);

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RoomCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for RoomCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Opaque, cryptographically random reconnection credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(pub String);

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a registered plugin (game) by its stable key, e.g. `"lightcycles"`.
pub type GameId = String;

/// Returns the current time as milliseconds since the Unix epoch.
///
/// Used throughout the substrate wherever a wall-clock timestamp needs to
/// cross the wire (session activity, room timestamps, chat stamps).
pub fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
