//! # hearth_core
//!
//! Domain model for the hearth party-game substrate: identifiers, the
//! Validator, SessionStore, and RoomRegistry, plus the core event payload
//! shapes shared across the workspace. This crate has no networking or
//! plugin-dispatch logic of its own — see `hearth_server` and
//! `hearth_plugins` for those.

pub mod events;
pub mod registry;
pub mod room;
pub mod session;
pub mod shutdown;
pub mod types;
pub mod validator;

pub use registry::{JoinError, RoomHandle, RoomRegistry};
pub use room::{ChatMessage, ConnectionStatus, GameState, Player, Room, RoomPhase, RoomSettings};
pub use session::{Session, SessionStore};
pub use shutdown::ShutdownState;
pub use types::{
    current_timestamp_ms, ConnectionId, ConnectionIdAllocator, GameId, PlayerId, RoomCode,
    SessionToken,
};
