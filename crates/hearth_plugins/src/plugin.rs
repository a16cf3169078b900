//! The plugin interface. See spec §3 ("Plugin") and §9's redesign note:
//! the source's dynamic handler maps are reimplemented here as a typed
//! trait so every event a plugin accepts is checked at compile time rather
//! than discovered by string lookup at runtime.

use async_trait::async_trait;
use hearth_core::{ConnectionId, Player, PlayerId, Room, RoomHandle};
use std::sync::Arc;

use crate::error::PluginError;

/// What a plugin handler is given to act on a single event: the raw JSON
/// payload, identity of the sender, and a handle to the room it's in (if
/// any — WebRTC relay events may arrive for a connection not currently
/// bound to a room, per spec §4.F).
pub struct PluginEventContext {
    pub connection_id: ConnectionId,
    pub player_id: Option<PlayerId>,
    pub room: Option<RoomHandle>,
    pub hub: Arc<dyn HubHandle>,
}

/// The subset of `ConnectionHub`/`LifecycleCoordinator` behavior a plugin
/// is allowed to call. Implemented by `hearth_server::connection::ConnectionHub`;
/// kept as a trait here so `hearth_plugins` (and anything that implements
/// a plugin against it) never needs to depend on the server crate.
#[async_trait]
pub trait HubHandle: Send + Sync {
    /// Unicast to one connection. Never throttled (spec §4.E).
    async fn send_to_connection(&self, connection_id: ConnectionId, event: &str, payload: serde_json::Value);

    /// Coalesced broadcast to every member of a room — at most one flush
    /// per `broadcast window` (spec §4.E). The latest call before a flush
    /// wins; earlier ones in the same window are dropped.
    async fn send_to_room(&self, room_code: &str, event: &str, payload: serde_json::Value);

    /// Bypasses the broadcast coalescing window. Reserved for traffic that
    /// must preserve per-event ordering and low latency, such as the tick
    /// engine's own `applyTurn` destinations (spec §5).
    async fn send_to_room_immediate(&self, room_code: &str, event: &str, payload: serde_json::Value);

    /// Evicts any room-scoped bookkeeping (e.g. broadcast throttle state)
    /// once a room is permanently torn down. Default no-op; `ConnectionHub`
    /// overrides it (spec §9, "entries evicted on room destroy").
    fn forget_room(&self, _room_code: &str) {}
}

/// A registered game. Implementors provide a namespace-scoped handler for
/// every client event they accept plus the lifecycle hooks the substrate
/// invokes around join/leave/disconnect/host-transfer (spec §3, §4.F).
#[async_trait]
pub trait GamePlugin: Send + Sync {
    /// Stable, unique key used for routing and admin/stats lookups.
    fn id(&self) -> &str;

    /// Routing prefix for this plugin's namespace (spec §3).
    fn namespace(&self) -> &str;

    /// Default settings merged under a room's `settings.extra` when a room
    /// is created without an explicit settings override.
    fn default_settings(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// The set of client events this plugin accepts, for dispatch-table
    /// construction and admin introspection.
    fn events(&self) -> &[&'static str];

    /// Dispatches one inbound client event to this plugin. `event` is
    /// guaranteed to be one of [`Self::events`].
    async fn handle_event(
        &self,
        event: &str,
        payload: serde_json::Value,
        ctx: PluginEventContext,
    ) -> Result<(), PluginError>;

    /// Called once, synchronously with creation, right after
    /// `RoomRegistry::create_room` succeeds.
    async fn on_room_create(&self, _room: RoomHandle) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called after a player is admitted to a room, whether as a brand new
    /// join or as a reconnect (`reconnecting = true` in the latter case).
    async fn on_player_join(
        &self,
        _room: RoomHandle,
        _player: Player,
        _reconnecting: bool,
    ) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called when a non-host player's connection drops, before the grace
    /// timer is armed.
    async fn on_player_disconnected(&self, _room: RoomHandle, _player_id: PlayerId) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called once a disconnected player is permanently removed (grace
    /// expiry or explicit leave).
    async fn on_player_leave(&self, _room: RoomHandle, _player_id: PlayerId) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called when the host disconnects, immediately before the room is
    /// torn down (no grace period for hosts, spec §4.F).
    async fn on_host_leave(&self, _room: RoomHandle, _former_host_id: PlayerId) -> Result<(), PluginError> {
        Ok(())
    }

    /// Produces a per-recipient view of the room. Must be called once per
    /// recipient for any broadcast that carries full room state (spec
    /// §4.F, "per-perspective serialization") so each client only sees its
    /// own connection identifier and none of another player's secrets.
    fn serialize_room(&self, room: &Room, perspective_connection_id: ConnectionId) -> serde_json::Value;

    /// Called once, after registration, with a handle back into the hub.
    async fn on_initialize(&self, _hub: Arc<dyn HubHandle>) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called when the registry is torn down (server shutdown).
    async fn on_cleanup(&self) -> Result<(), PluginError> {
        Ok(())
    }
}
