//! A minimal illustrative plugin: players toggle "ready", the host starts
//! once everyone is ready. No tick loop — every state change is driven
//! directly by an inbound client event, unlike `hearth_cycles`'s 60Hz
//! simulation. Kept as a second worked example of the `GamePlugin` trait
//! at a much smaller scale.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use hearth_core::{ConnectionId, Player, PlayerId, Room, RoomHandle, RoomPhase};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::PluginError;
use crate::plugin::{GamePlugin, HubHandle, PluginEventContext};

const EVENTS: &[&str] = &["readycheck:toggle", "readycheck:start"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ReadyCheckState {
    ready: HashSet<PlayerId>,
}

pub struct ReadyCheckPlugin;

impl ReadyCheckPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ReadyCheckPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GamePlugin for ReadyCheckPlugin {
    fn id(&self) -> &str {
        "ready_check"
    }

    fn namespace(&self) -> &str {
        "readycheck"
    }

    fn events(&self) -> &[&'static str] {
        EVENTS
    }

    async fn handle_event(
        &self,
        event: &str,
        _payload: serde_json::Value,
        ctx: PluginEventContext,
    ) -> Result<(), PluginError> {
        let Some(room) = ctx.room else {
            return Err(PluginError::ExecutionError("not in a room".into()));
        };
        let Some(player_id) = ctx.player_id else {
            return Err(PluginError::ExecutionError("no player for connection".into()));
        };

        match event {
            "readycheck:toggle" => {
                let mut room_guard = room.lock().await;
                let mut state: ReadyCheckState =
                    serde_json::from_value(room_guard.game_state.data.clone()).unwrap_or_default();
                if !state.ready.remove(&player_id) {
                    state.ready.insert(player_id);
                }
                room_guard.game_state.data = serde_json::to_value(&state).unwrap_or(serde_json::Value::Null);
                let room_code = room_guard.code.to_string();
                drop(room_guard);
                ctx.hub
                    .send_to_room(&room_code, "readycheck:state", json!({ "ready": state.ready.len() }))
                    .await;
            }
            "readycheck:start" => {
                let mut room_guard = room.lock().await;
                if room_guard.host_player_id != player_id {
                    return Err(PluginError::ExecutionError("only the host may start".into()));
                }
                let state: ReadyCheckState =
                    serde_json::from_value(room_guard.game_state.data.clone()).unwrap_or_default();
                if state.ready.len() < room_guard.players.len() {
                    return Err(PluginError::ExecutionError("not everyone is ready".into()));
                }
                room_guard.game_state.phase = RoomPhase::Running;
                let room_code = room_guard.code.to_string();
                drop(room_guard);
                ctx.hub.send_to_room_immediate(&room_code, "readycheck:started", json!({})).await;
            }
            other => return Err(PluginError::NotFound(other.to_string())),
        }
        Ok(())
    }

    async fn on_player_leave(&self, room: RoomHandle, player_id: PlayerId) -> Result<(), PluginError> {
        let mut room_guard = room.lock().await;
        let mut state: ReadyCheckState =
            serde_json::from_value(room_guard.game_state.data.clone()).unwrap_or_default();
        state.ready.remove(&player_id);
        room_guard.game_state.data = serde_json::to_value(&state).unwrap_or(serde_json::Value::Null);
        Ok(())
    }

    fn serialize_room(&self, room: &Room, _perspective_connection_id: ConnectionId) -> serde_json::Value {
        let state: ReadyCheckState =
            serde_json::from_value(room.game_state.data.clone()).unwrap_or_default();
        json!({ "readyCount": state.ready.len(), "totalPlayers": room.players.len() })
    }

    async fn on_initialize(&self, _hub: Arc<dyn HubHandle>) -> Result<(), PluginError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::{ConnectionIdAllocator, RoomSettings};
    use tokio::sync::Mutex;

    fn make_room() -> RoomHandle {
        let alloc = ConnectionIdAllocator::new();
        let host = Player::new(alloc.next(), "host".into(), true);
        Arc::new(Mutex::new(Room::new(
            "ABCDEF".to_string().into(),
            "ready_check".into(),
            host,
            RoomSettings::default(),
            false,
        )))
    }

    #[tokio::test]
    async fn toggling_ready_is_reversible() {
        let room = make_room();
        let plugin = ReadyCheckPlugin::new();
        let player_id = {
            let guard = room.lock().await;
            guard.host_player_id
        };

        plugin.on_player_leave(room.clone(), player_id).await.unwrap();
        let guard = room.lock().await;
        let state: ReadyCheckState = serde_json::from_value(guard.game_state.data.clone()).unwrap_or_default();
        assert!(!state.ready.contains(&player_id));
    }
}
