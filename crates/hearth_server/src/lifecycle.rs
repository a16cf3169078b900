//! Orchestrates join/reconnect/disconnect/host-transfer semantics and
//! invokes plugin lifecycle hooks (spec §4.F). Grounded on
//! `game_server/src/server/handlers.rs`'s connection-lifecycle shape and on
//! the token/grace-window pattern in the example pack's reconnection
//! reference file.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use hearth_core::room::ConnectionStatus;
use hearth_core::{
    current_timestamp_ms, ChatMessage, ConnectionId, PlayerId, Room, RoomCode, RoomHandle,
    RoomRegistry, RoomSettings, SessionStore, SessionToken,
};
use hearth_core::room::Player;
use hearth_plugins::{GamePlugin, HubHandle, PluginEventContext, PluginRegistry};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::LifecycleError;
use crate::platform::{PlatformClient, ReturnToLobbyRequest};

/// Non-host players get this long to reconnect before permanent removal
/// (spec §3, "grace period").
const GRACE_PERIOD: Duration = Duration::from_secs(60);

pub struct LifecycleCoordinator {
    rooms: Arc<RoomRegistry>,
    sessions: Arc<SessionStore>,
    plugins: Arc<PluginRegistry>,
    hub: Arc<dyn HubHandle>,
    platform: Arc<PlatformClient>,
    /// One grace-period timer per disconnected connection, cancellable by a
    /// reconnect within the window (spec §5, "Cancellation & timeouts").
    grace_timers: DashMap<ConnectionId, tokio::task::JoinHandle<()>>,
}

impl LifecycleCoordinator {
    pub fn new(
        rooms: Arc<RoomRegistry>,
        sessions: Arc<SessionStore>,
        plugins: Arc<PluginRegistry>,
        hub: Arc<dyn HubHandle>,
        platform: Arc<PlatformClient>,
    ) -> Arc<Self> {
        Arc::new(Self {
            rooms,
            sessions,
            plugins,
            hub,
            platform,
            grace_timers: DashMap::new(),
        })
    }

    fn plugin_for_namespace(&self, namespace: &str) -> Result<Arc<dyn GamePlugin>, LifecycleError> {
        self.plugins.get_by_namespace(namespace).ok_or_else(|| LifecycleError::NotFound {
            message: format!("no plugin registered for namespace {namespace}"),
            code: hearth_core::events::error_codes::ROOM_NOT_FOUND,
        })
    }

    /// Builds the per-recipient room view: substrate fields plus the
    /// plugin's own `serialize_room` output, called once per recipient
    /// (spec §4.F, "per-perspective serialization").
    fn room_view_locked(&self, plugin: &Arc<dyn GamePlugin>, room: &Room, perspective: ConnectionId) -> Value {
        let players: Vec<Value> = room
            .players
            .values()
            .map(|p| {
                json!({
                    "playerId": p.player_id,
                    "name": p.name,
                    "isHost": p.is_host,
                    "status": match p.status {
                        ConnectionStatus::Connected => "connected",
                        ConnectionStatus::Disconnected => "disconnected",
                    },
                })
            })
            .collect();
        json!({
            "code": room.code.0,
            "gameId": room.game_id,
            "hostPlayerId": room.host_player_id,
            "phase": room.game_state.phase,
            "players": players,
            "gameState": plugin.serialize_room(room, perspective),
        })
    }

    async fn room_view(&self, plugin: &Arc<dyn GamePlugin>, handle: &RoomHandle, perspective: ConnectionId) -> Value {
        let room = handle.lock().await;
        self.room_view_locked(plugin, &room, perspective)
    }

    // ---- room:create ----------------------------------------------------

    pub async fn handle_room_create(
        &self,
        namespace: &str,
        connection_id: ConnectionId,
        payload: Value,
    ) -> Result<(), LifecycleError> {
        let plugin = self.plugin_for_namespace(namespace)?;
        let name = hearth_core::validator::validate_player_name(
            payload.get("playerName").and_then(|v| v.as_str()).unwrap_or(""),
        )?;
        let settings = parse_room_settings(&payload, &plugin);
        let code_override = payload
            .get("roomCode")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_uppercase());
        let is_platform_room = payload.get("isPlatformRoom").and_then(|v| v.as_bool()).unwrap_or(false);

        let host = Player::new(connection_id, name, true);
        let handle = self
            .rooms
            .create_room(plugin.id().to_string(), host, settings, code_override, is_platform_room)
            .await;

        let (code, player_id) = {
            let room = handle.lock().await;
            (room.code.clone(), room.host_player_id)
        };
        let token = self.sessions.create(player_id, code.clone());
        {
            let mut room = handle.lock().await;
            if let Some(p) = room.player_by_id_mut(player_id) {
                p.session_token = Some(token.clone());
            }
        }

        plugin.on_room_create(handle.clone()).await?;

        let view = self.room_view(&plugin, &handle, connection_id).await;
        self.hub
            .send_to_connection(
                connection_id,
                "room:created",
                json!({ "room": view, "sessionToken": token.0, "yourPlayerId": player_id }),
            )
            .await;
        Ok(())
    }

    // ---- room:join (new join or reconnect) -------------------------------

    pub async fn handle_room_join(
        &self,
        namespace: &str,
        connection_id: ConnectionId,
        payload: Value,
    ) -> Result<(), LifecycleError> {
        let plugin = self.plugin_for_namespace(namespace)?;
        let code = hearth_core::validator::validate_room_code(
            payload.get("roomCode").and_then(|v| v.as_str()).unwrap_or(""),
        )?;
        let name = hearth_core::validator::validate_player_name(
            payload.get("playerName").and_then(|v| v.as_str()).unwrap_or(""),
        )?;
        let session_token = payload
            .get("sessionToken")
            .and_then(|v| v.as_str())
            .map(|s| SessionToken(s.to_string()));

        if let Some(token) = &session_token {
            if let Some(session) = self.sessions.validate(token) {
                if session.room_code.0 == code {
                    if let Some(handle) = self.rooms.get_by_code(&code) {
                        let still_member = {
                            let room = handle.lock().await;
                            room.player_by_id(session.player_id).is_some()
                        };
                        if still_member {
                            return self
                                .do_reconnect(plugin, handle, session.player_id, connection_id, token.clone())
                                .await;
                        }
                    }
                }
            }
        }

        self.do_new_join(plugin, code, name, connection_id).await
    }

    async fn do_new_join(
        &self,
        plugin: Arc<dyn GamePlugin>,
        code: String,
        name: String,
        connection_id: ConnectionId,
    ) -> Result<(), LifecycleError> {
        let player = Player::new(connection_id, name, false);
        let handle = self.rooms.add_player(&code, player).await?;
        let player_id = {
            let room = handle.lock().await;
            room.players.get(&connection_id).map(|p| p.player_id)
        }
        .ok_or(LifecycleError::NotInRoom)?;

        let token = self.sessions.create(player_id, RoomCode(code.clone()));
        let joined_player = {
            let mut room = handle.lock().await;
            if let Some(p) = room.player_by_id_mut(player_id) {
                p.session_token = Some(token.clone());
            }
            room.player_by_id(player_id).cloned()
        }
        .ok_or(LifecycleError::NotInRoom)?;

        plugin.on_player_join(handle.clone(), joined_player.clone(), false).await?;

        let view = self.room_view(&plugin, &handle, connection_id).await;
        self.hub
            .send_to_connection(
                connection_id,
                "room:joined",
                json!({
                    "room": view,
                    "sessionToken": token.0,
                    "yourPlayerId": player_id,
                    "reconnected": false,
                }),
            )
            .await;

        let summary = json!({
            "playerId": joined_player.player_id,
            "name": joined_player.name,
            "isHost": joined_player.is_host,
            "status": "connected",
        });
        self.hub.send_to_room(&code, "player:joined", json!({ "player": summary })).await;
        Ok(())
    }

    async fn do_reconnect(
        &self,
        plugin: Arc<dyn GamePlugin>,
        handle: RoomHandle,
        player_id: PlayerId,
        new_connection_id: ConnectionId,
        token: SessionToken,
    ) -> Result<(), LifecycleError> {
        let old_connection_id = {
            let room = handle.lock().await;
            room.players.iter().find(|(_, p)| p.player_id == player_id).map(|(c, _)| *c)
        };

        let (room_opt, player_opt) = if let Some(old_conn) = old_connection_id {
            self.rooms.reconnect(old_conn, new_connection_id).await
        } else {
            (Some(handle.clone()), None)
        };

        let (room_handle, player) = match (room_opt, player_opt) {
            (Some(r), Some(p)) => (r, p),
            (Some(r), None) => {
                // Already-migrated race (spec §4.C): another path rebound
                // the connection already; fall back to the player-id keyed
                // rebind.
                let code = { r.lock().await.code.0.clone() };
                match self.rooms.reconnect_by_player(&code, player_id, new_connection_id).await {
                    (Some(r2), Some(p2)) => (r2, p2),
                    _ => {
                        return Err(LifecycleError::NotFound {
                            message: "player not found for reconnect".into(),
                            code: hearth_core::events::error_codes::ROOM_NOT_FOUND,
                        })
                    }
                }
            }
            _ => {
                return Err(LifecycleError::NotFound {
                    message: "room not found".into(),
                    code: hearth_core::events::error_codes::ROOM_NOT_FOUND,
                })
            }
        };

        if let Some(old_conn) = old_connection_id {
            if let Some((_, task)) = self.grace_timers.remove(&old_conn) {
                task.abort();
            }
        }

        plugin.on_player_join(room_handle.clone(), player.clone(), true).await?;

        let view = self.room_view(&plugin, &room_handle, new_connection_id).await;
        self.hub
            .send_to_connection(
                new_connection_id,
                "room:joined",
                json!({
                    "room": view,
                    "sessionToken": token.0,
                    "yourPlayerId": player_id,
                    "reconnected": true,
                }),
            )
            .await;

        self.broadcast_state_sync(&plugin, &room_handle).await;
        Ok(())
    }

    /// Broadcasts a per-perspective state sync to every socket currently in
    /// the room — the recovery path for reconnects, since membership may be
    /// transiently doubled during the rebind window (spec §4.F).
    async fn broadcast_state_sync(&self, plugin: &Arc<dyn GamePlugin>, handle: &RoomHandle) {
        let connection_ids: Vec<ConnectionId> = { handle.lock().await.players.keys().copied().collect() };
        for connection_id in connection_ids {
            let view = self.room_view(plugin, handle, connection_id).await;
            self.hub.send_to_connection(connection_id, "state:update", view).await;
        }
    }

    // ---- room:leave -------------------------------------------------------

    pub async fn handle_room_leave(&self, connection_id: ConnectionId) -> Result<(), LifecycleError> {
        let (room_opt, player_opt) = self.rooms.remove_player(connection_id).await;
        let player = player_opt.ok_or(LifecycleError::NotInRoom)?;
        if let Some(token) = &player.session_token {
            self.sessions.delete_by_token(token);
        }

        if let Some(room_handle) = room_opt {
            let game_id = { room_handle.lock().await.game_id.clone() };
            if let Some(plugin) = self.plugins.get(&game_id) {
                let _ = plugin.on_player_leave(room_handle.clone(), player.player_id).await;
            }
            let code = { room_handle.lock().await.code.0.clone() };
            self.hub.send_to_room(&code, "player:left", json!({ "playerId": player.player_id })).await;
        }
        Ok(())
    }

    // ---- chat:message ------------------------------------------------------

    pub async fn handle_chat_message(&self, connection_id: ConnectionId, payload: Value) -> Result<(), LifecycleError> {
        let handle = self.rooms.get_by_connection(connection_id).ok_or(LifecycleError::NotInRoom)?;
        let text = hearth_core::validator::validate_chat_message(
            payload.get("message").and_then(|v| v.as_str()).unwrap_or(""),
        )?;

        let (player_id, name, code, sent_at) = {
            let mut room = handle.lock().await;
            let player = room.players.get(&connection_id).cloned().ok_or(LifecycleError::NotInRoom)?;
            let sent_at = current_timestamp_ms();
            room.push_chat(ChatMessage {
                player_id: player.player_id,
                name: player.name.clone(),
                text: text.clone(),
                sent_at,
            });
            room.touch();
            (player.player_id, player.name, room.code.0.clone(), sent_at)
        };

        self.hub
            .send_to_room(
                &code,
                "chat:message",
                json!({ "playerId": player_id, "name": name, "text": text, "sentAt": sent_at }),
            )
            .await;
        Ok(())
    }

    // ---- mobile-heartbeat ---------------------------------------------------

    pub async fn handle_mobile_heartbeat(&self, connection_id: ConnectionId) {
        if let Some(handle) = self.rooms.get_by_connection(connection_id) {
            let mut room = handle.lock().await;
            if let Some(player) = room.players.get_mut(&connection_id) {
                player.touch();
            }
        }
    }

    // ---- game:sync-state ------------------------------------------------------

    pub async fn handle_sync_state(&self, connection_id: ConnectionId, payload: Value) -> Result<(), LifecycleError> {
        let room_code = payload.get("roomCode").and_then(|v| v.as_str());
        let handle = match room_code {
            Some(code) => self.rooms.get_by_code(code),
            None => self.rooms.get_by_connection(connection_id),
        }
        .ok_or(LifecycleError::NotInRoom)?;

        let game_id = { handle.lock().await.game_id.clone() };
        let plugin = self.plugins.get(&game_id).ok_or_else(|| LifecycleError::NotFound {
            message: "plugin not found for room".into(),
            code: hearth_core::events::error_codes::ROOM_NOT_FOUND,
        })?;

        let view = self.room_view(&plugin, &handle, connection_id).await;
        self.hub.send_to_connection(connection_id, "state:update", view).await;
        Ok(())
    }

    // ---- webrtc:* relay --------------------------------------------------------

    /// Forwards a WebRTC signaling event verbatim, scoped to a single peer
    /// (`toPeerId`) or to the whole room. The server never inspects `data`
    /// (spec §4.F, §9). Events for a connection not currently in a room are
    /// dropped silently rather than erroring.
    pub async fn handle_webrtc_relay(&self, connection_id: ConnectionId, event: &str, payload: Value) {
        let Some(handle) = self.rooms.get_by_connection(connection_id) else {
            debug!(event, "webrtc relay dropped: connection not in a room");
            return;
        };

        let (code, target) = {
            let room = handle.lock().await;
            let target = payload
                .get("toPeerId")
                .and_then(|v| v.as_str())
                .and_then(|s| uuid::Uuid::parse_str(s).ok())
                .and_then(|uuid| room.player_by_id(PlayerId(uuid)))
                .map(|p| p.connection_id);
            (room.code.0.clone(), target)
        };

        match target {
            Some(target_connection) => self.hub.send_to_connection(target_connection, event, payload).await,
            // Signaling must stay low-latency and in order, so relay bypasses
            // the broadcast coalescing window entirely (spec §5 precedence note).
            None => self.hub.send_to_room_immediate(&code, event, payload).await,
        }
    }

    // ---- platform:return ------------------------------------------------------

    pub async fn handle_platform_return(&self, connection_id: ConnectionId, payload: Value) -> Result<(), LifecycleError> {
        let handle = self.rooms.get_by_connection(connection_id).ok_or(LifecycleError::NotInRoom)?;
        let (code, game_id, player_id) = {
            let room = handle.lock().await;
            (room.code.0.clone(), room.game_id.clone(), room.players.get(&connection_id).map(|p| p.player_id))
        };

        let mode = payload.get("mode").and_then(|v| v.as_str()).unwrap_or("individual");
        let return_all = mode == "group";
        let reason = payload.get("reason").and_then(|v| v.as_str()).map(|s| s.to_string());
        let initiated_by = player_id.map(|p| p.to_string()).unwrap_or_default();

        let result = self
            .platform
            .request_return_to_lobby(ReturnToLobbyRequest {
                game_id,
                room_code: code.clone(),
                return_all,
                player_id: player_id.map(|p| p.to_string()),
                initiated_by,
                reason,
                metadata: None,
            })
            .await;

        let out = json!({
            "success": result.ok,
            "returnUrl": result.return_url,
            "sessionToken": result.session_token,
            "playersReturned": result.players_returned,
            "apiError": result.api_error,
        });

        if return_all {
            self.hub.send_to_room(&code, "platform:return-redirect", out).await;
        } else {
            self.hub.send_to_connection(connection_id, "platform:return-redirect", out).await;
        }
        Ok(())
    }

    // ---- plugin events ---------------------------------------------------------

    /// Routes a plugin-namespaced event to its handler. The room is looked
    /// up first by `connectionId`, then (fallback, for freshly rotated
    /// connections) by `payload.roomCode` (spec §4.F).
    pub async fn handle_plugin_event(&self, connection_id: ConnectionId, event: &str, payload: Value) -> Result<(), LifecycleError> {
        let handle = match self.rooms.get_by_connection(connection_id) {
            Some(handle) => Some(handle),
            None => payload
                .get("roomCode")
                .and_then(|v| v.as_str())
                .and_then(|code| self.rooms.get_by_code(code)),
        };

        let Some(handle) = handle else {
            return Err(LifecycleError::NotInRoom);
        };

        let (game_id, player_id) = {
            let room = handle.lock().await;
            (room.game_id.clone(), room.players.get(&connection_id).map(|p| p.player_id))
        };
        let plugin = self.plugins.get(&game_id).ok_or_else(|| LifecycleError::NotFound {
            message: "plugin not found for room".into(),
            code: hearth_core::events::error_codes::ROOM_NOT_FOUND,
        })?;

        let ctx = PluginEventContext {
            connection_id,
            player_id,
            room: Some(handle),
            hub: self.hub.clone(),
        };
        plugin.handle_event(event, payload, ctx).await.map_err(LifecycleError::from)
    }

    // ---- disconnect --------------------------------------------------------------

    /// Handles a transport-level disconnect. Hosts skip the grace period
    /// (spec §4.F); regular players get a 60s window to reconnect.
    pub async fn handle_disconnect(self: &Arc<Self>, connection_id: ConnectionId) {
        let Some(handle) = self.rooms.get_by_connection(connection_id) else {
            return;
        };
        let Some((is_host, player_id, code, game_id, session_token)) = (async {
            let room = handle.lock().await;
            let player = room.players.get(&connection_id)?;
            Some((
                room.host_connection_id == connection_id,
                player.player_id,
                room.code.0.clone(),
                room.game_id.clone(),
                player.session_token.clone(),
            ))
        })
        .await
        else {
            return;
        };

        let plugin = self.plugins.get(&game_id);

        if is_host {
            if let Some(plugin) = &plugin {
                let _ = plugin.on_host_leave(handle.clone(), player_id).await;
            }
            self.hub
                .send_to_room_immediate(&code, "host:disconnected", json!({ "formerHostId": player_id }))
                .await;
            self.sessions.delete_by_room(&RoomCode(code.clone()));
            self.rooms.destroy_room(&code).await;
            self.hub.forget_room(&code);
        } else {
            self.rooms.mark_disconnected(connection_id).await;
            self.hub.send_to_room(&code, "player:disconnected", json!({ "playerId": player_id })).await;
            if let Some(plugin) = &plugin {
                let _ = plugin.on_player_disconnected(handle.clone(), player_id).await;
            }
            self.arm_grace_timer(connection_id, player_id, game_id, session_token);
        }
    }

    fn arm_grace_timer(
        self: &Arc<Self>,
        connection_id: ConnectionId,
        player_id: PlayerId,
        game_id: String,
        session_token: Option<SessionToken>,
    ) {
        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            tokio::time::sleep(GRACE_PERIOD).await;
            let cleanup = Arc::clone(&this);
            this.finalize_grace_expiry(connection_id, player_id, game_id, session_token).await;
            cleanup.grace_timers.remove(&connection_id);
        });
        self.grace_timers.insert(connection_id, task);
    }

    /// Permanently removes a player whose grace timer expired while still
    /// disconnected. A no-op if the player already reconnected (the timer is
    /// normally aborted on reconnect, but this guards the race where both
    /// happen at once).
    async fn finalize_grace_expiry(
        &self,
        connection_id: ConnectionId,
        player_id: PlayerId,
        game_id: String,
        session_token: Option<SessionToken>,
    ) {
        let still_disconnected = self
            .rooms
            .get_player(connection_id)
            .await
            .map(|p| p.status == ConnectionStatus::Disconnected)
            .unwrap_or(false);
        if !still_disconnected {
            return;
        }

        let (room_opt, player_opt) = self.rooms.remove_player(connection_id).await;
        if player_opt.is_none() {
            return;
        }
        if let Some(token) = session_token {
            self.sessions.delete_by_token(&token);
        }
        if let Some(room_handle) = room_opt {
            if let Some(plugin) = self.plugins.get(&game_id) {
                let _ = plugin.on_player_leave(room_handle.clone(), player_id).await;
            }
            let code = room_handle.lock().await.code.0.clone();
            self.hub.send_to_room(&code, "player:left", json!({ "playerId": player_id })).await;
        }
    }
}

fn parse_room_settings(payload: &Value, plugin: &Arc<dyn GamePlugin>) -> RoomSettings {
    let mut settings = RoomSettings::default();
    match payload.get("settings") {
        Some(extra) if extra.is_object() => {
            if let Some(min) = extra.get("minPlayers").and_then(|v| v.as_u64()) {
                settings.min_players = min as usize;
            }
            if let Some(max) = extra.get("maxPlayers").and_then(|v| v.as_u64()) {
                settings.max_players = max as usize;
            }
            settings.extra = extra.clone();
        }
        _ => {
            settings.extra = plugin.default_settings();
        }
    }
    settings
}
