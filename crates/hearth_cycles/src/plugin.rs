//! `LightcyclesPlugin`: wires [`TickEngine`] into the `GamePlugin`
//! interface — one engine and one background tick task per active room
//! (spec §4.H, §5 implementation shape (b)).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use hearth_core::{ConnectionId, Player, PlayerId, Room, RoomHandle};
use serde_json::json;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use hearth_plugins::{GamePlugin, HubHandle, PluginError, PluginEventContext};

use crate::engine::{TickEngine, ROUND_TRANSITION_DELAY_SECS};
use crate::events::{DestinationEvent, PlayerReadyRequest, RoundStartEvent, SyncEvent, TurnRequest};
use crate::geometry::legacy_direction;
use crate::settings::ArenaSettings;

const EVENTS: &[&str] = &["turn", "player:ready", "settings:update", "game:start", "restart"];
const TICK_INTERVAL: Duration = Duration::from_millis(16);
const COUNTDOWN_STEP: Duration = Duration::from_secs(1);
/// Dispatch-edge throttle for `turn` frames, ahead of and stricter than the
/// simulation layer's own `turnDelay` check (spec §4.H, "Inputs").
const DISPATCH_TURN_INTERVAL: Duration = Duration::from_millis(50);

struct RoomRuntime {
    engine: Mutex<TickEngine>,
    ready: Mutex<HashSet<PlayerId>>,
    tick_task: Mutex<Option<JoinHandle<()>>>,
    /// Last time each player's `turn` frame was accepted at the dispatch
    /// edge, independent of the engine's own per-cycle `last_turn_time`.
    last_turn_dispatch: Mutex<HashMap<PlayerId, Instant>>,
}

pub struct LightcyclesPlugin {
    hub: tokio::sync::OnceCell<Arc<dyn HubHandle>>,
    rooms: DashMap<String, Arc<RoomRuntime>>,
    shutdown: broadcast::Sender<()>,
}

impl LightcyclesPlugin {
    pub fn new() -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            hub: tokio::sync::OnceCell::new(),
            rooms: DashMap::new(),
            shutdown,
        }
    }

    fn hub(&self) -> Arc<dyn HubHandle> {
        self.hub.get().cloned().expect("plugin used before on_initialize")
    }

    fn runtime(&self, code: &str) -> Option<Arc<RoomRuntime>> {
        self.rooms.get(code).map(|e| e.clone())
    }

    /// Dispatch-edge rate gate for `turn` frames: at most one accepted per
    /// player per [`DISPATCH_TURN_INTERVAL`], checked before the engine is
    /// even locked (spec §4.H, "Inputs", "rate-limited to one per 50 ms per
    /// player at the dispatch edge").
    async fn admit_turn_dispatch(&self, runtime: &Arc<RoomRuntime>, player_id: PlayerId) -> bool {
        let now = Instant::now();
        let mut last = runtime.last_turn_dispatch.lock().await;
        match last.get(&player_id) {
            Some(previous) if now.duration_since(*previous) < DISPATCH_TURN_INTERVAL => false,
            _ => {
                last.insert(player_id, now);
                true
            }
        }
    }

    async fn start_game(&self, room_code: String, runtime: Arc<RoomRuntime>) {
        {
            let mut tick_task = runtime.tick_task.lock().await;
            if tick_task.is_some() {
                return;
            }
            let hub = self.hub();
            let mut shutdown = self.shutdown.subscribe();
            let runtime_for_task = runtime.clone();
            *tick_task = Some(tokio::spawn(async move {
                run_room(room_code, runtime_for_task, hub, &mut shutdown).await;
            }));
        }
    }
}

impl Default for LightcyclesPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GamePlugin for LightcyclesPlugin {
    fn id(&self) -> &str {
        "lightcycles"
    }

    fn namespace(&self) -> &str {
        "lightcycles"
    }

    fn default_settings(&self) -> serde_json::Value {
        serde_json::to_value(ArenaSettings::default()).unwrap_or(serde_json::Value::Null)
    }

    fn events(&self) -> &[&'static str] {
        EVENTS
    }

    async fn handle_event(
        &self,
        event: &str,
        payload: serde_json::Value,
        ctx: PluginEventContext,
    ) -> Result<(), PluginError> {
        let Some(room) = ctx.room else {
            return Err(PluginError::ExecutionError("not in a room".into()));
        };
        let Some(player_id) = ctx.player_id else {
            return Err(PluginError::ExecutionError("no player for connection".into()));
        };
        let room_code = room.lock().await.code.0.clone();
        let Some(runtime) = self.runtime(&room_code) else {
            return Err(PluginError::ExecutionError("room has no active engine".into()));
        };

        match event {
            "turn" => {
                let request: TurnRequest =
                    serde_json::from_value(payload).map_err(|e| PluginError::InvalidPayload(e.to_string()))?;

                if !self.admit_turn_dispatch(&runtime, player_id).await {
                    // Dispatch-edge throttle: drop silently rather than
                    // erroring, matching the simulation layer's own
                    // silent-drop of a too-soon turn (spec §4.H, "Inputs").
                    return Ok(());
                }

                let destination = {
                    let mut engine = runtime.engine.lock().await;
                    if let Some(turn_dir) = request.turn_dir {
                        engine.apply_turn(player_id, turn_dir)
                    } else if let Some(direction) = request.legacy_direction.as_deref().and_then(legacy_direction) {
                        engine.apply_legacy_turn(player_id, direction)
                    } else {
                        None
                    }
                };
                if let Some(destination) = destination {
                    self.hub()
                        .send_to_room_immediate(&room_code, "destination", to_json(&destination))
                        .await;
                }
                Ok(())
            }
            "player:ready" => {
                let request: PlayerReadyRequest =
                    serde_json::from_value(payload).map_err(|e| PluginError::InvalidPayload(e.to_string()))?;
                let mut ready = runtime.ready.lock().await;
                if request.ready {
                    ready.insert(player_id);
                } else {
                    ready.remove(&player_id);
                }
                Ok(())
            }
            "settings:update" => {
                let mut room_guard = room.lock().await;
                if room_guard.host_player_id != player_id {
                    return Err(PluginError::ExecutionError("only the host may update settings".into()));
                }
                merge_extra(&mut room_guard.settings.extra, &payload);
                let updated = ArenaSettings::from_json(&room_guard.settings.extra);
                drop(room_guard);
                runtime.engine.lock().await.settings = updated;
                Ok(())
            }
            "game:start" | "restart" => {
                let room_guard = room.lock().await;
                if room_guard.host_player_id != player_id {
                    return Err(PluginError::ExecutionError("only the host may start the game".into()));
                }
                drop(room_guard);
                self.start_game(room_code, runtime).await;
                Ok(())
            }
            other => Err(PluginError::NotFound(other.to_string())),
        }
    }

    async fn on_room_create(&self, room: RoomHandle) -> Result<(), PluginError> {
        let room_guard = room.lock().await;
        let code = room_guard.code.0.clone();
        let settings = ArenaSettings::from_json(&room_guard.settings.extra);
        let host_id = room_guard.host_player_id;
        drop(room_guard);

        let mut engine = TickEngine::new(settings);
        engine.add_player(host_id);
        self.rooms.insert(
            code,
            Arc::new(RoomRuntime {
                engine: Mutex::new(engine),
                ready: Mutex::new(HashSet::new()),
                tick_task: Mutex::new(None),
                last_turn_dispatch: Mutex::new(HashMap::new()),
            }),
        );
        Ok(())
    }

    async fn on_player_join(&self, room: RoomHandle, player: Player, _reconnecting: bool) -> Result<(), PluginError> {
        let code = room.lock().await.code.0.clone();
        if let Some(runtime) = self.runtime(&code) {
            runtime.engine.lock().await.add_player(player.player_id);
        }
        Ok(())
    }

    async fn on_player_disconnected(&self, _room: RoomHandle, _player_id: PlayerId) -> Result<(), PluginError> {
        Ok(())
    }

    async fn on_player_leave(&self, room: RoomHandle, player_id: PlayerId) -> Result<(), PluginError> {
        let code = room.lock().await.code.0.clone();
        if let Some(runtime) = self.runtime(&code) {
            runtime.engine.lock().await.remove_player(player_id);
            runtime.ready.lock().await.remove(&player_id);
            runtime.last_turn_dispatch.lock().await.remove(&player_id);
        }
        Ok(())
    }

    async fn on_host_leave(&self, room: RoomHandle, _former_host_id: PlayerId) -> Result<(), PluginError> {
        let code = room.lock().await.code.0.clone();
        if let Some((_, runtime)) = self.rooms.remove(&code) {
            if let Some(handle) = runtime.tick_task.lock().await.take() {
                handle.abort();
            }
        }
        Ok(())
    }

    fn serialize_room(&self, room: &Room, _perspective_connection_id: ConnectionId) -> serde_json::Value {
        let Some(runtime) = self.runtime(&room.code.0) else {
            return serde_json::Value::Null;
        };
        let Ok(engine) = runtime.engine.try_lock() else {
            return json!({ "phase": "busy" });
        };
        json!({
            "phase": format!("{:?}", engine.phase),
            "round": engine.round,
            "scores": engine.scores(),
            "cycles": engine.round_start_snapshots(),
        })
    }

    async fn on_initialize(&self, hub: Arc<dyn HubHandle>) -> Result<(), PluginError> {
        let _ = self.hub.set(hub);
        Ok(())
    }

    async fn on_cleanup(&self) -> Result<(), PluginError> {
        let _ = self.shutdown.send(());
        for entry in self.rooms.iter() {
            if let Some(handle) = entry.value().tick_task.lock().await.take() {
                handle.abort();
            }
        }
        self.rooms.clear();
        Ok(())
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

fn merge_extra(target: &mut serde_json::Value, patch: &serde_json::Value) {
    let (Some(target_obj), Some(patch_obj)) = (target.as_object_mut(), patch.as_object()) else {
        *target = patch.clone();
        return;
    };
    for (key, value) in patch_obj {
        target_obj.insert(key.clone(), value.clone());
    }
}

/// Drives one room's round lifecycle: countdown → play → round-over →
/// (repeat) or game-over, until the hub signals shutdown or the room is
/// torn down (spec §4.H, "Round/game end").
async fn run_room(
    room_code: String,
    runtime: Arc<RoomRuntime>,
    hub: Arc<dyn HubHandle>,
    shutdown: &mut broadcast::Receiver<()>,
) {
    'game: loop {
        for value in (1..=3u32).rev() {
            hub.send_to_room_immediate(&room_code, "countdown", json!({ "value": value })).await;
            if sleep_or_shutdown(COUNTDOWN_STEP, shutdown).await {
                return;
            }
        }

        let round_start = {
            let mut engine = runtime.engine.lock().await;
            engine.start_round();
            RoundStartEvent {
                round: engine.round,
                game_time: engine.game_time,
                players: engine.round_start_snapshots(),
                config: engine.settings,
            }
        };
        hub.send_to_room_immediate(&room_code, "round:start", to_json(&round_start)).await;

        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        let mut last = Instant::now();
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let dt = last.elapsed().as_secs_f64();
                    last = Instant::now();

                    let mut engine = runtime.engine.lock().await;
                    let tick_outcome = engine.tick(dt);
                    let should_sync = engine.should_full_sync();
                    let sync_event = should_sync.then(|| SyncEvent {
                        game_time: engine.game_time,
                        players: engine.round_start_snapshots(),
                    });
                    let round_outcome = if tick_outcome.eliminations.is_empty() {
                        None
                    } else {
                        engine.round_end_check()
                    };
                    drop(engine);

                    for elimination in &tick_outcome.eliminations {
                        hub.send_to_room_immediate(&room_code, "eliminated", to_json(&elimination.event)).await;
                    }
                    for destination in &tick_outcome.wrapped_destinations {
                        hub.send_to_room_immediate(&room_code, "destination", to_json(destination)).await;
                    }
                    if let Some(sync_event) = sync_event {
                        hub.send_to_room_immediate(&room_code, "sync", to_json(&sync_event)).await;
                    }

                    if let Some(round_outcome) = round_outcome {
                        hub.send_to_room_immediate(&room_code, "round:over", to_json(&round_outcome.round_over)).await;
                        if let Some(game_over) = round_outcome.game_over {
                            hub.send_to_room_immediate(&room_code, "game:over", to_json(&game_over)).await;
                            debug!(room_code, "lightcycles game over");
                            break 'game;
                        }
                        if sleep_or_shutdown(Duration::from_secs_f64(ROUND_TRANSITION_DELAY_SECS), shutdown).await {
                            return;
                        }
                        break;
                    }
                }
                _ = shutdown.recv() => {
                    return;
                }
            }
        }
    }

    let mut tick_task = runtime.tick_task.lock().await;
    *tick_task = None;
}

/// Sleeps for `duration` unless `shutdown` fires first, in which case it
/// returns `true` so the caller can unwind instead of continuing the
/// sequence (spec §5, "Tick loops must be stoppable on room destroy").
async fn sleep_or_shutdown(duration: Duration, shutdown: &mut broadcast::Receiver<()>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown.recv() => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_extra_overlays_keys_without_dropping_unset_ones() {
        let mut target = json!({ "arenaSize": 100.0, "speed": 20.0 });
        merge_extra(&mut target, &json!({ "speed": 30.0 }));
        assert_eq!(target["arenaSize"], 100.0);
        assert_eq!(target["speed"], 30.0);
    }
}
