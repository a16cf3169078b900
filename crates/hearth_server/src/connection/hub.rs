//! The connection hub: tracks per-connection outbound channels, routes
//! frames to the right namespace, and throttles room broadcasts. See spec
//! §4.E, grounded on `game_server/src/connection/manager.rs` and
//! `server/handlers.rs`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use hearth_core::{ConnectionId, RoomCode, RoomRegistry};
use hearth_plugins::HubHandle;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};

use super::frame::OutboundFrame;
use crate::health::metrics::Metrics;

/// The subset of state the broadcast coalescer needs per room — a
/// last-flush timestamp and a single pending-payload slot, as design note
/// "Broadcast throttler state" specifies (no per-event fan-out: the whole
/// room shares one throttle, so the latest call wins regardless of which
/// event it carried).
struct ThrottleState {
    last_flush: tokio::time::Instant,
    pending: Option<(String, serde_json::Value)>,
    flush_scheduled: bool,
}

pub struct ConnectionHub {
    rooms: Arc<RoomRegistry>,
    connections: Arc<DashMap<ConnectionId, mpsc::UnboundedSender<Message>>>,
    throttles: Arc<DashMap<RoomCode, Arc<Mutex<ThrottleState>>>>,
    broadcast_window: Duration,
    metrics: Arc<Metrics>,
}

impl ConnectionHub {
    pub fn new(rooms: Arc<RoomRegistry>, broadcast_window: Duration, metrics: Arc<Metrics>) -> Arc<Self> {
        Arc::new(Self {
            rooms,
            connections: Arc::new(DashMap::new()),
            throttles: Arc::new(DashMap::new()),
            broadcast_window,
            metrics,
        })
    }

    pub fn register(&self, connection_id: ConnectionId, sender: mpsc::UnboundedSender<Message>) {
        self.connections.insert(connection_id, sender);
        self.metrics.set_connection_count(self.connections.len());
    }

    pub fn unregister(&self, connection_id: ConnectionId) {
        self.connections.remove(&connection_id);
        self.metrics.set_connection_count(self.connections.len());
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Drops the room's throttle state; called from room-destroy paths so
    /// the map doesn't grow unbounded over the process lifetime (spec §9,
    /// "Broadcast throttler state... entries evicted on room destroy").
    pub fn evict_room_throttle(&self, code: &str) {
        self.throttles.remove(code);
    }

    async fn deliver(&self, connection_id: ConnectionId, event: &str, payload: serde_json::Value) {
        let Some(sender) = self.connections.get(&connection_id).map(|e| e.clone()) else {
            trace!(%connection_id, event, "send to vanished connection dropped");
            return;
        };
        let text = OutboundFrame::new(event, payload).to_text();
        // A send failure here means the connection is already being torn
        // down elsewhere; spec §7 says such failures are silent.
        let _ = sender.send(Message::Text(text));
    }

    async fn flush_room_now(&self, room_code: &str, event: &str, payload: serde_json::Value) {
        let Some(room) = self.rooms.get_by_code(room_code) else {
            return;
        };
        let connection_ids: Vec<ConnectionId> = {
            let room = room.lock().await;
            room.players.keys().copied().collect()
        };
        for connection_id in connection_ids {
            self.deliver(connection_id, event, payload.clone()).await;
        }
        self.metrics.record_broadcast();
    }

    fn throttle_for(&self, room_code: &str) -> Arc<Mutex<ThrottleState>> {
        if let Some(existing) = self.throttles.get(room_code) {
            return existing.clone();
        }
        let state = Arc::new(Mutex::new(ThrottleState {
            last_flush: tokio::time::Instant::now() - self.broadcast_window,
            pending: None,
            flush_scheduled: false,
        }));
        self.throttles.insert(RoomCode(room_code.to_string()), state.clone());
        state
    }
}

#[async_trait]
impl HubHandle for ConnectionHub {
    async fn send_to_connection(&self, connection_id: ConnectionId, event: &str, payload: serde_json::Value) {
        self.deliver(connection_id, event, payload).await;
    }

    /// Coalesces to at most one flush per [`Self::broadcast_window`] per
    /// room (spec §4.E point 4). The latest call before a flush wins.
    async fn send_to_room(&self, room_code: &str, event: &str, payload: serde_json::Value) {
        let throttle = self.throttle_for(room_code);

        let mut state = throttle.lock().await;
        let now = tokio::time::Instant::now();
        if now.duration_since(state.last_flush) >= self.broadcast_window {
            state.last_flush = now;
            state.pending = None;
            state.flush_scheduled = false;
            drop(state);
            self.flush_room_now(room_code, event, payload).await;
            return;
        }

        state.pending = Some((event.to_string(), payload));
        if state.flush_scheduled {
            return;
        }
        state.flush_scheduled = true;
        let when = state.last_flush + self.broadcast_window;
        drop(state);

        let room_code = room_code.to_string();
        let throttle = throttle.clone();
        let hub_rooms = self.rooms.clone();
        let metrics = self.metrics.clone();
        let connections = self.connections.clone();
        let deliver_window = self.broadcast_window;
        tokio::spawn(async move {
            tokio::time::sleep_until(when).await;
            let pending = {
                let mut state = throttle.lock().await;
                state.flush_scheduled = false;
                state.last_flush = tokio::time::Instant::now();
                state.pending.take()
            };
            let Some((event, payload)) = pending else { return };
            let Some(room) = hub_rooms.get_by_code(&room_code) else { return };
            let connection_ids: Vec<ConnectionId> = {
                let room = room.lock().await;
                room.players.keys().copied().collect()
            };
            for connection_id in connection_ids {
                if let Some(sender) = connections.get(&connection_id).map(|e| e.clone()) {
                    let text = OutboundFrame::new(&event, payload.clone()).to_text();
                    let _ = sender.send(Message::Text(text));
                }
            }
            metrics.record_broadcast();
            let _ = deliver_window; // retained for symmetry with the immediate path's window bookkeeping
        });
    }

    async fn send_to_room_immediate(&self, room_code: &str, event: &str, payload: serde_json::Value) {
        debug!(room_code, event, "immediate broadcast (bypasses coalescing)");
        self.flush_room_now(room_code, event, payload).await;
    }

    fn forget_room(&self, room_code: &str) {
        self.evict_room_throttle(room_code);
    }
}
