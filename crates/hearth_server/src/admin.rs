//! Read-only HTTP admin/stats surface (spec §4.J, §6 "HTTP admin surface").
//! The teacher has no HTTP admin routes of its own (Horizon's `GameServer`
//! exposes stats only through its WebSocket event system); this module is
//! enriched from the wider example pack's convention of pairing a WebSocket
//! game port with a small `axum` read-only HTTP port, per `SPEC_FULL.md`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use hearth_core::{RoomRegistry, SessionStore};
use hearth_plugins::PluginRegistry;
use serde_json::{json, Value};

use crate::health::{Metrics, StartTime};

#[derive(Clone)]
pub struct AdminState {
    pub rooms: Arc<RoomRegistry>,
    pub sessions: Arc<SessionStore>,
    pub plugins: Arc<PluginRegistry>,
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<StartTime>,
}

/// Builds the admin router described in spec §6: `GET /health`,
/// `GET /api/stats`, `GET /api/stats/:gameId`.
pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/stats", get(stats))
        .route("/api/stats/:game_id", get(stats_for_game))
        .with_state(state)
}

async fn health(State(state): State<AdminState>) -> Json<Value> {
    let report = state.start_time.report(state.plugins.ids());
    Json(json!({
        "status": "ok",
        "timestamp": report.timestamp,
        "uptime": report.uptime_seconds,
        "games": report.games,
    }))
}

async fn stats(State(state): State<AdminState>) -> Json<Value> {
    let metrics = state.metrics.snapshot();
    Json(json!({
        "server": {
            "uptime": metrics.uptime_seconds,
            "connections": metrics.connection_count,
        },
        "rooms": {
            "total": state.rooms.room_count(),
            "codes": state.rooms.all_codes().iter().map(|c| c.0.clone()).collect::<Vec<_>>(),
        },
        "sessions": {
            "total": state.sessions.len(),
        },
        "games": state.plugins.stats().into_iter().map(|s| json!({
            "id": s.id,
            "namespace": s.namespace,
            "eventCount": s.event_count,
            "rooms": state.rooms.room_count_for_game(&s.id),
        })).collect::<Vec<_>>(),
    }))
}

async fn stats_for_game(State(state): State<AdminState>, Path(game_id): Path<String>) -> Json<Value> {
    let room_count = state.rooms.room_count_for_game(&game_id);
    Json(json!({
        "gameId": game_id,
        "rooms": room_count,
    }))
}
