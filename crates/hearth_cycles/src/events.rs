//! Wire DTOs for the lightcycles namespace (spec §6, "TickEngine events").

use hearth_core::PlayerId;
use serde::{Deserialize, Serialize};

use crate::cycle::CycleSnapshot;
use crate::destination::Destination;
use crate::geometry::TurnDir;

/// `turn` — the only per-player input event. Either `turn_dir` or
/// `legacy_direction` is supplied, never both (spec §6).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    pub turn_dir: Option<TurnDir>,
    pub legacy_direction: Option<String>,
    pub message_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerReadyRequest {
    pub ready: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CountdownEvent {
    pub value: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundStartEvent {
    pub round: u32,
    pub game_time: f64,
    pub players: Vec<CycleSnapshot>,
    pub config: crate::settings::ArenaSettings,
}

/// Same shape as [`Destination`] on the wire; this alias exists so
/// call sites read `DestinationEvent` rather than the internal history
/// record type.
pub type DestinationEvent = Destination;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    pub game_time: f64,
    pub players: Vec<CycleSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HitType {
    Wall,
    Trail,
    #[serde(rename = "self")]
    SelfHit,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EliminatedEvent {
    pub player_id: PlayerId,
    pub position: crate::geometry::Coord,
    pub hit_type: HitType,
    pub eliminated_by: Option<PlayerId>,
    pub color: String,
}

/// One player's round score. JSON maps require string keys, so scores
/// travel as a list of entries rather than a `PlayerId`-keyed object.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
    pub player_id: PlayerId,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundOverEvent {
    pub winner_id: Option<PlayerId>,
    pub round: u32,
    pub scores: Vec<ScoreEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOverEvent {
    pub winner_id: Option<PlayerId>,
    pub final_scores: Vec<ScoreEntry>,
}
