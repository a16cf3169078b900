//! `CycleState`: one player's light-cycle — its live kinematic state plus
//! the append-only history needed to replay it deterministically (spec §3).

use hearth_core::PlayerId;
use serde::{Deserialize, Serialize};

use crate::destination::{insert_sorted, Destination, InsertOutcome};
use crate::geometry::{Coord, Direction};
use crate::wall::PlayerWall;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleState {
    pub id: PlayerId,
    pub position: Coord,
    pub direction: Direction,
    pub speed: f64,
    /// Total path length travelled since spawn — the odometer (spec
    /// glossary, "Odometer").
    pub distance: f64,
    pub alive: bool,
    pub last_tick_time: f64,
    #[serde(skip)]
    pub destinations: Vec<Destination>,
    pub last_turn_position: Coord,
    pub last_turn_time: f64,
    pub turn_count: u32,
    pub color: String,
    pub spawn_position: Coord,
}

impl CycleState {
    pub fn spawn(id: PlayerId, position: Coord, direction: Direction, speed: f64, color: String) -> Self {
        let spawn_destination = Destination {
            position,
            direction,
            distance: 0.0,
            game_time: 0.0,
            message_id: 0,
            player_id: id,
        };
        Self {
            id,
            position,
            direction,
            speed,
            distance: 0.0,
            alive: true,
            last_tick_time: 0.0,
            destinations: vec![spawn_destination],
            last_turn_position: position,
            last_turn_time: 0.0,
            turn_count: 0,
            color,
            spawn_position: position,
        }
    }

    /// Inserts a destination into this cycle's history, keeping it sorted
    /// and de-duplicated by `(messageId, playerId)` (spec §8 invariant 8).
    pub fn insert_destination(&mut self, dest: Destination) -> InsertOutcome {
        insert_sorted(&mut self.destinations, dest)
    }

    /// Resets per-round state while keeping the cycle and its id/color
    /// (spec §4.H, "resetRound(): clear grid, keep cycles, reset per-round
    /// counters").
    pub fn reset_round(&mut self, position: Coord, direction: Direction, game_time: f64) {
        self.position = position;
        self.direction = direction;
        self.distance = 0.0;
        self.alive = true;
        self.last_tick_time = game_time;
        self.destinations = vec![Destination {
            position,
            direction,
            distance: 0.0,
            game_time,
            message_id: 0,
            player_id: self.id,
        }];
        self.last_turn_position = position;
        self.last_turn_time = game_time;
        self.turn_count = 0;
        self.spawn_position = position;
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CycleSnapshot {
    pub id: PlayerId,
    pub position: Coord,
    pub direction: Direction,
    pub distance: f64,
    pub speed: f64,
    pub alive: bool,
}

impl From<&CycleState> for CycleSnapshot {
    fn from(cycle: &CycleState) -> Self {
        Self {
            id: cycle.id,
            position: cycle.position,
            direction: cycle.direction,
            distance: cycle.distance,
            speed: cycle.speed,
            alive: cycle.alive,
        }
    }
}
