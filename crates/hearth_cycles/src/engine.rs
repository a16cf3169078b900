//! `TickEngine`: the light-cycle arena simulation for a single room (spec
//! §4.H, in full). Pure state plus synchronous transitions; the owning
//! `LightcyclesPlugin` drives its clock and turns its outputs into wire
//! events.

use std::collections::HashMap;

use hearth_core::PlayerId;
use rand::seq::SliceRandom;

use crate::collision::{advance_cycle, AdvanceOutcome};
use crate::cycle::{CycleSnapshot, CycleState};
use crate::destination::{Destination, InsertOutcome};
use crate::events::{EliminatedEvent, GameOverEvent, RoundOverEvent, ScoreEntry};
use crate::geometry::{rotate, turn_dir_for_legacy, Coord, Direction, TurnDir};
use crate::grid::CollisionGrid;
use crate::settings::ArenaSettings;
use crate::wall::PlayerWall;

/// How often the full-sync snapshot is broadcast (spec §4.H, "Periodic
/// full sync").
pub const FULL_SYNC_INTERVAL_SECS: f64 = 0.5;
/// Delay between a round ending and the next countdown starting (spec
/// §4.H, "Round/game end").
pub const ROUND_TRANSITION_DELAY_SECS: f64 = 3.0;

const SPAWN_COLORS: &[&str] = &["#ff4d4d", "#4da6ff", "#4dff88", "#ffd24d", "#d24dff", "#4dffea", "#ff914d", "#c4ff4d"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Lobby,
    Countdown,
    Playing,
    RoundOver,
    GameOver,
}

/// One cycle's fate this tick, ready to become an `eliminated` wire event.
pub struct EliminationNotice {
    pub player_id: PlayerId,
    pub event: EliminatedEvent,
}

#[derive(Default)]
pub struct TickOutcome {
    pub eliminations: Vec<EliminationNotice>,
    /// Destinations produced by wrap teleports this tick; broadcast
    /// immediately like a player-issued turn (spec §5).
    pub wrapped_destinations: Vec<Destination>,
}

pub struct RoundOutcome {
    pub round_over: RoundOverEvent,
    pub game_over: Option<GameOverEvent>,
}

pub struct TickEngine {
    pub settings: ArenaSettings,
    pub phase: EnginePhase,
    pub round: u32,
    pub game_time: f64,
    next_message_id: u64,
    last_full_sync_at: f64,
    cycles: HashMap<PlayerId, CycleState>,
    walls: HashMap<PlayerId, PlayerWall>,
    grid: CollisionGrid,
    scores: HashMap<PlayerId, u32>,
    /// Insertion order, used for deterministic spawn layout and as the
    /// player roster for round resets.
    roster: Vec<PlayerId>,
}

impl TickEngine {
    pub fn new(settings: ArenaSettings) -> Self {
        Self {
            grid: CollisionGrid::new(settings.grid_size),
            settings,
            phase: EnginePhase::Lobby,
            round: 0,
            game_time: 0.0,
            next_message_id: 1,
            last_full_sync_at: 0.0,
            cycles: HashMap::new(),
            walls: HashMap::new(),
            scores: HashMap::new(),
            roster: Vec::new(),
        }
    }

    pub fn is_tracked(&self, player_id: PlayerId) -> bool {
        self.roster.contains(&player_id)
    }

    /// Adds a player to the roster (called on join, before the first
    /// round starts). Has no effect on a round already in progress.
    pub fn add_player(&mut self, player_id: PlayerId) {
        if !self.roster.contains(&player_id) {
            self.roster.push(player_id);
            self.scores.entry(player_id).or_insert(0);
        }
    }

    pub fn remove_player(&mut self, player_id: PlayerId) {
        self.roster.retain(|id| *id != player_id);
        self.cycles.remove(&player_id);
        self.walls.remove(&player_id);
        self.scores.remove(&player_id);
    }

    pub fn scores(&self) -> Vec<ScoreEntry> {
        self.roster
            .iter()
            .map(|id| ScoreEntry {
                player_id: *id,
                score: self.scores.get(id).copied().unwrap_or(0),
            })
            .collect()
    }

    /// (Re)starts a round with the current roster: resets the grid and
    /// every cycle to a fresh spawn layout, keeping scores and identity
    /// (spec §4.H, "resetRound(): clear grid, keep cycles, reset per-round
    /// counters").
    pub fn start_round(&mut self) {
        self.round += 1;
        self.game_time = 0.0;
        self.next_message_id = 1;
        self.last_full_sync_at = 0.0;
        self.grid.clear();
        self.phase = EnginePhase::Playing;

        let layout = spawn_layout(self.roster.len(), self.settings.half_size());
        for (i, player_id) in self.roster.clone().into_iter().enumerate() {
            let (position, direction) = layout[i];
            let color = SPAWN_COLORS[i % SPAWN_COLORS.len()].to_string();
            match self.cycles.get_mut(&player_id) {
                Some(cycle) => cycle.reset_round(position, direction, 0.0),
                None => {
                    self.cycles
                        .insert(player_id, CycleState::spawn(player_id, position, direction, self.settings.speed, color));
                }
            }
            self.walls.insert(player_id, PlayerWall::spawn(player_id, position));
        }
    }

    pub fn snapshot(&self, player_id: PlayerId) -> Option<CycleSnapshot> {
        self.cycles.get(&player_id).map(CycleSnapshot::from)
    }

    pub fn round_start_snapshots(&self) -> Vec<CycleSnapshot> {
        self.roster.iter().filter_map(|id| self.cycles.get(id)).map(CycleSnapshot::from).collect()
    }

    /// Applies a directional turn request, returning the `Destination` to
    /// broadcast if accepted, or `None` if rejected/a no-op (spec §4.H,
    /// "Turn semantics").
    pub fn apply_turn(&mut self, player_id: PlayerId, turn_dir: TurnDir) -> Option<Destination> {
        let cycle = self.cycles.get_mut(&player_id)?;
        if !cycle.alive || self.game_time - cycle.last_turn_time < self.settings.turn_delay {
            return None;
        }

        let new_direction = rotate(cycle.direction, turn_dir);
        let message_id = self.next_message_id;
        self.next_message_id += 1;

        let destination = Destination {
            position: cycle.position,
            direction: new_direction,
            distance: cycle.distance,
            game_time: self.game_time,
            message_id,
            player_id,
        };

        cycle.direction = new_direction;
        cycle.last_turn_position = cycle.position;
        cycle.last_turn_time = self.game_time;
        cycle.turn_count += 1;
        cycle.insert_destination(destination);

        if let Some(wall) = self.walls.get_mut(&player_id) {
            wall.break_at(cycle.position, cycle.distance, self.game_time);
        }

        Some(destination)
    }

    /// Resolves a legacy absolute-direction turn request to a relative
    /// `TurnDir` before applying it (spec §9 open-question resolution).
    pub fn apply_legacy_turn(&mut self, player_id: PlayerId, requested: Direction) -> Option<Destination> {
        let current = self.cycles.get(&player_id)?.direction;
        let turn_dir = turn_dir_for_legacy(current, requested)?;
        self.apply_turn(player_id, turn_dir)
    }

    /// Merges a remote (spectator/late-joiner) destination into a cycle's
    /// history, snapping its live heading if it lands at the tail (spec
    /// §4.H, "On inbound remote Destination").
    pub fn merge_remote_destination(&mut self, destination: Destination) {
        let Some(cycle) = self.cycles.get_mut(&destination.player_id) else {
            return;
        };
        if let InsertOutcome::Inserted { is_latest: true } = cycle.insert_destination(destination) {
            cycle.direction = destination.direction;
            if let Some(wall) = self.walls.get_mut(&destination.player_id) {
                wall.break_at(destination.position, destination.distance, destination.game_time);
            }
        }
    }

    /// Advances the simulation by `dt` seconds (spec §4.H, "Fixed-timestep
    /// loop"). No-op while not `Playing`.
    pub fn tick(&mut self, dt: f64) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if self.phase != EnginePhase::Playing {
            return outcome;
        }
        self.game_time += dt;

        for player_id in self.roster.clone() {
            let Some(cycle) = self.cycles.get_mut(&player_id) else {
                continue;
            };
            if !cycle.alive {
                continue;
            }
            let Some(wall) = self.walls.get_mut(&player_id) else {
                continue;
            };
            let AdvanceOutcome {
                eliminated,
                wrapped_destination,
            } = advance_cycle(cycle, wall, &mut self.grid, &self.settings, dt, self.game_time, &mut self.next_message_id);

            if let Some(elimination) = eliminated {
                outcome.eliminations.push(EliminationNotice {
                    player_id,
                    event: EliminatedEvent {
                        player_id,
                        position: elimination.position,
                        hit_type: elimination.hit_type,
                        eliminated_by: elimination.hit_player_id,
                        color: cycle.color.clone(),
                    },
                });
            }
            if let Some(destination) = wrapped_destination {
                outcome.wrapped_destinations.push(destination);
            }
        }

        outcome
    }

    pub fn should_full_sync(&mut self) -> bool {
        if self.game_time - self.last_full_sync_at >= FULL_SYNC_INTERVAL_SECS {
            self.last_full_sync_at = self.game_time;
            true
        } else {
            false
        }
    }

    /// Checks whether the round just ended (≤1 cycle alive) and, if so,
    /// awards the point and decides whether the game is over (spec §4.H,
    /// "Round/game end"). Must be called after every `tick` that produced
    /// at least one elimination.
    pub fn round_end_check(&mut self) -> Option<RoundOutcome> {
        if self.phase != EnginePhase::Playing {
            return None;
        }
        let total = self.roster.len();
        let alive: Vec<PlayerId> = self
            .roster
            .iter()
            .copied()
            .filter(|id| self.cycles.get(id).is_some_and(|c| c.alive))
            .collect();

        let winner = if total <= 1 {
            // Solo: round ends only once the single cycle has died.
            if alive.is_empty() {
                self.roster.first().copied()
            } else {
                return None;
            }
        } else if alive.len() > 1 {
            return None;
        } else if let Some(only) = alive.first() {
            Some(*only)
        } else {
            // All died the same tick: random tie-break (spec §4.H).
            self.roster.choose(&mut rand::thread_rng()).copied()
        };

        self.phase = EnginePhase::RoundOver;
        if let Some(winner_id) = winner {
            *self.scores.entry(winner_id).or_insert(0) += 1;
        }

        let top_score = self.scores.values().copied().max().unwrap_or(0);
        let game_over = top_score >= self.settings.rounds_to_win;
        if game_over {
            self.phase = EnginePhase::GameOver;
        }

        Some(RoundOutcome {
            round_over: RoundOverEvent {
                winner_id: winner,
                round: self.round,
                scores: self.scores(),
            },
            game_over: game_over.then(|| GameOverEvent {
                winner_id: winner,
                final_scores: self.scores(),
            }),
        })
    }

    pub fn begin_countdown(&mut self) {
        self.phase = EnginePhase::Countdown;
    }
}

/// Places `count` cycles evenly around a circle, each facing tangentially
/// so initial headings never point straight at another spawn (a concrete,
/// deterministic layout; the spec leaves spawn placement unspecified
/// beyond "distinct starting positions").
fn spawn_layout(count: usize, half_size: f64) -> Vec<(Coord, Direction)> {
    if count == 0 {
        return Vec::new();
    }
    let radius = half_size * 0.6;
    (0..count)
        .map(|i| {
            let angle = 2.0 * std::f64::consts::PI * (i as f64) / (count as f64);
            let position = Coord::new(radius * angle.cos(), radius * angle.sin());
            let direction = tangential_direction(angle);
            (position, direction)
        })
        .collect()
}

fn tangential_direction(angle: f64) -> Direction {
    let raw = Coord::new(-angle.sin(), angle.cos());
    snap_to_cardinal(raw)
}

/// Snaps an arbitrary heading to the nearest cardinal direction, since the
/// arena's grid and turn algebra are axis-aligned (spec §3, "Direction").
fn snap_to_cardinal(dir: Coord) -> Direction {
    if dir.x.abs() >= dir.z.abs() {
        Coord::new(dir.x.signum(), 0.0)
    } else {
        Coord::new(0.0, dir.z.signum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(players: usize) -> TickEngine {
        let mut engine = TickEngine::new(ArenaSettings::default());
        for _ in 0..players {
            engine.add_player(PlayerId::new());
        }
        engine.start_round();
        engine
    }

    #[test]
    fn start_round_spawns_one_cycle_per_player() {
        let engine = engine_with(3);
        assert_eq!(engine.round_start_snapshots().len(), 3);
        assert_eq!(engine.phase, EnginePhase::Playing);
    }

    #[test]
    fn turn_is_rejected_within_the_turn_delay_window() {
        let mut engine = engine_with(1);
        let player_id = engine.roster[0];
        assert!(engine.apply_turn(player_id, 1).is_some());
        assert!(engine.apply_turn(player_id, 1).is_none());
    }

    #[test]
    fn turn_after_the_delay_window_is_accepted() {
        let mut engine = engine_with(1);
        let player_id = engine.roster[0];
        engine.apply_turn(player_id, 1);
        engine.game_time += engine.settings.turn_delay + 0.001;
        assert!(engine.apply_turn(player_id, 1).is_some());
    }

    #[test]
    fn last_cycle_standing_wins_the_round() {
        let mut engine = engine_with(2);
        let loser = engine.roster[0];
        engine.cycles.get_mut(&loser).unwrap().alive = false;

        let outcome = engine.round_end_check().expect("round should end");
        assert_eq!(outcome.round_over.winner_id, Some(engine.roster[1]));
        assert_eq!(engine.scores.get(&engine.roster[1]), Some(&1));
    }

    #[test]
    fn reaching_rounds_to_win_ends_the_game() {
        let mut engine = engine_with(2);
        engine.settings.rounds_to_win = 1;
        let loser = engine.roster[0];
        engine.cycles.get_mut(&loser).unwrap().alive = false;

        let outcome = engine.round_end_check().expect("round should end");
        assert!(outcome.game_over.is_some());
        assert_eq!(engine.phase, EnginePhase::GameOver);
    }

    #[test]
    fn solo_round_ends_only_once_the_cycle_dies() {
        let mut engine = engine_with(1);
        assert!(engine.round_end_check().is_none());
        let only = engine.roster[0];
        engine.cycles.get_mut(&only).unwrap().alive = false;
        let outcome = engine.round_end_check().expect("round should end");
        assert_eq!(outcome.round_over.winner_id, Some(only));
    }
}
