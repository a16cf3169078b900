//! The per-tick advance-and-collide step for one cycle (spec §4.H, "Fixed-
//! timestep loop" and "Collision rules"). Kept as a pure function of its
//! arguments so it can be unit-tested without a running engine.

use hearth_core::PlayerId;

use crate::cycle::CycleState;
use crate::destination::Destination;
use crate::events::HitType;
use crate::geometry::Coord;
use crate::grid::{bresenham_line, CollisionGrid};
use crate::settings::ArenaSettings;
use crate::wall::PlayerWall;

/// Inset applied when teleporting a wrapped cycle so it lands strictly
/// inside the opposite edge rather than exactly on the boundary (spec
/// §4.H, "teleport to the opposite edge with an epsilon inset").
const WRAP_EPSILON: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EliminationOutcome {
    pub position: Coord,
    pub hit_type: HitType,
    pub hit_player_id: Option<PlayerId>,
}

#[derive(Debug, Clone, Default)]
pub struct AdvanceOutcome {
    pub eliminated: Option<EliminationOutcome>,
    /// Set when this tick wrapped the cycle around an edge; the caller
    /// must broadcast it the same way as a player-issued turn (spec §4.H,
    /// "immediately create a synthetic destination").
    pub wrapped_destination: Option<Destination>,
}

/// Advances one alive cycle by `dt` seconds and resolves any collision.
/// Does nothing if `cycle.alive` is already false (spec invariant 10: no
/// further grid mutation once eliminated).
#[allow(clippy::too_many_arguments)]
pub fn advance_cycle(
    cycle: &mut CycleState,
    wall: &mut PlayerWall,
    grid: &mut CollisionGrid,
    settings: &ArenaSettings,
    dt: f64,
    game_time: f64,
    next_message_id: &mut u64,
) -> AdvanceOutcome {
    if !cycle.alive {
        return AdvanceOutcome::default();
    }

    let prev_pos = cycle.position;
    let travelled = cycle.speed * dt;
    let raw_new_pos = prev_pos.add_scaled(cycle.direction, travelled);
    let new_distance = cycle.distance + travelled;
    let half = settings.half_size();

    let crossed = raw_new_pos.x.abs() > half || raw_new_pos.z.abs() > half;

    if crossed && settings.wrap_around {
        let wrapped_pos = wrap_position(raw_new_pos, half);
        let message_id = *next_message_id;
        *next_message_id += 1;

        wall.break_at(wrapped_pos, new_distance, game_time);
        cycle.position = wrapped_pos;
        cycle.distance = new_distance;
        cycle.last_tick_time = game_time;

        let destination = Destination {
            position: wrapped_pos,
            direction: cycle.direction,
            distance: new_distance,
            game_time,
            message_id,
            player_id: cycle.id,
        };
        cycle.insert_destination(destination);

        return AdvanceOutcome {
            eliminated: None,
            wrapped_destination: Some(destination),
        };
    }

    if crossed {
        cycle.alive = false;
        return AdvanceOutcome {
            eliminated: Some(EliminationOutcome {
                position: clamp_to_bounds(raw_new_pos, half),
                hit_type: HitType::Wall,
                hit_player_id: None,
            }),
            wrapped_destination: None,
        };
    }

    let start_cell = grid.cell_of(prev_pos);
    let end_cell = grid.cell_of(raw_new_pos);
    let path = bresenham_line(start_cell, end_cell);

    // First pass: look for the first offending cell without mutating the
    // grid, so an elimination this tick marks nothing (spec §4.H, "skip
    // trail marking for this step").
    for cell in path.iter().skip(1) {
        match grid.owner(*cell) {
            Some(owner) if owner == cycle.id => {
                if self_collision_applies(cycle, settings, grid, *cell, new_distance) {
                    cycle.alive = false;
                    return AdvanceOutcome {
                        eliminated: Some(EliminationOutcome {
                            position: grid.world_of(*cell),
                            hit_type: HitType::SelfHit,
                            hit_player_id: Some(cycle.id),
                        }),
                        wrapped_destination: None,
                    };
                }
            }
            Some(owner) => {
                cycle.alive = false;
                return AdvanceOutcome {
                    eliminated: Some(EliminationOutcome {
                        position: grid.world_of(*cell),
                        hit_type: HitType::Trail,
                        hit_player_id: Some(owner),
                    }),
                    wrapped_destination: None,
                };
            }
            None => {}
        }
    }

    // Survived the walk: tag every untouched cell along it, including the
    // starting cell (spec §4.H step 4, "already-tagged cells are not
    // overwritten").
    for cell in &path {
        grid.claim(*cell, cycle.id);
    }

    wall.extend(raw_new_pos, new_distance, game_time);
    cycle.position = raw_new_pos;
    cycle.distance = new_distance;
    cycle.last_tick_time = game_time;

    AdvanceOutcome::default()
}

/// Self-elimination is gated on three conditions so a cycle cannot kill
/// itself on the trail cell it just laid down at spawn (spec §4.H, "Self
/// trail").
fn self_collision_applies(
    cycle: &CycleState,
    settings: &ArenaSettings,
    grid: &CollisionGrid,
    cell: crate::grid::Cell,
    new_distance: f64,
) -> bool {
    settings.self_collision
        && new_distance > 3.0 * settings.grid_size
        && grid.world_of(cell).distance_to(cycle.spawn_position) > 4.0 * settings.grid_size
}

fn wrap_position(pos: Coord, half: f64) -> Coord {
    Coord::new(wrap_axis(pos.x, half), wrap_axis(pos.z, half))
}

fn wrap_axis(v: f64, half: f64) -> f64 {
    if v > half {
        -half + WRAP_EPSILON
    } else if v < -half {
        half - WRAP_EPSILON
    } else {
        v
    }
}

fn clamp_to_bounds(pos: Coord, half: f64) -> Coord {
    Coord::new(pos.x.clamp(-half, half), pos.z.clamp(-half, half))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{EAST, NORTH, WEST};

    fn settings(wrap: bool) -> ArenaSettings {
        ArenaSettings {
            arena_size: 100.0,
            wrap_around: wrap,
            grid_size: 1.0,
            speed: 20.0,
            turn_delay: 0.1,
            self_collision: true,
            rounds_to_win: 3,
        }
    }

    #[test]
    fn wrap_teleports_without_eliminating_and_emits_a_destination() {
        let id = PlayerId::new();
        let mut cycle = CycleState::spawn(id, Coord::new(-49.0, 0.0), WEST, 20.0, "red".into());
        let mut wall = PlayerWall::spawn(id, cycle.position);
        let mut grid = CollisionGrid::new(1.0);
        let cfg = settings(true);
        let mut next_id = 1;

        let outcome = advance_cycle(&mut cycle, &mut wall, &mut grid, &cfg, 0.1, 0.1, &mut next_id);

        assert!(outcome.eliminated.is_none());
        assert!(outcome.wrapped_destination.is_some());
        assert!(cycle.alive);
        assert!(cycle.position.x > 49.0);
    }

    #[test]
    fn non_wrap_out_of_bounds_is_a_wall_elimination() {
        let id = PlayerId::new();
        let mut cycle = CycleState::spawn(id, Coord::new(-49.9, 0.0), WEST, 20.0, "red".into());
        let mut wall = PlayerWall::spawn(id, cycle.position);
        let mut grid = CollisionGrid::new(1.0);
        let cfg = settings(false);
        let mut next_id = 1;

        let outcome = advance_cycle(&mut cycle, &mut wall, &mut grid, &cfg, 0.1, 0.1, &mut next_id);

        assert!(!cycle.alive);
        assert_eq!(outcome.eliminated.unwrap().hit_type, HitType::Wall);
    }

    #[test]
    fn crossing_another_players_trail_eliminates_with_trail_hit_type() {
        let victim_id = PlayerId::new();
        let owner_id = PlayerId::new();
        let mut cycle = CycleState::spawn(victim_id, Coord::new(-2.0, 0.0), EAST, 20.0, "red".into());
        let mut wall = PlayerWall::spawn(victim_id, cycle.position);
        let mut grid = CollisionGrid::new(1.0);
        grid.claim((0, 0), owner_id);
        let cfg = settings(false);
        let mut next_id = 1;

        let outcome = advance_cycle(&mut cycle, &mut wall, &mut grid, &cfg, 0.1, 0.1, &mut next_id);

        assert!(!cycle.alive);
        let elimination = outcome.eliminated.unwrap();
        assert_eq!(elimination.hit_type, HitType::Trail);
        assert_eq!(elimination.hit_player_id, Some(owner_id));
    }

    #[test]
    fn fresh_spawn_does_not_self_eliminate_on_its_own_starting_cell() {
        let id = PlayerId::new();
        let mut cycle = CycleState::spawn(id, Coord::new(0.0, 0.0), NORTH, 20.0, "red".into());
        let mut wall = PlayerWall::spawn(id, cycle.position);
        let mut grid = CollisionGrid::new(1.0);
        let cfg = settings(false);
        let mut next_id = 1;

        let outcome = advance_cycle(&mut cycle, &mut wall, &mut grid, &cfg, 0.05, 0.05, &mut next_id);

        assert!(cycle.alive);
        assert!(outcome.eliminated.is_none());
    }
}
