//! Flat (x, z) geometry for the arena: positions, directions, and the 90°
//! turn algebra from spec §4.H ("Turn semantics").

use serde::{Deserialize, Serialize};

/// A point (or, when unit-length, a heading) on the arena's horizontal
/// plane. Positions and directions share this type, as spec §3 describes
/// `Coord(x, z)` for both.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub z: f64,
}

impl Coord {
    pub const ZERO: Coord = Coord { x: 0.0, z: 0.0 };

    pub fn new(x: f64, z: f64) -> Self {
        Self { x, z }
    }

    pub fn add_scaled(self, dir: Direction, amount: f64) -> Coord {
        Coord::new(self.x + dir.x * amount, self.z + dir.z * amount)
    }

    pub fn distance_to(self, other: Coord) -> f64 {
        ((self.x - other.x).powi(2) + (self.z - other.z).powi(2)).sqrt()
    }
}

/// A unit-length heading. Kept as the same representation as [`Coord`]
/// (spec §3, "Direction is a unit vector") rather than a separate newtype,
/// since every operation on it (rotation, scaling a position) is geometry,
/// not a distinct domain concept.
pub type Direction = Coord;

/// `+1` or `-1`: which way a turn rotates the cycle's heading (spec §3).
pub type TurnDir = i8;

pub const NORTH: Direction = Coord { x: 0.0, z: -1.0 };
pub const SOUTH: Direction = Coord { x: 0.0, z: 1.0 };
pub const EAST: Direction = Coord { x: 1.0, z: 0.0 };
pub const WEST: Direction = Coord { x: -1.0, z: 0.0 };

/// Rotates `dir` 90° according to `turn`: right turn `(x,z) -> (-z,x)`,
/// left turn `(x,z) -> (z,-x)`, both expressed as `(-z*t, x*t)` for
/// `t ∈ {-1,+1}` (spec §4.H, "Turn semantics" step 2).
pub fn rotate(dir: Direction, turn: TurnDir) -> Direction {
    let t = turn as f64;
    Coord::new(-dir.z * t, dir.x * t)
}

/// Maps a legacy absolute-direction string to a unit heading, or `None` if
/// it isn't one of the four cardinal directions the legacy client format
/// used (spec §6, "legacyDirection").
pub fn legacy_direction(name: &str) -> Option<Direction> {
    match name {
        "UP" => Some(NORTH),
        "DOWN" => Some(SOUTH),
        "LEFT" => Some(WEST),
        "RIGHT" => Some(EAST),
        _ => None,
    }
}

/// Resolves a legacy absolute-direction request to the `TurnDir` that
/// would produce it from `current`, per spec §9's open-question
/// resolution: if the requested direction equals the current heading or
/// its opposite, the turn has no effect and this returns `None`.
pub fn turn_dir_for_legacy(current: Direction, requested: Direction) -> Option<TurnDir> {
    if approx_eq(current, requested) || approx_eq(current, opposite(requested)) {
        return None;
    }
    if approx_eq(rotate(current, 1), requested) {
        Some(1)
    } else if approx_eq(rotate(current, -1), requested) {
        Some(-1)
    } else {
        None
    }
}

fn opposite(dir: Direction) -> Direction {
    Coord::new(-dir.x, -dir.z)
}

fn approx_eq(a: Coord, b: Coord) -> bool {
    (a.x - b.x).abs() < 1e-6 && (a.z - b.z).abs() < 1e-6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn right_turn_rotates_north_to_east() {
        assert_eq!(rotate(NORTH, 1), EAST);
    }

    #[test]
    fn left_turn_rotates_north_to_west() {
        assert_eq!(rotate(NORTH, -1), WEST);
    }

    #[test]
    fn four_right_turns_return_to_start() {
        let mut dir = NORTH;
        for _ in 0..4 {
            dir = rotate(dir, 1);
        }
        assert_eq!(dir, NORTH);
    }

    #[test]
    fn legacy_same_direction_is_a_no_op() {
        assert_eq!(turn_dir_for_legacy(NORTH, NORTH), None);
    }

    #[test]
    fn legacy_opposite_direction_is_a_no_op() {
        assert_eq!(turn_dir_for_legacy(NORTH, SOUTH), None);
    }

    #[test]
    fn legacy_perpendicular_direction_resolves_to_a_turn() {
        assert_eq!(turn_dir_for_legacy(NORTH, EAST), Some(1));
        assert_eq!(turn_dir_for_legacy(NORTH, WEST), Some(-1));
    }
}
