//! `WallSegment` and `PlayerWall`: the straight-line trail geometry a
//! client renders between destinations (spec §3, glossary "Wall segment").

use hearth_core::PlayerId;
use serde::{Deserialize, Serialize};

use crate::geometry::Coord;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WallSegment {
    pub start: Coord,
    pub end: Coord,
    pub distance_start: f64,
    pub distance_end: f64,
    pub time_start: f64,
    pub time_end: f64,
    pub owner_id: PlayerId,
    pub is_dangerous: bool,
}

/// A cycle's trail: every closed segment plus one open "current" segment
/// whose end is extended every tick (spec §3).
#[derive(Debug, Clone)]
pub struct PlayerWall {
    pub completed: Vec<WallSegment>,
    pub current: WallSegment,
}

impl PlayerWall {
    /// Starts a fresh wall at the cycle's spawn point.
    pub fn spawn(owner_id: PlayerId, at: Coord) -> Self {
        Self {
            completed: Vec::new(),
            current: WallSegment {
                start: at,
                end: at,
                distance_start: 0.0,
                distance_end: 0.0,
                time_start: 0.0,
                time_end: 0.0,
                owner_id,
                is_dangerous: true,
            },
        }
    }

    /// Extends the open segment's end forward each tick (spec §4.H step 5).
    pub fn extend(&mut self, to: Coord, distance: f64, time: f64) {
        self.current.end = to;
        self.current.distance_end = distance;
        self.current.time_end = time;
    }

    /// Closes the open segment at `at` and opens a fresh one starting
    /// there, used on every turn and on a wrap-induced synthetic
    /// destination (spec §4.H, "Turn semantics" step 4 and "Arena bounds").
    pub fn break_at(&mut self, at: Coord, distance: f64, time: f64) {
        self.current.end = at;
        self.current.distance_end = distance;
        self.current.time_end = time;
        let owner_id = self.current.owner_id;
        self.completed.push(self.current.clone());
        self.current = WallSegment {
            start: at,
            end: at,
            distance_start: distance,
            distance_end: distance,
            time_start: time,
            time_end: time,
            owner_id,
            is_dangerous: true,
        };
    }

    pub fn reset(&mut self, owner_id: PlayerId, at: Coord) {
        self.completed.clear();
        self.current = WallSegment {
            start: at,
            end: at,
            distance_start: 0.0,
            distance_end: 0.0,
            time_start: 0.0,
            time_end: 0.0,
            owner_id,
            is_dangerous: true,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn break_at_closes_current_and_opens_a_new_segment_at_the_break_point() {
        let owner = PlayerId::new();
        let mut wall = PlayerWall::spawn(owner, Coord::new(0.0, 0.0));
        wall.extend(Coord::new(5.0, 0.0), 5.0, 1.0);
        wall.break_at(Coord::new(5.0, 0.0), 5.0, 1.0);

        assert_eq!(wall.completed.len(), 1);
        assert_eq!(wall.completed[0].end, Coord::new(5.0, 0.0));
        assert_eq!(wall.current.start, Coord::new(5.0, 0.0));
        assert_eq!(wall.current.end, Coord::new(5.0, 0.0));
    }
}
