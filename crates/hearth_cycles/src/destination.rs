//! `Destination`: the only thing transmitted for a turn (spec §3,
//! glossary). Positions between destinations are recomputed
//! deterministically by replaying direction/speed, never retransmitted.

use hearth_core::PlayerId;
use serde::{Deserialize, Serialize};

use crate::geometry::{Coord, Direction};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub position: Coord,
    pub direction: Direction,
    pub distance: f64,
    pub game_time: f64,
    pub message_id: u64,
    pub player_id: PlayerId,
}

impl Destination {
    /// Sort/ordering key from spec §3: "destinations per cycle are
    /// strictly ordered by (distance, gameTime, messageId)".
    fn order_key(&self) -> (OrderedF64, OrderedF64, u64) {
        (OrderedF64(self.distance), OrderedF64(self.game_time), self.message_id)
    }
}

/// Thin wrapper giving `f64` a total order for sorting purposes. Distances
/// and game-time values in this domain are always finite, so `NaN` never
/// needs to be handled specially here.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
struct OrderedF64(f64);

impl Eq for OrderedF64 {}
impl Ord for OrderedF64 {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(std::cmp::Ordering::Equal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Already present by `(messageId, playerId)` — a no-op replay
    /// (spec §8, idempotence law).
    Duplicate,
    /// Newly inserted. `is_latest` is true if this destination is now the
    /// tail of the sorted list, meaning the cycle's live heading/wall
    /// should snap to it (spec §4.H, "On inbound remote Destination").
    Inserted { is_latest: bool },
}

/// Inserts `dest` into `destinations`, which must already be sorted by
/// [`Destination::order_key`], maintaining that order and rejecting
/// `(messageId, playerId)` duplicates (spec §8 invariant 8).
pub fn insert_sorted(destinations: &mut Vec<Destination>, dest: Destination) -> InsertOutcome {
    if destinations
        .iter()
        .any(|d| d.message_id == dest.message_id && d.player_id == dest.player_id)
    {
        return InsertOutcome::Duplicate;
    }

    let key = dest.order_key();
    let pos = destinations.partition_point(|d| d.order_key() <= key);
    destinations.insert(pos, dest);
    let is_latest = pos == destinations.len() - 1;
    InsertOutcome::Inserted { is_latest }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::NORTH;

    fn dest(distance: f64, game_time: f64, message_id: u64, player: PlayerId) -> Destination {
        Destination {
            position: Coord::ZERO,
            direction: NORTH,
            distance,
            game_time,
            message_id,
            player_id: player,
        }
    }

    #[test]
    fn maintains_sorted_order_by_distance_then_time_then_id() {
        let player = PlayerId::new();
        let mut list = Vec::new();
        insert_sorted(&mut list, dest(10.0, 1.0, 2, player));
        insert_sorted(&mut list, dest(5.0, 1.0, 1, player));
        insert_sorted(&mut list, dest(10.0, 0.5, 3, player));

        let distances: Vec<f64> = list.iter().map(|d| d.distance).collect();
        assert_eq!(distances, vec![5.0, 10.0, 10.0]);
    }

    #[test]
    fn duplicate_message_id_and_player_is_a_no_op() {
        let player = PlayerId::new();
        let mut list = Vec::new();
        insert_sorted(&mut list, dest(5.0, 1.0, 1, player));
        let outcome = insert_sorted(&mut list, dest(5.0, 1.0, 1, player));
        assert_eq!(outcome, InsertOutcome::Duplicate);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn same_message_id_from_a_different_player_is_not_a_duplicate() {
        let a = PlayerId::new();
        let b = PlayerId::new();
        let mut list = Vec::new();
        insert_sorted(&mut list, dest(5.0, 1.0, 1, a));
        let outcome = insert_sorted(&mut list, dest(5.0, 1.0, 1, b));
        assert!(matches!(outcome, InsertOutcome::Inserted { .. }));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn reports_whether_the_insertion_landed_at_the_tail() {
        let player = PlayerId::new();
        let mut list = Vec::new();
        let first = insert_sorted(&mut list, dest(10.0, 1.0, 1, player));
        assert_eq!(first, InsertOutcome::Inserted { is_latest: true });

        let earlier = insert_sorted(&mut list, dest(5.0, 1.0, 2, player));
        assert_eq!(earlier, InsertOutcome::Inserted { is_latest: false });
    }
}
