//! The coarse collision grid: a `(gridX, gridZ) -> owner` map used to
//! detect trail collisions in O(path length) (spec §3, "CollisionGrid";
//! glossary, "Collision grid"). Grounded on the `gorc::spatial` idiom of a
//! coarse grid index, simplified here to a first-owner map rather than a
//! range-query structure since that's all the spec's collision rule needs.

use std::collections::HashMap;

use hearth_core::PlayerId;

use crate::geometry::Coord;

pub type Cell = (i32, i32);

#[derive(Debug, Default, Clone)]
pub struct CollisionGrid {
    cells: HashMap<Cell, PlayerId>,
    grid_size: f64,
}

impl CollisionGrid {
    pub fn new(grid_size: f64) -> Self {
        Self {
            cells: HashMap::new(),
            grid_size,
        }
    }

    pub fn cell_of(&self, pos: Coord) -> Cell {
        (
            (pos.x / self.grid_size).floor() as i32,
            (pos.z / self.grid_size).floor() as i32,
        )
    }

    pub fn world_of(&self, cell: Cell) -> Coord {
        Coord::new(
            (cell.0 as f64 + 0.5) * self.grid_size,
            (cell.1 as f64 + 0.5) * self.grid_size,
        )
    }

    pub fn owner(&self, cell: Cell) -> Option<PlayerId> {
        self.cells.get(&cell).copied()
    }

    /// Tags `cell` with `owner` unless it's already owned (spec §3
    /// invariant: "a cell's owner never changes once set").
    pub fn claim(&mut self, cell: Cell, owner: PlayerId) {
        self.cells.entry(cell).or_insert(owner);
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Integer Bresenham line from `start` to `end` inclusive of both
/// endpoints, in walk order (spec §4.H step 4, "rasterize the path...
/// using Bresenham's line algorithm").
pub fn bresenham_line(start: Cell, end: Cell) -> Vec<Cell> {
    let (mut x0, mut z0) = start;
    let (x1, z1) = end;
    let dx = (x1 - x0).abs();
    let dz = -(z1 - z0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sz = if z0 < z1 { 1 } else { -1 };
    let mut err = dx + dz;

    let mut path = Vec::new();
    loop {
        path.push((x0, z0));
        if x0 == x1 && z0 == z1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dz {
            err += dz;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            z0 += sz;
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_of_rounds_toward_negative_infinity() {
        let grid = CollisionGrid::new(1.0);
        assert_eq!(grid.cell_of(Coord::new(-0.5, -0.5)), (-1, -1));
        assert_eq!(grid.cell_of(Coord::new(0.5, 0.5)), (0, 0));
    }

    #[test]
    fn claim_is_first_owner_wins() {
        let mut grid = CollisionGrid::new(1.0);
        let p1 = PlayerId::new();
        let p2 = PlayerId::new();
        grid.claim((0, 0), p1);
        grid.claim((0, 0), p2);
        assert_eq!(grid.owner((0, 0)), Some(p1));
    }

    #[test]
    fn bresenham_includes_both_endpoints() {
        let path = bresenham_line((0, 0), (3, 0));
        assert_eq!(path.first(), Some(&(0, 0)));
        assert_eq!(path.last(), Some(&(3, 0)));
        assert_eq!(path.len(), 4);
    }

    #[test]
    fn bresenham_handles_diagonal_lines() {
        let path = bresenham_line((0, 0), (2, 2));
        assert_eq!(path.first(), Some(&(0, 0)));
        assert_eq!(path.last(), Some(&(2, 2)));
        // every step moves by exactly one cell in at least one axis
        for pair in path.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!((a.0 - b.0).abs() <= 1 && (a.1 - b.1).abs() <= 1);
        }
    }
}
