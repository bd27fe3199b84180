//! Spatial hash grid for broad-phase collision detection
//!
//! Divides the world into cells and stores bodies in each cell.
//! Pair queries only look at a cell and its forward neighbours, so every
//! candidate pair is produced once.

use hashbrown::HashMap;

use crate::game::physics::BodyHandle;
use crate::util::vec2::Vec2;

/// Default cell size in world units
/// Should be ~2x the largest body radius
pub const CELL_SIZE: f32 = 64.0;

const CELL_INITIAL_CAPACITY: usize = 8;

/// Forward neighbours checked per cell (right, bottom-left, bottom, bottom-right)
const FORWARD_NEIGHBOURS: [(i32, i32); 4] = [(1, 0), (-1, 1), (0, 1), (1, 1)];

pub type CellKey = (i32, i32);

#[derive(Debug, Clone, Copy)]
pub struct SpatialEntry {
    pub handle: BodyHandle,
    pub position: Vec2,
    pub radius: f32,
}

#[derive(Debug)]
pub struct SpatialGrid {
    inv_cell_size: f32,
    cells: HashMap<CellKey, Vec<SpatialEntry>>,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::new(),
        }
    }

    /// Empty every cell, keeping allocations for the next rebuild
    pub fn clear(&mut self) {
        for cell in self.cells.values_mut() {
            cell.clear();
        }
    }

    #[inline]
    fn position_to_cell(&self, position: Vec2) -> CellKey {
        (
            (position.x * self.inv_cell_size).floor() as i32,
            (position.y * self.inv_cell_size).floor() as i32,
        )
    }

    #[inline]
    pub fn insert(&mut self, entry: SpatialEntry) {
        let key = self.position_to_cell(entry.position);
        self.cells
            .entry(key)
            .or_insert_with(|| Vec::with_capacity(CELL_INITIAL_CAPACITY))
            .push(entry);
    }

    /// Visit each candidate pair once
    pub fn for_each_potential_pair<F>(&self, mut callback: F)
    where
        F: FnMut(&SpatialEntry, &SpatialEntry),
    {
        for (&(cx, cy), entries) in &self.cells {
            for i in 0..entries.len() {
                for j in (i + 1)..entries.len() {
                    callback(&entries[i], &entries[j]);
                }
            }

            for (dx, dy) in FORWARD_NEIGHBOURS {
                if let Some(neighbour) = self.cells.get(&(cx + dx, cy + dy)) {
                    for entry in entries {
                        for other in neighbour {
                            callback(entry, other);
                        }
                    }
                }
            }
        }
    }

    /// Entries in the 3x3 block of cells around `position`
    pub fn query_nearby(&self, position: Vec2) -> impl Iterator<Item = &SpatialEntry> {
        let (cx, cy) = self.position_to_cell(position);
        (-1..=1).flat_map(move |dx| {
            (-1..=1).flat_map(move |dy| {
                self.cells
                    .get(&(cx + dx, cy + dy))
                    .into_iter()
                    .flat_map(|cell| cell.iter())
            })
        })
    }

    /// Number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.cells.values().filter(|cell| !cell.is_empty()).count()
    }
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(CELL_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn entry(x: f32, y: f32) -> SpatialEntry {
        SpatialEntry {
            handle: BodyHandle::Ship(Uuid::new_v4()),
            position: Vec2::new(x, y),
            radius: 10.0,
        }
    }

    #[test]
    fn test_pairs_within_and_across_cells() {
        let mut grid = SpatialGrid::default();
        grid.insert(entry(10.0, 10.0));
        grid.insert(entry(20.0, 20.0));
        grid.insert(entry(70.0, 10.0));
        grid.insert(entry(1000.0, 1000.0));

        let mut count = 0;
        grid.for_each_potential_pair(|_, _| count += 1);
        // Three bodies in adjacent cells form three pairs; the far one none
        assert_eq!(count, 3);
    }

    #[test]
    fn test_bottom_left_neighbour_is_paired() {
        let mut grid = SpatialGrid::default();
        grid.insert(entry(70.0, 10.0));
        grid.insert(entry(60.0, 70.0));

        let mut count = 0;
        grid.for_each_potential_pair(|_, _| count += 1);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_clear_and_query() {
        let mut grid = SpatialGrid::default();
        grid.insert(entry(10.0, 10.0));
        assert_eq!(grid.query_nearby(Vec2::new(60.0, 60.0)).count(), 1);

        grid.clear();
        assert_eq!(grid.cell_count(), 0);
        assert_eq!(grid.query_nearby(Vec2::new(10.0, 10.0)).count(), 0);
    }
}
