//! Coarse change tracking over fixed-size square tiles of the grid.
//!
//! The tracker is a passive ledger: mutation sites mark tiles dirty, policy
//! code decides what a dirty tile means for any cached path. Nothing here
//! touches the grid or invalidates paths on its own.

use std::collections::BTreeSet;

use super::config::ConfigError;
use super::state::Position;

/// Tile coordinate in tile units (not cells)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tile {
    pub row: usize,
    pub col: usize,
}

impl Tile {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorStats {
    pub total_tiles: usize,
    pub tiles_high: usize,
    pub tiles_wide: usize,
    pub tile_size: usize,
    pub dirty_tiles: usize,
    pub dirty_percentage: f64,
    /// Tiles that went from clean to dirty since the last reset
    pub dirty_events: u64,
    /// Tiles removed from the dirty set since the last reset
    pub clean_operations: u64,
}

#[derive(Debug, Clone)]
pub struct SectorTracker {
    grid_width: usize,
    grid_height: usize,
    tile_size: usize,
    tiles_wide: usize,
    tiles_high: usize,
    dirty: BTreeSet<Tile>,
    dirty_events: u64,
    clean_operations: u64,
}

impl SectorTracker {
    pub fn new(
        grid_width: usize,
        grid_height: usize,
        tile_size: usize,
    ) -> Result<Self, ConfigError> {
        if grid_width == 0 || grid_height == 0 {
            return Err(ConfigError::InvalidDimensions {
                width: grid_width,
                height: grid_height,
            });
        }
        if tile_size == 0 {
            return Err(ConfigError::ZeroTileSize);
        }

        Ok(Self {
            grid_width,
            grid_height,
            tile_size,
            tiles_wide: grid_width.div_ceil(tile_size),
            tiles_high: grid_height.div_ceil(tile_size),
            dirty: BTreeSet::new(),
            dirty_events: 0,
            clean_operations: 0,
        })
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    pub fn total_tiles(&self) -> usize {
        self.tiles_wide * self.tiles_high
    }

    /// Tile containing an in-bounds cell
    pub fn tile_of(&self, pos: Position) -> Tile {
        debug_assert!(pos.row >= 0 && pos.col >= 0, "position {pos} outside grid");
        Tile::new(
            pos.row as usize / self.tile_size,
            pos.col as usize / self.tile_size,
        )
    }

    fn insert(&mut self, tile: Tile) {
        if self.dirty.insert(tile) {
            self.dirty_events += 1;
        }
    }

    pub fn mark_dirty(&mut self, pos: Position) {
        let tile = self.tile_of(pos);
        self.insert(tile);
    }

    /// Mark every tile overlapping the inclusive cell rectangle
    pub fn mark_region_dirty(&mut self, min: Position, max: Position) {
        for tile in self.tiles_in_region(min, max) {
            self.insert(tile);
        }
    }

    pub fn is_dirty(&self, tile: Tile) -> bool {
        self.dirty.contains(&tile)
    }

    pub fn is_position_dirty(&self, pos: Position) -> bool {
        self.is_dirty(self.tile_of(pos))
    }

    pub fn clean_one(&mut self, tile: Tile) {
        if self.dirty.remove(&tile) {
            self.clean_operations += 1;
        }
    }

    pub fn clean_all(&mut self) {
        self.clean_operations += self.dirty.len() as u64;
        self.dirty.clear();
    }

    /// Dirty tiles in row-major order
    pub fn dirty_tiles(&self) -> Vec<Tile> {
        self.dirty.iter().copied().collect()
    }

    /// Tiles overlapping the bounding rectangle of the segment `a`-`b`
    pub fn tiles_along_segment(&self, a: Position, b: Position) -> Vec<Tile> {
        let min = Position::new(a.row.min(b.row), a.col.min(b.col));
        let max = Position::new(a.row.max(b.row), a.col.max(b.col));
        self.tiles_in_region(min, max)
    }

    /// True if any tile a path from `a` to `b` might cross is dirty
    pub fn should_recompute_path(&self, a: Position, b: Position) -> bool {
        self.tiles_along_segment(a, b)
            .into_iter()
            .any(|tile| self.is_dirty(tile))
    }

    /// Inclusive cell bounds `(min, max)` of a tile, clipped to the grid
    pub fn tile_bounds(&self, tile: Tile) -> (Position, Position) {
        let min_row = tile.row * self.tile_size;
        let min_col = tile.col * self.tile_size;
        let max_row = (min_row + self.tile_size - 1).min(self.grid_height - 1);
        let max_col = (min_col + self.tile_size - 1).min(self.grid_width - 1);
        (
            Position::new(min_row as i32, min_col as i32),
            Position::new(max_row as i32, max_col as i32),
        )
    }

    /// 8-connected neighbouring tiles that exist on this grid
    pub fn neighboring_tiles(&self, tile: Tile) -> Vec<Tile> {
        let mut neighbors = Vec::with_capacity(8);
        for dr in -1i64..=1 {
            for dc in -1i64..=1 {
                if dr == 0 && dc == 0 {
                    continue;
                }
                let row = tile.row as i64 + dr;
                let col = tile.col as i64 + dc;
                if row >= 0
                    && col >= 0
                    && (row as usize) < self.tiles_high
                    && (col as usize) < self.tiles_wide
                {
                    neighbors.push(Tile::new(row as usize, col as usize));
                }
            }
        }
        neighbors
    }

    pub fn stats(&self) -> SectorStats {
        let total = self.total_tiles();
        SectorStats {
            total_tiles: total,
            tiles_high: self.tiles_high,
            tiles_wide: self.tiles_wide,
            tile_size: self.tile_size,
            dirty_tiles: self.dirty.len(),
            dirty_percentage: self.dirty.len() as f64 / total.max(1) as f64 * 100.0,
            dirty_events: self.dirty_events,
            clean_operations: self.clean_operations,
        }
    }

    /// Restart the counters; tiles currently dirty count as fresh events
    pub fn reset_stats(&mut self) {
        self.dirty_events = self.dirty.len() as u64;
        self.clean_operations = 0;
    }

    fn tiles_in_region(&self, min: Position, max: Position) -> Vec<Tile> {
        let clamp_row = |row: i32| (row.max(0) as usize).min(self.grid_height - 1);
        let clamp_col = |col: i32| (col.max(0) as usize).min(self.grid_width - 1);

        let min_tile_row = clamp_row(min.row) / self.tile_size;
        let min_tile_col = clamp_col(min.col) / self.tile_size;
        let max_tile_row = clamp_row(max.row) / self.tile_size;
        let max_tile_col = clamp_col(max.col) / self.tile_size;

        let mut tiles = Vec::new();
        for row in min_tile_row..=max_tile_row {
            for col in min_tile_col..=max_tile_col {
                tiles.push(Tile::new(row, col));
            }
        }
        tiles
    }
}
