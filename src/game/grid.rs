//! Bit-packed cell store shared by every component of the simulation.
//!
//! Each cell is a single byte of independent flags. Queries and mutations are
//! O(1) and perform no bounds enforcement beyond Rust's slice indexing: callers
//! validate coordinates with [`SpatialGrid::in_bounds`] first.

use super::action::Direction;
use super::config::ConfigError;
use super::state::Position;

/// Raw cell value with no flags set
pub const EMPTY: u8 = 0;
/// Cell holds a food item
pub const FOOD: u8 = 1 << 0;
/// Cell holds a snake body segment
pub const BODY: u8 = 1 << 1;
/// Cell holds a snake head
pub const HEAD: u8 = 1 << 2;
/// Any snake segment
pub const AGENT: u8 = BODY | HEAD;

/// Per-flag cell counts produced by a single pass over the grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellCounts {
    pub empty: usize,
    pub food: usize,
    pub body: usize,
    pub head: usize,
}

#[derive(Debug, Clone)]
pub struct SpatialGrid {
    width: usize,
    height: usize,
    cells: Vec<u8>,
    food_count: usize,
}

impl SpatialGrid {
    pub fn new(width: usize, height: usize) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidDimensions { width, height });
        }

        Ok(Self {
            width,
            height,
            cells: vec![EMPTY; width * height],
            food_count: 0,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn total_cells(&self) -> usize {
        self.cells.len()
    }

    /// Check if a position is within the grid bounds
    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.row >= 0
            && pos.col >= 0
            && (pos.row as usize) < self.height
            && (pos.col as usize) < self.width
    }

    #[inline]
    pub(crate) fn index(&self, pos: Position) -> usize {
        debug_assert!(self.in_bounds(pos), "position {pos} outside grid");
        pos.row as usize * self.width + pos.col as usize
    }

    #[inline]
    pub(crate) fn position_of(&self, index: usize) -> Position {
        Position::new((index / self.width) as i32, (index % self.width) as i32)
    }

    /// Raw flag byte of a cell
    pub fn cell(&self, pos: Position) -> u8 {
        self.cells[self.index(pos)]
    }

    pub fn is_empty(&self, pos: Position) -> bool {
        self.cell(pos) == EMPTY
    }

    pub fn has_food(&self, pos: Position) -> bool {
        self.cell(pos) & FOOD != 0
    }

    /// True if any snake segment occupies the cell
    pub fn has_agent(&self, pos: Position) -> bool {
        self.cell(pos) & AGENT != 0
    }

    pub fn has_head(&self, pos: Position) -> bool {
        self.cell(pos) & HEAD != 0
    }

    pub fn has_body(&self, pos: Position) -> bool {
        self.cell(pos) & BODY != 0
    }

    /// In bounds and not occupied by a snake. Food does not block.
    pub fn is_walkable(&self, pos: Position) -> bool {
        self.in_bounds(pos) && !self.has_agent(pos)
    }

    pub fn set_food(&mut self, pos: Position) {
        let idx = self.index(pos);
        if self.cells[idx] & FOOD == 0 {
            self.food_count += 1;
        }
        self.cells[idx] |= FOOD;
    }

    pub fn remove_food(&mut self, pos: Position) {
        let idx = self.index(pos);
        if self.cells[idx] & FOOD != 0 {
            self.food_count -= 1;
        }
        self.cells[idx] &= !FOOD;
    }

    /// Mark a snake head. Claiming a cell another segment already holds is a
    /// caller bug: occupancy must be checked before any placement.
    pub fn set_head(&mut self, pos: Position) {
        let idx = self.index(pos);
        debug_assert!(
            self.cells[idx] & AGENT == 0,
            "cell {pos} already claimed by a snake"
        );
        self.cells[idx] |= HEAD;
    }

    /// Mark a snake body segment. Same contract as [`SpatialGrid::set_head`].
    pub fn set_body(&mut self, pos: Position) {
        let idx = self.index(pos);
        debug_assert!(
            self.cells[idx] & AGENT == 0,
            "cell {pos} already claimed by a snake"
        );
        self.cells[idx] |= BODY;
    }

    pub fn remove_head(&mut self, pos: Position) {
        let idx = self.index(pos);
        self.cells[idx] &= !HEAD;
    }

    pub fn remove_body(&mut self, pos: Position) {
        let idx = self.index(pos);
        self.cells[idx] &= !BODY;
    }

    /// Drop every snake flag from a cell, leaving any food in place
    pub fn clear_agent(&mut self, pos: Position) {
        let idx = self.index(pos);
        self.cells[idx] &= !AGENT;
    }

    /// Clear all flags from a cell
    pub fn clear_cell(&mut self, pos: Position) {
        let idx = self.index(pos);
        if self.cells[idx] & FOOD != 0 {
            self.food_count -= 1;
        }
        self.cells[idx] = EMPTY;
    }

    /// Reset every cell to empty
    pub fn clear(&mut self) {
        self.cells.fill(EMPTY);
        self.food_count = 0;
    }

    /// Live food count, maintained by the food mutators
    pub fn food_count(&self) -> usize {
        self.food_count
    }

    /// All completely empty cells in row-major order. O(cells).
    pub fn empty_cells(&self) -> Vec<Position> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &cell)| cell == EMPTY)
            .map(|(idx, _)| self.position_of(idx))
            .collect()
    }

    /// All cells carrying food in row-major order. O(cells).
    pub fn food_positions(&self) -> Vec<Position> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &cell)| cell & FOOD != 0)
            .map(|(idx, _)| self.position_of(idx))
            .collect()
    }

    /// Count cells by flag in one pass. Flags are counted independently, so a
    /// cell with food under a head contributes to both `food` and `head`.
    pub fn count_by_type(&self) -> CellCounts {
        self.cells
            .iter()
            .fold(CellCounts::default(), |mut counts, &cell| {
                if cell == EMPTY {
                    counts.empty += 1;
                }
                if cell & FOOD != 0 {
                    counts.food += 1;
                }
                if cell & BODY != 0 {
                    counts.body += 1;
                }
                if cell & HEAD != 0 {
                    counts.head += 1;
                }
                counts
            })
    }

    /// In-bounds 4-neighbours in North, East, South, West order
    pub fn neighbors(&self, pos: Position) -> impl Iterator<Item = Position> + '_ {
        Direction::ALL
            .into_iter()
            .map(move |direction| pos.moved_in_direction(direction))
            .filter(move |next| self.in_bounds(*next))
    }
}
