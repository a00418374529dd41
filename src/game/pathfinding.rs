//! Grid A* with a fixed expansion budget.
//!
//! Moves are 4-connected with unit cost and the heuristic is Manhattan
//! distance. Among frontier nodes with equal `f`, the one closer to the goal
//! wins, then the one pushed first; neighbours are expanded North, East,
//! South, West. Identical inputs therefore always produce identical paths.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::action::Direction;
use super::grid::SpatialGrid;
use super::state::Position;

/// Default cap on node expansions per search
pub const DEFAULT_SEARCH_BUDGET: usize = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathStats {
    /// Every `find_path` call
    pub searches: u64,
    /// Food searches that produced a path of at least one step
    pub paths_computed: u64,
    pub total_path_length: u64,
    /// Searches that ended with no path (bad endpoints or exhausted frontier)
    pub unreachable: u64,
    /// Searches cut off by the expansion budget
    pub budget_exhausted: u64,
}

impl PathStats {
    pub fn average_path_length(&self) -> f64 {
        if self.paths_computed == 0 {
            0.0
        } else {
            self.total_path_length as f64 / self.paths_computed as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Frontier {
    f: u32,
    h: u32,
    seq: u32,
    index: usize,
}

impl Ord for Frontier {
    // BinaryHeap is a max-heap; reverse so the smallest key pops first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.h.cmp(&self.h))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Per-cell search bookkeeping reused across calls.
///
/// A cell's `g`/`parent` entries are only meaningful when its `seen` stamp
/// equals the current search generation, so nothing has to be cleared between
/// searches.
#[derive(Debug, Default)]
struct SearchScratch {
    generation: u32,
    seen: Vec<u32>,
    closed: Vec<u32>,
    g: Vec<u32>,
    parent: Vec<usize>,
    open: BinaryHeap<Frontier>,
}

impl SearchScratch {
    fn begin(&mut self, cells: usize) {
        if self.seen.len() != cells {
            self.seen = vec![0; cells];
            self.closed = vec![0; cells];
            self.g = vec![0; cells];
            self.parent = vec![0; cells];
            self.generation = 0;
        }

        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            self.seen.fill(0);
            self.closed.fill(0);
            self.generation = 1;
        }
        self.open.clear();
    }

    fn is_seen(&self, index: usize) -> bool {
        self.seen[index] == self.generation
    }

    fn is_closed(&self, index: usize) -> bool {
        self.closed[index] == self.generation
    }
}

#[derive(Debug)]
pub struct Pathfinder {
    search_budget: usize,
    scratch: SearchScratch,
    stats: PathStats,
}

impl Default for Pathfinder {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_BUDGET)
    }
}

impl Pathfinder {
    pub fn new(search_budget: usize) -> Self {
        Self {
            search_budget: search_budget.max(1),
            scratch: SearchScratch::default(),
            stats: PathStats::default(),
        }
    }

    pub fn search_budget(&self) -> usize {
        self.search_budget
    }

    pub fn stats(&self) -> PathStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = PathStats::default();
    }

    /// Shortest 4-connected path from `start` to `goal`, both inclusive.
    ///
    /// The start cell may be occupied (it is usually a snake's own head);
    /// every other cell on the path is walkable. Returns an empty path when
    /// either endpoint is out of bounds, the goal holds a snake, no route
    /// exists, or the expansion budget runs out.
    pub fn find_path(
        &mut self,
        grid: &SpatialGrid,
        start: Position,
        goal: Position,
    ) -> Vec<Position> {
        self.stats.searches += 1;

        if !grid.in_bounds(start) || !grid.in_bounds(goal) || grid.has_agent(goal) {
            self.stats.unreachable += 1;
            return Vec::new();
        }

        if start == goal {
            return vec![start];
        }

        match self.search(grid, start, goal) {
            SearchResult::Found(path) => path,
            SearchResult::Unreachable => {
                self.stats.unreachable += 1;
                Vec::new()
            }
            SearchResult::BudgetExhausted => {
                self.stats.budget_exhausted += 1;
                Vec::new()
            }
        }
    }

    /// Path to the Manhattan-nearest food; ties go to the earliest entry in
    /// `food`. Empty when there is no food or the nearest item is unreachable.
    pub fn find_path_to_food(
        &mut self,
        grid: &SpatialGrid,
        start: Position,
        food: &[Position],
    ) -> Vec<Position> {
        let Some(&nearest) = food.iter().min_by_key(|pos| start.manhattan(**pos)) else {
            return Vec::new();
        };

        let path = self.find_path(grid, start, nearest);
        if path.len() > 1 {
            self.stats.paths_computed += 1;
            self.stats.total_path_length += path.len() as u64;
        }
        path
    }

    fn search(&mut self, grid: &SpatialGrid, start: Position, goal: Position) -> SearchResult {
        let scratch = &mut self.scratch;
        scratch.begin(grid.total_cells());

        let start_idx = grid.index(start);
        let goal_idx = grid.index(goal);
        let mut seq = 0u32;

        scratch.seen[start_idx] = scratch.generation;
        scratch.g[start_idx] = 0;
        scratch.parent[start_idx] = start_idx;
        let h = start.manhattan(goal);
        scratch.open.push(Frontier {
            f: h,
            h,
            seq,
            index: start_idx,
        });

        let mut expansions = 0usize;
        while let Some(node) = scratch.open.pop() {
            if scratch.is_closed(node.index) {
                continue;
            }

            if node.index == goal_idx {
                return SearchResult::Found(Self::reconstruct(grid, scratch, start_idx, goal_idx));
            }

            if expansions >= self.search_budget {
                return SearchResult::BudgetExhausted;
            }
            expansions += 1;
            scratch.closed[node.index] = scratch.generation;

            let current = grid.position_of(node.index);
            let tentative = scratch.g[node.index] + 1;

            for direction in Direction::ALL {
                let next = current.moved_in_direction(direction);
                if !grid.is_walkable(next) {
                    continue;
                }

                let next_idx = grid.index(next);
                if scratch.is_closed(next_idx) {
                    continue;
                }

                if !scratch.is_seen(next_idx) || tentative < scratch.g[next_idx] {
                    scratch.seen[next_idx] = scratch.generation;
                    scratch.g[next_idx] = tentative;
                    scratch.parent[next_idx] = node.index;

                    seq += 1;
                    let h = next.manhattan(goal);
                    scratch.open.push(Frontier {
                        f: tentative + h,
                        h,
                        seq,
                        index: next_idx,
                    });
                }
            }
        }

        SearchResult::Unreachable
    }

    fn reconstruct(
        grid: &SpatialGrid,
        scratch: &SearchScratch,
        start_idx: usize,
        goal_idx: usize,
    ) -> Vec<Position> {
        let mut path = vec![grid.position_of(goal_idx)];
        let mut idx = goal_idx;
        while idx != start_idx {
            idx = scratch.parent[idx];
            path.push(grid.position_of(idx));
        }
        path.reverse();
        path
    }
}

enum SearchResult {
    Found(Vec<Position>),
    Unreachable,
    BudgetExhausted,
}
