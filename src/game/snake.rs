use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

use super::action::Direction;
use super::grid::SpatialGrid;
use super::state::Position;

/// Stable identifier of a snake within one world
pub type SnakeId = u32;

/// Lifecycle of a snake.
///
/// `Growing` only exists inside a single move; a snake is back to `Alive`
/// once the move that grew it completes. `Dying` remembers when the snake
/// died so the roster can evict it after the dwell time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SnakeState {
    Alive,
    Growing,
    Dying { since: Duration },
    Dead,
}

impl SnakeState {
    /// Alive or mid-growth; the only states that move
    pub fn is_active(&self) -> bool {
        matches!(self, SnakeState::Alive | SnakeState::Growing)
    }

    pub fn is_dying(&self) -> bool {
        matches!(self, SnakeState::Dying { .. })
    }

    pub fn is_dead(&self) -> bool {
        matches!(self, SnakeState::Dead)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SnakeState::Alive => "alive",
            SnakeState::Growing => "growing",
            SnakeState::Dying { .. } => "dying",
            SnakeState::Dead => "dead",
        }
    }

    fn collided(self, now: Duration) -> SnakeState {
        match self {
            SnakeState::Alive | SnakeState::Growing => SnakeState::Dying { since: now },
            other => other,
        }
    }

    fn grew(self) -> SnakeState {
        match self {
            SnakeState::Alive => SnakeState::Growing,
            other => other,
        }
    }

    fn settled(self) -> SnakeState {
        match self {
            SnakeState::Growing => SnakeState::Alive,
            other => other,
        }
    }

    fn expired(self, now: Duration, dwell: Duration) -> SnakeState {
        match self {
            SnakeState::Dying { since } if now.saturating_sub(since) >= dwell => SnakeState::Dead,
            other => other,
        }
    }
}

/// Why a move killed the snake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collision {
    /// Next head cell is off the grid
    Boundary,
    /// Next head cell holds a snake segment, possibly our own
    Occupied,
}

/// Result of [`Snake::advance`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved {
        head: Position,
        /// Tail cell released by this move; `None` when the snake grew
        vacated: Option<Position>,
        grew: bool,
    },
    Died(Collision),
    /// The snake was not alive, nothing happened
    Inactive,
}

impl MoveOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, MoveOutcome::Moved { .. })
    }
}

/// Read-only view of a snake for reporting layers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnakeSnapshot {
    pub id: SnakeId,
    pub state: SnakeState,
    pub direction: Direction,
    pub head: Position,
    pub length: usize,
    pub moves_made: u64,
    pub food_eaten: u64,
}

/// One snake: its body, heading, lifecycle and counters.
///
/// The grid remains the single source of truth for occupancy. The body is
/// kept only so the snake knows which cells to release.
#[derive(Debug, Clone)]
pub struct Snake {
    id: SnakeId,
    /// Body segments, with head at the front
    body: VecDeque<Position>,
    direction: Direction,
    state: SnakeState,
    growth_pending: u32,
    death_dwell: Duration,
    moves_made: u64,
    food_eaten: u64,
}

impl Snake {
    /// Create a straight snake whose body trails behind `head`, opposite its
    /// heading. Lengths below 2 are raised to 2. The grid is not touched; see
    /// [`Snake::place`].
    pub fn new(
        id: SnakeId,
        head: Position,
        direction: Direction,
        length: usize,
        death_dwell: Duration,
    ) -> Self {
        Self {
            id,
            body: Self::initial_body(head, direction, length).collect(),
            direction,
            state: SnakeState::Alive,
            growth_pending: 0,
            death_dwell,
            moves_made: 0,
            food_eaten: 0,
        }
    }

    /// Cells a new snake with these parameters would occupy, head first
    pub fn initial_body(
        head: Position,
        direction: Direction,
        length: usize,
    ) -> impl Iterator<Item = Position> {
        let back = direction.opposite();
        (0..length.max(2)).scan(head, move |pos, i| {
            if i > 0 {
                *pos = pos.moved_in_direction(back);
            }
            Some(*pos)
        })
    }

    /// Write this snake's segments to the grid.
    ///
    /// Every cell must be in bounds and free of other snakes.
    pub fn place(&self, grid: &mut SpatialGrid) {
        let mut segments = self.body.iter();
        if let Some(head) = segments.next() {
            grid.set_head(*head);
        }
        for segment in segments {
            grid.set_body(*segment);
        }
    }

    pub fn id(&self) -> SnakeId {
        self.id
    }

    pub fn state(&self) -> SnakeState {
        self.state
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn head(&self) -> Position {
        self.body[0]
    }

    pub fn tail(&self) -> Position {
        self.body[self.body.len() - 1]
    }

    pub fn body(&self) -> impl Iterator<Item = Position> + '_ {
        self.body.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Never true for a constructed snake; present for API symmetry
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn growth_pending(&self) -> u32 {
        self.growth_pending
    }

    pub fn moves_made(&self) -> u64 {
        self.moves_made
    }

    pub fn food_eaten(&self) -> u64 {
        self.food_eaten
    }

    pub fn next_head(&self) -> Position {
        self.head().moved_in_direction(self.direction)
    }

    /// Grant growth outside of eating; applied one segment per move
    pub fn queue_growth(&mut self, segments: u32) {
        self.growth_pending += segments;
    }

    /// False for a non-alive snake and for a 180-degree reversal
    pub fn can_turn(&self, direction: Direction) -> bool {
        self.state == SnakeState::Alive && !self.direction.is_opposite(direction)
    }

    /// Apply a heading change if [`Snake::can_turn`] allows it
    pub fn set_direction(&mut self, direction: Direction) -> bool {
        if !self.can_turn(direction) {
            return false;
        }
        self.direction = direction;
        true
    }

    /// Move one cell along the current heading.
    ///
    /// `ate_food` means the caller consumed food on the target cell. A grow
    /// keeps the tail; otherwise the tail is released. Moving off the grid or
    /// onto any snake segment kills the snake via [`Snake::die`].
    pub fn advance(
        &mut self,
        grid: &mut SpatialGrid,
        ate_food: bool,
        now: Duration,
    ) -> MoveOutcome {
        if !self.state.is_active() {
            return MoveOutcome::Inactive;
        }

        let new_head = self.next_head();
        if !grid.in_bounds(new_head) {
            self.die(grid, now);
            return MoveOutcome::Died(Collision::Boundary);
        }
        if grid.has_agent(new_head) {
            self.die(grid, now);
            return MoveOutcome::Died(Collision::Occupied);
        }

        if ate_food {
            self.food_eaten += 1;
            self.growth_pending += 1;
        }

        let grew = self.growth_pending > 0;
        let vacated = if grew {
            self.growth_pending -= 1;
            self.state = self.state.grew();
            None
        } else {
            let tail = self.body.pop_back();
            if let Some(tail) = tail {
                grid.clear_agent(tail);
            }
            tail
        };

        let old_head = self.head();
        grid.remove_head(old_head);
        grid.set_body(old_head);
        self.body.push_front(new_head);
        grid.set_head(new_head);

        self.moves_made += 1;
        self.state = self.state.settled();
        MoveOutcome::Moved {
            head: new_head,
            vacated,
            grew,
        }
    }

    /// Enter `Dying` and release every segment from the grid at once, so the
    /// corpse never blocks anyone during its dwell time.
    pub fn die(&mut self, grid: &mut SpatialGrid, now: Duration) {
        if !self.state.is_active() {
            return;
        }
        self.state = self.state.collided(now);
        for segment in &self.body {
            grid.clear_agent(*segment);
        }
    }

    /// Advance a dying snake to `Dead` once the dwell time has passed.
    ///
    /// Returns true exactly when the snake is dead and should be evicted.
    pub fn update_death_animation(&mut self, now: Duration) -> bool {
        self.state = self.state.expired(now, self.death_dwell);
        self.state.is_dead()
    }

    /// Inclusive `(min, max)` corners of the cells this snake covers
    pub fn bounding_box(&self) -> (Position, Position) {
        let head = self.head();
        self.body.iter().fold((head, head), |(min, max), pos| {
            (
                Position::new(min.row.min(pos.row), min.col.min(pos.col)),
                Position::new(max.row.max(pos.row), max.col.max(pos.col)),
            )
        })
    }

    pub fn snapshot(&self) -> SnakeSnapshot {
        SnakeSnapshot {
            id: self.id,
            state: self.state,
            direction: self.direction,
            head: self.head(),
            length: self.len(),
            moves_made: self.moves_made,
            food_eaten: self.food_eaten,
        }
    }
}
