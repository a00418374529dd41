//! The simulation world: grid, food, snakes, and the per-tick update.

use rand::rngs::SmallRng;
use rand::Rng;
use std::rc::Rc;
use tracing::{debug, info, trace, warn};

use super::action::Direction;
use super::config::{ConfigError, WorldConfig};
use super::context::{RngStream, SimContext};
use super::food::{FoodSpawner, FoodStats};
use super::grid::{CellCounts, SpatialGrid};
use super::pathfinding::{PathStats, Pathfinder};
use super::policy::FoodSeeker;
use super::sector::SectorTracker;
use super::snake::{Collision, MoveOutcome, Snake, SnakeId, SnakeSnapshot};
use super::state::Position;
use crate::metrics::Profiler;
use crate::schedule::Clock;

/// Placement attempts allowed per requested snake in [`World::populate`]
const SPAWN_ATTEMPTS_PER_SNAKE: usize = 10;

/// What happened during one [`World::step`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub spawned_food: usize,
    pub food_eaten: usize,
    pub deaths: usize,
    pub evicted: usize,
    pub alive: usize,
    pub dying: usize,
    /// The roster is empty after populating or spawning, including a
    /// populate that placed no snakes
    pub extinct: bool,
}

/// Cumulative counters over the life of a world
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorldStats {
    pub snakes_spawned: u64,
    pub food_eaten: u64,
    pub boundary_deaths: u64,
    pub collision_deaths: u64,
    pub evicted: u64,
    pub longest_snake: usize,
}

impl WorldStats {
    pub fn deaths(&self) -> u64 {
        self.boundary_deaths + self.collision_deaths
    }
}

pub struct World {
    config: WorldConfig,
    grid: SpatialGrid,
    sectors: SectorTracker,
    food: FoodSpawner,
    pathfinder: Pathfinder,
    steering: FoodSeeker,
    spawn_rng: SmallRng,
    clock: Rc<dyn Clock>,
    snakes: Vec<Snake>,
    next_id: SnakeId,
    tick: u64,
    populated: bool,
    stats: WorldStats,
}

impl World {
    /// Build an empty world. Call [`World::populate`] or
    /// [`World::spawn_snake`] to add snakes.
    ///
    /// The context must carry the same seed as `config`.
    pub fn new(config: WorldConfig, ctx: &SimContext) -> Result<Self, ConfigError> {
        config.validate()?;
        if config.seed != ctx.seed() {
            return Err(ConfigError::SeedMismatch {
                config: config.seed,
                context: ctx.seed(),
            });
        }

        let grid = SpatialGrid::new(config.grid_width, config.grid_height)?;
        let sectors = SectorTracker::new(config.grid_width, config.grid_height, config.tile_size)?;

        info!(
            width = config.grid_width,
            height = config.grid_height,
            target_food = config.effective_target_food(),
            seed = ctx.seed(),
            "world created"
        );

        Ok(Self {
            food: FoodSpawner::new(config.food_settings(), ctx.rng(RngStream::Food))?,
            pathfinder: Pathfinder::new(config.path_search_budget),
            steering: FoodSeeker::new(ctx.rng(RngStream::Steering)),
            spawn_rng: ctx.rng(RngStream::Spawn),
            clock: ctx.clock(),
            config,
            grid,
            sectors,
            snakes: Vec::new(),
            next_id: 0,
            tick: 0,
            populated: false,
            stats: WorldStats::default(),
        })
    }

    /// Scatter `snake_count` snakes at random free positions, then lay the
    /// initial food. Returns the number of snakes placed.
    pub fn populate(&mut self) -> usize {
        let wanted = self.config.snake_count;
        let length = self.config.initial_snake_length;
        let max_attempts = wanted.saturating_mul(SPAWN_ATTEMPTS_PER_SNAKE);

        let mut spawned = 0;
        let mut attempts = 0;
        while spawned < wanted && attempts < max_attempts {
            attempts += 1;
            let head = Position::new(
                self.spawn_rng.gen_range(0..self.config.grid_height) as i32,
                self.spawn_rng.gen_range(0..self.config.grid_width) as i32,
            );
            let direction = Direction::ALL[self.spawn_rng.gen_range(0..Direction::ALL.len())];
            if self.spawn_snake(head, direction, length).is_some() {
                spawned += 1;
            }
        }

        if spawned < wanted {
            warn!(
                spawned,
                wanted,
                attempts,
                "could only spawn {spawned} of {wanted} snakes"
            );
        }

        let initial_food = self
            .config
            .effective_target_food()
            .min(self.grid.total_cells() / 8);
        let placed = self.food.spawn_batch(&mut self.grid, initial_food);
        for pos in self.food.last_placements() {
            self.sectors.mark_dirty(*pos);
        }

        self.populated = true;
        info!(snakes = spawned, food = placed, "world populated");
        spawned
    }

    /// Place a straight snake if every cell it needs is in bounds and empty
    pub fn spawn_snake(
        &mut self,
        head: Position,
        direction: Direction,
        length: usize,
    ) -> Option<SnakeId> {
        let fits = Snake::initial_body(head, direction, length)
            .all(|pos| self.grid.in_bounds(pos) && self.grid.is_empty(pos));
        if !fits {
            return None;
        }

        let id = self.next_id;
        self.next_id += 1;

        let snake = Snake::new(id, head, direction, length, self.config.death_dwell);
        snake.place(&mut self.grid);
        let (min, max) = snake.bounding_box();
        self.sectors.mark_region_dirty(min, max);
        self.food.invalidate_cache();

        self.stats.snakes_spawned += 1;
        self.stats.longest_snake = self.stats.longest_snake.max(snake.len());
        self.snakes.push(snake);

        trace!(id, %head, ?direction, "snake spawned");
        Some(id)
    }

    /// Put food on an empty in-bounds cell
    pub fn place_food(&mut self, pos: Position) -> bool {
        if !self.grid.in_bounds(pos) || !self.grid.is_empty(pos) {
            return false;
        }
        self.grid.set_food(pos);
        self.sectors.mark_dirty(pos);
        self.food.invalidate_cache();
        true
    }

    /// Advance the world by one fixed tick.
    pub fn step(&mut self, profiler: &mut Profiler) -> TickReport {
        self.tick += 1;
        let now = self.clock.now();
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        let span = profiler.enter("food_update");
        report.spawned_food = self.food.update(&mut self.grid);
        for pos in self.food.last_placements() {
            self.sectors.mark_dirty(*pos);
        }
        profiler.exit(span);

        let span = profiler.enter("ai_decisions");
        self.steer();
        profiler.exit(span);

        let span = profiler.enter("snake_movement");
        self.move_snakes(now, &mut report);
        profiler.exit(span);

        let span = profiler.enter("death_animations");
        let before = self.snakes.len();
        self.snakes.retain_mut(|snake| {
            let dead = snake.update_death_animation(now);
            if dead {
                trace!(id = snake.id(), "snake evicted");
            }
            !dead
        });
        report.evicted = before - self.snakes.len();
        self.stats.evicted += report.evicted as u64;
        profiler.exit(span);

        let interval = self.config.sector_clean_interval;
        if interval > 0 && self.tick.is_multiple_of(interval) {
            self.sectors.clean_all();
        }

        report.alive = self.alive_count();
        report.dying = self.dying_count();
        report.extinct = self.is_extinct();
        if report.extinct && report.evicted > 0 {
            info!(tick = self.tick, "all snakes have died");
        }
        report
    }

    fn steer(&mut self) {
        let food = self.grid.food_positions();
        for snake in self.snakes.iter_mut().filter(|s| s.state().is_active()) {
            let choice = self
                .steering
                .choose(snake, &self.grid, &mut self.pathfinder, &food);
            if let Some(direction) = choice {
                snake.set_direction(direction);
            }
        }
    }

    fn move_snakes(&mut self, now: std::time::Duration, report: &mut TickReport) {
        for snake in self.snakes.iter_mut() {
            if !snake.state().is_active() {
                continue;
            }

            let old_head = snake.head();
            let target = snake.next_head();

            // Only a move that cannot collide may consume food
            let ate = self.grid.is_walkable(target) && self.food.consume(&mut self.grid, target);

            match snake.advance(&mut self.grid, ate, now) {
                MoveOutcome::Moved { head, vacated, grew } => {
                    self.sectors.mark_dirty(head);
                    self.sectors.mark_dirty(old_head);
                    if let Some(tail) = vacated {
                        self.sectors.mark_dirty(tail);
                    }
                    if ate {
                        report.food_eaten += 1;
                        self.stats.food_eaten += 1;
                    }
                    if grew {
                        self.stats.longest_snake = self.stats.longest_snake.max(snake.len());
                    }
                }
                MoveOutcome::Died(collision) => {
                    // The body list outlives the grid cells it used to occupy
                    let (min, max) = snake.bounding_box();
                    self.sectors.mark_region_dirty(min, max);
                    report.deaths += 1;
                    match collision {
                        Collision::Boundary => self.stats.boundary_deaths += 1,
                        Collision::Occupied => self.stats.collision_deaths += 1,
                    }
                    debug!(
                        id = snake.id(),
                        ?collision,
                        length = snake.len(),
                        tick = self.tick,
                        "snake died"
                    );
                }
                MoveOutcome::Inactive => {}
            }
        }
        self.food.invalidate_cache();
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn cell_counts(&self) -> CellCounts {
        self.grid.count_by_type()
    }

    pub fn snakes(&self) -> &[Snake] {
        &self.snakes
    }

    pub fn snake(&self, id: SnakeId) -> Option<&Snake> {
        self.snakes.iter().find(|snake| snake.id() == id)
    }

    pub fn snapshots(&self) -> Vec<SnakeSnapshot> {
        self.snakes.iter().map(Snake::snapshot).collect()
    }

    pub fn food_positions(&self) -> Vec<Position> {
        self.grid.food_positions()
    }

    pub fn sectors(&self) -> &SectorTracker {
        &self.sectors
    }

    pub fn food_stats(&self) -> FoodStats {
        self.food.stats()
    }

    pub fn path_stats(&self) -> PathStats {
        self.pathfinder.stats()
    }

    pub fn stats(&self) -> WorldStats {
        self.stats
    }

    pub fn alive_count(&self) -> usize {
        self.snakes.iter().filter(|s| s.state().is_active()).count()
    }

    pub fn dying_count(&self) -> usize {
        self.snakes.iter().filter(|s| s.state().is_dying()).count()
    }

    /// The world has been populated or had a snake spawned, and the roster
    /// is now empty. A populate that placed nothing counts too.
    pub fn is_extinct(&self) -> bool {
        (self.populated || self.stats.snakes_spawned > 0) && self.snakes.is_empty()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::snake::SnakeState;
    use crate::schedule::ManualClock;
    use std::time::Duration;

    fn world(config: WorldConfig) -> (World, ManualClock) {
        let clock = ManualClock::new();
        let ctx = SimContext::with_clock(config.seed, Rc::new(clock.clone()));
        (World::new(config, &ctx).unwrap(), clock)
    }

    fn quiet_config() -> WorldConfig {
        WorldConfig {
            target_food: Some(0),
            snake_count: 0,
            ..WorldConfig::new(10, 10)
        }
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let config = WorldConfig {
            tick_rate: 0,
            ..WorldConfig::small()
        };
        let ctx = SimContext::new(1);
        assert_eq!(
            World::new(config, &ctx).err(),
            Some(ConfigError::InvalidTickRate(0))
        );
    }

    #[test]
    fn test_spawn_snake_checks_cells() {
        let (mut world, _) = world(quiet_config());

        let id = world.spawn_snake(Position::new(5, 2), Direction::East, 3);
        assert_eq!(id, Some(0));
        assert_eq!(world.cell_counts().head, 1);
        assert_eq!(world.cell_counts().body, 2);

        // Tail would fall off the grid
        assert_eq!(
            world.spawn_snake(Position::new(0, 1), Direction::East, 3),
            None
        );
        // Overlaps the first snake
        assert_eq!(
            world.spawn_snake(Position::new(6, 1), Direction::South, 3),
            None
        );
        assert_eq!(world.snakes().len(), 1);
    }

    #[test]
    fn test_straight_run_without_food() {
        let (mut world, _) = world(quiet_config());
        world.spawn_snake(Position::new(5, 2), Direction::East, 3);
        let mut profiler = Profiler::default();

        for _ in 0..5 {
            let report = world.step(&mut profiler);
            assert_eq!(report.alive, 1);
        }

        let snake = &world.snakes()[0];
        assert_eq!(snake.head(), Position::new(5, 7));
        assert_eq!(snake.len(), 3);
        assert_eq!(world.tick(), 5);
    }

    #[test]
    fn test_eating_through_step() {
        let (mut world, _) = world(quiet_config());
        world.spawn_snake(Position::new(5, 5), Direction::East, 3);
        assert!(world.place_food(Position::new(5, 6)));
        let mut profiler = Profiler::default();

        let report = world.step(&mut profiler);
        assert_eq!(report.food_eaten, 1);
        assert!(!world.grid().has_food(Position::new(5, 6)));
        assert_eq!(world.snakes()[0].len(), 4);

        world.step(&mut profiler);
        assert_eq!(world.snakes()[0].len(), 4);
        assert_eq!(world.stats().food_eaten, 1);
        assert_eq!(world.food_stats().total_consumed, 1);
    }

    #[test]
    fn test_dying_snake_evicted_after_dwell() {
        let config = WorldConfig {
            death_dwell: Duration::from_secs(5),
            ..quiet_config()
        };
        let (mut world, clock) = world(config);
        // Facing the wall with the only side exit taken by another snake
        let doomed = world.spawn_snake(Position::new(0, 0), Direction::North, 3);
        world.spawn_snake(Position::new(0, 2), Direction::East, 2);
        let mut profiler = Profiler::default();

        let report = world.step(&mut profiler);
        assert_eq!(report.deaths, 1);
        assert_eq!(report.dying, 1);
        assert_eq!(report.alive, 1);
        for row in 0..3 {
            assert!(!world.grid().has_agent(Position::new(row, 0)));
        }

        clock.advance(Duration::from_secs(4));
        assert_eq!(world.step(&mut profiler).evicted, 0);

        clock.advance(Duration::from_secs(1));
        let report = world.step(&mut profiler);
        assert_eq!(report.evicted, 1);
        assert!(!report.extinct);
        assert!(world.snake(doomed.unwrap()).is_none());
        assert_eq!(world.stats().boundary_deaths, 1);
    }

    #[test]
    fn test_extinction_after_last_eviction() {
        let config = WorldConfig {
            death_dwell: Duration::ZERO,
            target_food: Some(0),
            snake_count: 0,
            ..WorldConfig::new(3, 1)
        };
        let (mut world, _) = world(config);
        assert!(!world.is_extinct());
        world.spawn_snake(Position::new(0, 2), Direction::East, 3);
        let mut profiler = Profiler::default();

        let report = world.step(&mut profiler);
        assert_eq!(report.deaths, 1);
        assert_eq!(report.evicted, 1);
        assert!(report.extinct);
        assert_eq!(world.cell_counts().empty, 3);
    }

    #[test]
    fn test_empty_populate_is_extinct() {
        let config = WorldConfig {
            snake_count: 0,
            ..WorldConfig::new(8, 8)
        };
        let (mut world, _) = world(config);
        assert!(!world.is_extinct());

        assert_eq!(world.populate(), 0);
        assert!(world.is_extinct());
        let report = world.step(&mut Profiler::default());
        assert!(report.extinct);
        assert_eq!(report.alive, 0);
    }

    #[test]
    fn test_new_rejects_seed_mismatch() {
        let config = WorldConfig {
            seed: 42,
            ..WorldConfig::small()
        };
        let ctx = SimContext::new(1);
        assert_eq!(
            World::new(config, &ctx).err(),
            Some(ConfigError::SeedMismatch {
                config: 42,
                context: 1
            })
        );
    }

    #[test]
    fn test_populate_places_snakes_and_food() {
        let config = WorldConfig {
            snake_count: 5,
            ..WorldConfig::new(32, 32)
        };
        let (mut world, _) = world(config);

        assert_eq!(world.populate(), 5);
        let counts = world.cell_counts();
        assert_eq!(counts.head, 5);
        assert_eq!(counts.body, 10);
        assert_eq!(counts.food, 64);
        assert!(world
            .snakes()
            .iter()
            .all(|snake| snake.state() == SnakeState::Alive));
    }

    #[test]
    fn test_populate_shortfall_on_crowded_grid() {
        let config = WorldConfig {
            snake_count: 50,
            initial_snake_length: 3,
            target_food: Some(0),
            ..WorldConfig::new(4, 4)
        };
        let (mut world, _) = world(config);
        let spawned = world.populate();
        assert!(spawned < 50);
        assert_eq!(world.snakes().len(), spawned);
    }

    #[test]
    fn test_step_marks_sectors() {
        let config = WorldConfig {
            tile_size: 4,
            sector_clean_interval: 0,
            ..quiet_config()
        };
        let (mut world, _) = world(config);
        world.spawn_snake(Position::new(1, 2), Direction::East, 3);
        let mut profiler = Profiler::default();

        world.step(&mut profiler);
        // Head moved into column 3, still in tile (0, 0)
        assert!(world.sectors().is_position_dirty(Position::new(1, 3)));
        world.step(&mut profiler);
        assert!(world.sectors().is_position_dirty(Position::new(1, 4)));
    }

    #[test]
    fn test_sectors_cleaned_on_interval() {
        let config = WorldConfig {
            tile_size: 4,
            sector_clean_interval: 3,
            ..quiet_config()
        };
        let (mut world, _) = world(config);
        world.spawn_snake(Position::new(1, 2), Direction::East, 3);
        let mut profiler = Profiler::default();

        world.step(&mut profiler);
        world.step(&mut profiler);
        assert!(!world.sectors().dirty_tiles().is_empty());
        world.step(&mut profiler);
        assert!(world.sectors().dirty_tiles().is_empty());
        world.step(&mut profiler);
        assert!(world.sectors().is_position_dirty(Position::new(1, 6)));
    }

    #[test]
    fn test_step_profiles_each_phase() {
        let (mut world, _) = world(quiet_config());
        let mut profiler = Profiler::default();
        world.step(&mut profiler);

        for phase in [
            "food_update",
            "ai_decisions",
            "snake_movement",
            "death_animations",
        ] {
            assert_eq!(profiler.get(phase).map(|s| s.count()), Some(1), "{phase}");
        }
    }
}
