use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::food::FoodSettings;
use crate::schedule::SchedulerConfig;

/// Errors raised when a configuration cannot produce a valid world.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("grid dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    #[error("tick rate must be positive, got {0}")]
    InvalidTickRate(u32),
    #[error("food target {target} exceeds the {cells} cells of the grid")]
    FoodTargetExceedsCells { target: usize, cells: usize },
    #[error("spawn rate must be in [0, 1], got {0}")]
    InvalidSpawnRate(f64),
    #[error("tile size must be at least 1")]
    ZeroTileSize,
    #[error("initial snake length must be at least 2, got {0}")]
    SnakeTooShort(usize),
    #[error("path search budget must be at least 1")]
    ZeroSearchBudget,
    #[error("max catch-up ticks must be at least 1")]
    ZeroCatchUp,
    #[error("stats history capacity must be at least 1")]
    ZeroHistory,
    #[error("config seed {config} does not match context seed {context}")]
    SeedMismatch { config: u64, context: u64 },
}

/// Flat configuration record for a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Width of the grid in cells
    pub grid_width: usize,
    /// Height of the grid in cells
    pub grid_height: usize,
    /// Fixed simulation ticks per second
    pub tick_rate: u32,
    /// Desired live food count; `None` means twice the larger grid dimension
    pub target_food: Option<usize>,
    /// Base per-tick probability of a spawn batch
    pub spawn_rate: f64,
    /// Upper bound on food placed in a single tick
    pub max_food_per_tick: usize,
    /// Seed for every random stream in the run
    pub seed: u64,
    /// Edge length of a sector tile
    pub tile_size: usize,
    /// Snakes placed by `World::populate`
    pub snake_count: usize,
    pub initial_snake_length: usize,
    /// How long a dead snake lingers in the roster before eviction
    pub death_dwell: Duration,
    /// Maximum A* expansions per search
    pub path_search_budget: usize,
    /// Cap on fixed updates run for a single real-time frame
    pub max_catch_up_ticks: u32,
    /// Frame statistics kept by the scheduler
    pub stats_history: usize,
    /// Ticks between full sector cleans; 0 disables cleaning
    pub sector_clean_interval: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            grid_width: 256,
            grid_height: 256,
            tick_rate: 60,
            target_food: None,
            spawn_rate: 0.1,
            max_food_per_tick: 50,
            seed: 42,
            tile_size: 16,
            snake_count: 100,
            initial_snake_length: 3,
            death_dwell: Duration::from_secs(5),
            path_search_budget: 1000,
            max_catch_up_ticks: 5,
            stats_history: 1000,
            sector_clean_interval: 60,
        }
    }
}

impl WorldConfig {
    /// Create a new configuration with custom grid size
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            grid_width: width,
            grid_height: height,
            ..Default::default()
        }
    }

    /// Create a small grid for testing
    pub fn small() -> Self {
        Self {
            snake_count: 4,
            ..Self::new(16, 16)
        }
    }

    /// Load a JSON configuration file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: WorldConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {:?}", path))?;
        Ok(config)
    }

    pub fn total_cells(&self) -> usize {
        self.grid_width * self.grid_height
    }

    /// Food target after applying the documented default
    pub fn effective_target_food(&self) -> usize {
        self.target_food
            .unwrap_or_else(|| 2 * self.grid_width.max(self.grid_height))
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.tick_rate.max(1)))
    }

    pub fn food_settings(&self) -> FoodSettings {
        FoodSettings {
            target_count: self.effective_target_food(),
            spawn_rate: self.spawn_rate,
            max_per_tick: self.max_food_per_tick,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick_rate: self.tick_rate,
            max_catch_up_ticks: self.max_catch_up_ticks,
            history_capacity: self.stats_history,
            ..SchedulerConfig::default()
        }
    }

    /// Check every field, failing on the first invalid one
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err(ConfigError::InvalidDimensions {
                width: self.grid_width,
                height: self.grid_height,
            });
        }

        if self.tick_rate == 0 {
            return Err(ConfigError::InvalidTickRate(self.tick_rate));
        }

        let target = self.effective_target_food();
        if target > self.total_cells() {
            return Err(ConfigError::FoodTargetExceedsCells {
                target,
                cells: self.total_cells(),
            });
        }

        if !(0.0..=1.0).contains(&self.spawn_rate) {
            return Err(ConfigError::InvalidSpawnRate(self.spawn_rate));
        }

        if self.tile_size == 0 {
            return Err(ConfigError::ZeroTileSize);
        }

        if self.initial_snake_length < 2 {
            return Err(ConfigError::SnakeTooShort(self.initial_snake_length));
        }

        if self.path_search_budget == 0 {
            return Err(ConfigError::ZeroSearchBudget);
        }

        if self.max_catch_up_ticks == 0 {
            return Err(ConfigError::ZeroCatchUp);
        }

        if self.stats_history == 0 {
            return Err(ConfigError::ZeroHistory);
        }

        Ok(())
    }
}
