//! Simulation core: grid, food, pathfinding, snakes, and the world that ties
//! them together. Nothing in here performs I/O.

pub mod action;
pub mod config;
pub mod context;
pub mod food;
pub mod grid;
pub mod pathfinding;
pub mod policy;
pub mod sector;
pub mod snake;
pub mod state;
pub mod world;

pub use action::Direction;
pub use config::{ConfigError, WorldConfig};
pub use context::{RngStream, SimContext};
pub use food::{FoodSettings, FoodSpawner, FoodStats};
pub use grid::{CellCounts, SpatialGrid};
pub use pathfinding::{PathStats, Pathfinder};
pub use policy::FoodSeeker;
pub use sector::{SectorStats, SectorTracker, Tile};
pub use snake::{Collision, MoveOutcome, Snake, SnakeId, SnakeSnapshot, SnakeState};
pub use state::Position;
pub use world::{TickReport, World, WorldStats};
