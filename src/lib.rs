//! Snake Swarm - a deterministic grid simulation of many snake agents
//!
//! This library provides:
//! - The simulation core (game module): grid, food, pathfinding, snakes, world
//! - A fixed-timestep scheduler with a pluggable clock (schedule module)
//! - Span profiling and run counters (metrics module)
//! - Headless and benchmark runners (modes module)

pub mod game;
pub mod metrics;
pub mod modes;
pub mod schedule;

pub use game::{ConfigError, SimContext, World, WorldConfig};
pub use schedule::{Scheduler, SchedulerConfig};
