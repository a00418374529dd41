//! Run a fixed number of ticks as fast as possible.
//!
//! Time is simulated: every frame feeds exactly one tick duration to the
//! scheduler and advances a manual clock by the same amount, so dying snakes
//! still age by simulation time.

use anyhow::{Context, Result};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::info;

use super::drive_world;
use crate::game::{SimContext, World, WorldConfig};
use crate::metrics::{format_duration, ProfilerSummary, RunMetrics};
use crate::schedule::{ManualClock, Scheduler};

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkReport {
    pub ticks: u64,
    pub wall_time: Duration,
    pub ticks_per_second: f64,
    pub snakes_spawned: u64,
    pub survivors: usize,
    pub peak_alive: usize,
    pub food_eaten: u64,
    pub deaths: u64,
    pub profile: ProfilerSummary,
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ticks in {} ({:.1} ticks/s)",
            self.ticks,
            format_duration(self.wall_time),
            self.ticks_per_second
        )?;
        writeln!(
            f,
            "snakes: {} spawned, {} surviving, peak {}",
            self.snakes_spawned, self.survivors, self.peak_alive
        )?;
        write!(
            f,
            "food eaten: {}, deaths: {}",
            self.food_eaten, self.deaths
        )?;
        for span in &self.profile.spans {
            write!(
                f,
                "\n  {:<18} avg={:>7}  ({:>5.1}%)",
                format!("{}:", span.name),
                format_duration(span.average),
                span.percentage
            )?;
        }
        Ok(())
    }
}

pub struct BenchmarkMode {
    world: Rc<RefCell<World>>,
    metrics: Rc<RefCell<RunMetrics>>,
    scheduler: Scheduler,
    clock: ManualClock,
    ticks: u64,
}

impl BenchmarkMode {
    pub fn new(config: WorldConfig, ticks: u64) -> Result<Self> {
        let clock = ManualClock::new();
        let ctx = SimContext::with_clock(config.seed, Rc::new(clock.clone()));
        let mut scheduler = Scheduler::new(config.scheduler_config(), ctx.clock())
            .context("Failed to create scheduler")?;

        let mut world = World::new(config, &ctx).context("Failed to create world")?;
        world.populate();

        let world = Rc::new(RefCell::new(world));
        let metrics = Rc::new(RefCell::new(RunMetrics::new()));
        drive_world(
            &mut scheduler,
            Rc::clone(&world),
            Rc::clone(&metrics),
            Some(ticks),
        );

        Ok(Self {
            world,
            metrics,
            scheduler,
            clock,
            ticks,
        })
    }

    pub fn run(&mut self) -> BenchmarkReport {
        info!(ticks = self.ticks, "benchmark started");
        let dt = self.scheduler.tick_duration();
        let started = Instant::now();

        self.scheduler.start();
        while !self.scheduler.is_stopped() && self.scheduler.tick_count() < self.ticks {
            self.clock.advance(dt);
            self.scheduler.tick_with_elapsed(dt);
        }
        self.scheduler.stop();
        let wall_time = started.elapsed();

        let metrics = self.metrics.borrow();
        let world = self.world.borrow();
        let ticks = world.tick();
        let report = BenchmarkReport {
            ticks,
            wall_time,
            ticks_per_second: if wall_time.is_zero() {
                0.0
            } else {
                ticks as f64 / wall_time.as_secs_f64()
            },
            snakes_spawned: world.stats().snakes_spawned,
            survivors: world.alive_count(),
            peak_alive: metrics.peak_alive,
            food_eaten: metrics.food_eaten,
            deaths: metrics.deaths,
            profile: self.scheduler.profiler().summary(),
        };
        info!(
            ticks = report.ticks,
            ticks_per_second = report.ticks_per_second,
            survivors = report.survivors,
            "benchmark finished"
        );
        report
    }
}
