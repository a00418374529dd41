//! Real-time run without any display.
//!
//! A tokio interval paces `Scheduler::tick` at the configured rate; progress
//! goes to the log. Ctrl+C stops the run after the current frame.

use anyhow::{Context, Result};
use std::cell::{Ref, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::drive_world;
use crate::game::{SimContext, World, WorldConfig};
use crate::metrics::RunMetrics;
use crate::schedule::Scheduler;

pub struct HeadlessMode {
    world: Rc<RefCell<World>>,
    metrics: Rc<RefCell<RunMetrics>>,
    scheduler: Scheduler,
    report_interval: Duration,
}

impl HeadlessMode {
    pub fn new(config: WorldConfig, max_ticks: Option<u64>) -> Result<Self> {
        let ctx = SimContext::new(config.seed);
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
            max_ticks,
        );

        Ok(Self {
            world,
            metrics,
            scheduler,
            report_interval: Duration::from_secs(5),
        })
    }

    /// How often progress is logged
    pub fn with_report_interval(mut self, report_interval: Duration) -> Self {
        self.report_interval = report_interval;
        self
    }

    pub async fn run(&mut self) -> Result<()> {
        self.scheduler.start();

        let mut tick_timer = interval(self.scheduler.tick_duration());
        tick_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut report_timer = interval(self.report_interval);
        // The first interval tick completes immediately
        report_timer.tick().await;

        loop {
            tokio::select! {
                _ = tick_timer.tick() => {
                    self.scheduler.tick();
                }

                _ = report_timer.tick() => {
                    self.log_progress();
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("interrupt received, stopping");
                    self.scheduler.stop();
                }
            }

            for event in self.scheduler.drain_events() {
                debug!(?event, "scheduler event");
            }

            if self.scheduler.is_stopped() {
                break;
            }
        }

        self.log_final();
        Ok(())
    }

    pub fn metrics(&self) -> Ref<'_, RunMetrics> {
        self.metrics.borrow()
    }

    pub fn world(&self) -> Ref<'_, World> {
        self.world.borrow()
    }

    fn log_progress(&self) {
        let mut metrics = self.metrics.borrow_mut();
        metrics.update();
        let world = self.world.borrow();
        info!(
            elapsed = %metrics.format_time(),
            tick = metrics.ticks,
            alive = metrics.alive,
            dying = world.dying_count(),
            food = world.grid().food_count(),
            food_eaten = metrics.food_eaten,
            deaths = metrics.deaths,
            fps = self.scheduler.average_fps(60),
            "progress"
        );
    }

    fn log_final(&self) {
        let mut metrics = self.metrics.borrow_mut();
        metrics.update();
        let summary = self.scheduler.performance_summary();
        info!(
            elapsed = %metrics.format_time(),
            ticks = metrics.ticks,
            survivors = metrics.alive,
            peak_alive = metrics.peak_alive,
            food_eaten = metrics.food_eaten,
            deaths = metrics.deaths,
            average_fps = summary.average_fps,
            "run finished"
        );
        info!("{}", self.scheduler.profiler().format_summary());
    }
}
