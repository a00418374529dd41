//! Fixed-timestep driver.
//!
//! Real elapsed time is accumulated and drained in whole ticks of a fixed
//! duration, so the update callback always sees the same `dt` no matter how
//! irregular the frames are. A single frame never runs more than
//! `max_catch_up_ticks` updates: after a stall the surplus time is dropped
//! instead of being replayed in one burst.

use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::clock::Clock;
use crate::game::ConfigError;
use crate::metrics::{Profiler, ProfilerSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Initializing,
    Running,
    Paused,
    Stopped,
}

impl SchedulerState {
    pub fn name(&self) -> &'static str {
        match self {
            SchedulerState::Initializing => "initializing",
            SchedulerState::Running => "running",
            SchedulerState::Paused => "paused",
            SchedulerState::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `stop()` was called
    Requested,
    /// The update callback returned `ControlFlow::Break`
    UpdateFinished,
}

/// Lifecycle notifications, queued until [`Scheduler::drain_events`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    Started,
    Paused,
    Resumed,
    Stopped(StopReason),
    /// A frame's elapsed time exceeded the catch-up cap and was clamped
    FrameClamped { elapsed: Duration, limit: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Fixed updates per second
    pub tick_rate: u32,
    /// Most updates a single frame may run
    pub max_catch_up_ticks: u32,
    /// Frame statistics retained in the history
    pub history_capacity: usize,
    /// Frames averaged for the rolling FPS estimate
    pub fps_window: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            max_catch_up_ticks: 5,
            history_capacity: 1000,
            fps_window: 60,
        }
    }
}

impl SchedulerConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.tick_rate.max(1)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::InvalidTickRate(self.tick_rate));
        }
        if self.max_catch_up_ticks == 0 {
            return Err(ConfigError::ZeroCatchUp);
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroHistory);
        }
        Ok(())
    }
}

/// Handed to the update callback once per fixed tick
pub struct TickContext<'a> {
    /// Always the fixed tick duration
    pub dt: Duration,
    /// 1-based index of this update
    pub tick: u64,
    pub profiler: &'a mut Profiler,
}

/// Record of one `tick()` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub frame_number: u64,
    /// Elapsed time that fed this frame, before clamping
    pub total_time: Duration,
    pub update_time: Duration,
    pub render_time: Duration,
    pub updates_performed: u32,
    pub interpolation: f64,
    /// Rolling estimate over the last `fps_window` frames
    pub fps: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceSummary {
    pub frame_count: u64,
    pub tick_count: u64,
    pub total_time: Duration,
    pub average_fps: f64,
    pub current_fps: f64,
    pub target_tick_rate: u32,
    pub average_frame_time: Duration,
    pub average_update_time: Duration,
    pub average_render_time: Duration,
    pub profile: ProfilerSummary,
}

type UpdateCallback = Box<dyn FnMut(&mut TickContext<'_>) -> ControlFlow<()>>;
type RenderCallback = Box<dyn FnMut(f64)>;
type StatsCallback = Box<dyn FnMut(&FrameStats)>;

pub struct Scheduler {
    config: SchedulerConfig,
    tick_duration: Duration,
    clock: Rc<dyn Clock>,
    state: SchedulerState,
    last_time: Duration,
    accumulator: Duration,
    interpolation: f64,
    tick_count: u64,
    frame_count: u64,
    total_time: Duration,
    history: VecDeque<FrameStats>,
    profiler: Profiler,
    events: VecDeque<SchedulerEvent>,
    on_update: Option<UpdateCallback>,
    on_render: Option<RenderCallback>,
    on_stats: Option<StatsCallback>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, clock: Rc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            tick_duration: config.tick_duration(),
            last_time: clock.now(),
            history: VecDeque::with_capacity(config.history_capacity.min(4096)),
            config,
            clock,
            state: SchedulerState::Initializing,
            accumulator: Duration::ZERO,
            interpolation: 0.0,
            tick_count: 0,
            frame_count: 0,
            total_time: Duration::ZERO,
            profiler: Profiler::default(),
            events: VecDeque::new(),
            on_update: None,
            on_render: None,
            on_stats: None,
        })
    }

    /// Replace the update callback
    pub fn set_update_callback(
        &mut self,
        callback: impl FnMut(&mut TickContext<'_>) -> ControlFlow<()> + 'static,
    ) {
        self.on_update = Some(Box::new(callback));
    }

    /// Replace the render callback; it receives the interpolation factor
    pub fn set_render_callback(&mut self, callback: impl FnMut(f64) + 'static) {
        self.on_render = Some(Box::new(callback));
    }

    /// Replace the statistics callback, invoked after every frame
    pub fn set_stats_callback(&mut self, callback: impl FnMut(&FrameStats) + 'static) {
        self.on_stats = Some(Box::new(callback));
    }

    pub fn start(&mut self) -> bool {
        if self.state != SchedulerState::Initializing {
            return false;
        }
        self.state = SchedulerState::Running;
        self.last_time = self.clock.now();
        self.events.push_back(SchedulerEvent::Started);
        info!(
            tick_rate = self.config.tick_rate,
            max_catch_up = self.config.max_catch_up_ticks,
            "scheduler started"
        );
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.state != SchedulerState::Running {
            return false;
        }
        self.state = SchedulerState::Paused;
        self.events.push_back(SchedulerEvent::Paused);
        info!(tick = self.tick_count, "scheduler paused");
        true
    }

    /// Resume from pause; time spent paused is not replayed
    pub fn resume(&mut self) -> bool {
        if self.state != SchedulerState::Paused {
            return false;
        }
        self.state = SchedulerState::Running;
        self.last_time = self.clock.now();
        self.events.push_back(SchedulerEvent::Resumed);
        info!(tick = self.tick_count, "scheduler resumed");
        true
    }

    pub fn stop(&mut self) -> bool {
        self.stop_with(StopReason::Requested)
    }

    fn stop_with(&mut self, reason: StopReason) -> bool {
        if self.state == SchedulerState::Stopped {
            return false;
        }
        self.state = SchedulerState::Stopped;
        self.accumulator = Duration::ZERO;
        self.events.push_back(SchedulerEvent::Stopped(reason));
        info!(tick = self.tick_count, ?reason, "scheduler stopped");
        true
    }

    /// Run one frame using the clock's elapsed time since the previous frame.
    ///
    /// Returns false without doing anything unless the scheduler is running.
    pub fn tick(&mut self) -> bool {
        if self.state != SchedulerState::Running {
            return false;
        }
        let now = self.clock.now();
        let elapsed = now.saturating_sub(self.last_time);
        self.last_time = now;
        self.run_frame(elapsed);
        true
    }

    /// Run one frame with an explicit elapsed time instead of the clock's
    pub fn tick_with_elapsed(&mut self, elapsed: Duration) -> bool {
        if self.state != SchedulerState::Running {
            return false;
        }
        self.run_frame(elapsed);
        true
    }

    fn run_frame(&mut self, elapsed: Duration) {
        let limit = self.tick_duration * self.config.max_catch_up_ticks;
        if elapsed > limit {
            debug!(?elapsed, ?limit, "frame time clamped");
            self.events
                .push_back(SchedulerEvent::FrameClamped { elapsed, limit });
        }
        self.accumulator += elapsed.min(limit);

        let update_start = Instant::now();
        let mut updates = 0u32;
        while self.accumulator >= self.tick_duration
            && updates < self.config.max_catch_up_ticks
            && self.state == SchedulerState::Running
        {
            self.accumulator -= self.tick_duration;
            updates += 1;
            self.tick_count += 1;

            let flow = match self.on_update.as_mut() {
                Some(update) => update(&mut TickContext {
                    dt: self.tick_duration,
                    tick: self.tick_count,
                    profiler: &mut self.profiler,
                }),
                None => ControlFlow::Continue(()),
            };
            if flow.is_break() {
                self.stop_with(StopReason::UpdateFinished);
            }
        }
        let update_time = update_start.elapsed();

        self.interpolation = self.accumulator.as_secs_f64() / self.tick_duration.as_secs_f64();

        let render_start = Instant::now();
        if self.state == SchedulerState::Running {
            if let Some(render) = self.on_render.as_mut() {
                render(self.interpolation);
            }
        }
        let render_time = render_start.elapsed();

        self.frame_count += 1;
        self.total_time += elapsed;
        self.profiler.record("frame_update", update_time);

        let stats = FrameStats {
            frame_number: self.frame_count,
            total_time: elapsed,
            update_time,
            render_time,
            updates_performed: updates,
            interpolation: self.interpolation,
            fps: 0.0,
        };
        self.push_history(stats);
        let stats = FrameStats {
            fps: self.average_fps(self.config.fps_window),
            ..stats
        };
        if let Some(last) = self.history.back_mut() {
            *last = stats;
        }

        if let Some(on_stats) = self.on_stats.as_mut() {
            on_stats(&stats);
        }
    }

    fn push_history(&mut self, stats: FrameStats) {
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(stats);
    }

    /// Frames per second over the last `frames` recorded frames
    pub fn average_fps(&self, frames: usize) -> f64 {
        let window = frames.min(self.history.len());
        if window == 0 {
            return 0.0;
        }
        let total: Duration = self
            .history
            .iter()
            .rev()
            .take(window)
            .map(|frame| frame.total_time)
            .sum();
        if total.is_zero() {
            0.0
        } else {
            window as f64 / total.as_secs_f64()
        }
    }

    pub fn performance_summary(&self) -> PerformanceSummary {
        PerformanceSummary {
            frame_count: self.frame_count,
            tick_count: self.tick_count,
            total_time: self.total_time,
            average_fps: self.average_fps(self.history.len()),
            current_fps: self.history.back().map(|frame| frame.fps).unwrap_or(0.0),
            target_tick_rate: self.config.tick_rate,
            average_frame_time: self.average_of(|frame| frame.total_time),
            average_update_time: self.average_of(|frame| frame.update_time),
            average_render_time: self.average_of(|frame| frame.render_time),
            profile: self.profiler.summary(),
        }
    }

    fn average_of(&self, field: impl Fn(&FrameStats) -> Duration) -> Duration {
        if self.history.is_empty() {
            return Duration::ZERO;
        }
        self.history.iter().map(field).sum::<Duration>() / self.history.len() as u32
    }

    /// Take all queued lifecycle events, oldest first
    pub fn drain_events(&mut self) -> Vec<SchedulerEvent> {
        self.events.drain(..).collect()
    }

    /// Clear frame history and profiler data; tick and frame counters keep going
    pub fn reset_stats(&mut self) {
        self.history.clear();
        self.profiler.reset();
        self.total_time = Duration::ZERO;
    }

    pub fn history(&self) -> impl Iterator<Item = &FrameStats> + '_ {
        self.history.iter()
    }

    pub fn last_frame(&self) -> Option<&FrameStats> {
        self.history.back()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Running
    }

    pub fn is_stopped(&self) -> bool {
        self.state == SchedulerState::Stopped
    }

    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Fraction of a tick left in the accumulator, in `[0, 1)`
    pub fn interpolation(&self) -> f64 {
        self.interpolation
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    pub fn profiler_mut(&mut self) -> &mut Profiler {
        &mut self.profiler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ManualClock;
    use std::cell::{Cell, RefCell};

    const TICK: Duration = Duration::from_millis(10);

    fn scheduler() -> (Scheduler, ManualClock) {
        let clock = ManualClock::new();
        let config = SchedulerConfig {
            tick_rate: 100,
            max_catch_up_ticks: 5,
            history_capacity: 4,
            fps_window: 4,
        };
        (Scheduler::new(config, Rc::new(clock.clone())).unwrap(), clock)
    }

    fn counting(scheduler: &mut Scheduler) -> Rc<Cell<u64>> {
        let count = Rc::new(Cell::new(0));
        let seen = Rc::clone(&count);
        scheduler.set_update_callback(move |ctx| {
            assert_eq!(ctx.dt, TICK);
            seen.set(seen.get() + 1);
            ControlFlow::Continue(())
        });
        count
    }

    #[test]
    fn test_rejects_invalid_config() {
        let clock: Rc<dyn Clock> = Rc::new(ManualClock::new());
        let zero_rate = SchedulerConfig {
            tick_rate: 0,
            ..SchedulerConfig::default()
        };
        assert_eq!(
            Scheduler::new(zero_rate, Rc::clone(&clock)).err(),
            Some(ConfigError::InvalidTickRate(0))
        );

        let zero_cap = SchedulerConfig {
            max_catch_up_ticks: 0,
            ..SchedulerConfig::default()
        };
        assert_eq!(
            Scheduler::new(zero_cap, clock).err(),
            Some(ConfigError::ZeroCatchUp)
        );
    }

    #[test]
    fn test_lifecycle_transitions() {
        let (mut scheduler, _) = scheduler();
        assert_eq!(scheduler.state(), SchedulerState::Initializing);
        assert!(!scheduler.pause());
        assert!(!scheduler.resume());

        assert!(scheduler.start());
        assert!(!scheduler.start());
        assert!(!scheduler.resume());

        assert!(scheduler.pause());
        assert_eq!(scheduler.state(), SchedulerState::Paused);
        assert!(!scheduler.pause());
        assert!(scheduler.resume());

        assert!(scheduler.stop());
        assert!(!scheduler.stop());
        assert!(!scheduler.start());
        assert!(!scheduler.resume());
        assert_eq!(scheduler.state(), SchedulerState::Stopped);

        assert_eq!(
            scheduler.drain_events(),
            vec![
                SchedulerEvent::Started,
                SchedulerEvent::Paused,
                SchedulerEvent::Resumed,
                SchedulerEvent::Stopped(StopReason::Requested),
            ]
        );
        assert!(scheduler.drain_events().is_empty());
    }

    #[test]
    fn test_stop_from_initializing() {
        let (mut scheduler, _) = scheduler();
        assert!(scheduler.stop());
        assert!(!scheduler.tick());
    }

    #[test]
    fn test_fixed_updates_from_clock() {
        let (mut scheduler, clock) = scheduler();
        let count = counting(&mut scheduler);
        scheduler.start();

        clock.advance(Duration::from_millis(25));
        assert!(scheduler.tick());
        assert_eq!(count.get(), 2);
        assert!((scheduler.interpolation() - 0.5).abs() < 1e-9);

        clock.advance(Duration::from_millis(5));
        scheduler.tick();
        assert_eq!(count.get(), 3);
        assert!(scheduler.interpolation() < 1e-9);
    }

    #[test]
    fn test_not_running_does_nothing() {
        let (mut scheduler, clock) = scheduler();
        let count = counting(&mut scheduler);

        clock.advance(Duration::from_millis(50));
        assert!(!scheduler.tick());
        assert!(!scheduler.tick_with_elapsed(Duration::from_millis(50)));
        assert_eq!(count.get(), 0);
        assert_eq!(scheduler.frame_count(), 0);
    }

    #[test]
    fn test_pause_time_not_replayed() {
        let (mut scheduler, clock) = scheduler();
        let count = counting(&mut scheduler);
        scheduler.start();

        scheduler.pause();
        clock.advance(Duration::from_secs(10));
        assert!(!scheduler.tick());
        scheduler.resume();

        clock.advance(Duration::from_millis(10));
        scheduler.tick();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_catch_up_is_capped() {
        let (mut scheduler, _) = scheduler();
        let count = counting(&mut scheduler);
        scheduler.start();

        scheduler.tick_with_elapsed(Duration::from_secs(1));
        assert_eq!(count.get(), 5);
        assert!(scheduler.interpolation() < 1.0);

        let events = scheduler.drain_events();
        assert_eq!(
            events[1],
            SchedulerEvent::FrameClamped {
                elapsed: Duration::from_secs(1),
                limit: Duration::from_millis(50),
            }
        );

        // The stall is dropped, not spread over later frames
        scheduler.tick_with_elapsed(Duration::ZERO);
        assert_eq!(count.get(), 5);
    }

    #[test]
    fn test_break_stops_scheduler() {
        let (mut scheduler, _) = scheduler();
        let seen = Rc::new(Cell::new(0u64));
        let handle = Rc::clone(&seen);
        scheduler.set_update_callback(move |ctx| {
            handle.set(ctx.tick);
            if ctx.tick == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        scheduler.start();

        scheduler.tick_with_elapsed(Duration::from_millis(50));
        assert_eq!(seen.get(), 3);
        assert!(scheduler.is_stopped());
        assert!(scheduler
            .drain_events()
            .contains(&SchedulerEvent::Stopped(StopReason::UpdateFinished)));
    }

    #[test]
    fn test_last_registered_callback_wins() {
        let (mut scheduler, _) = scheduler();
        let first = counting(&mut scheduler);
        let second = counting(&mut scheduler);
        scheduler.start();

        scheduler.tick_with_elapsed(Duration::from_millis(20));
        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 2);
    }

    #[test]
    fn test_render_and_stats_callbacks() {
        let (mut scheduler, _) = scheduler();
        let renders = Rc::new(RefCell::new(Vec::new()));
        let frames = Rc::new(RefCell::new(Vec::new()));

        let r = Rc::clone(&renders);
        scheduler.set_render_callback(move |alpha| r.borrow_mut().push(alpha));
        let f = Rc::clone(&frames);
        scheduler.set_stats_callback(move |stats| f.borrow_mut().push(*stats));
        scheduler.start();

        scheduler.tick_with_elapsed(Duration::from_millis(15));
        scheduler.tick_with_elapsed(Duration::from_millis(5));

        assert_eq!(renders.borrow().len(), 2);
        assert!((renders.borrow()[0] - 0.5).abs() < 1e-9);

        let frames = frames.borrow();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].frame_number, 1);
        assert_eq!(frames[0].updates_performed, 1);
        assert_eq!(frames[1].updates_performed, 1);
        assert_eq!(frames[1].total_time, Duration::from_millis(5));
        // Two frames over 20ms
        assert!((frames[1].fps - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_history_is_bounded() {
        let (mut scheduler, _) = scheduler();
        scheduler.start();
        for _ in 0..10 {
            scheduler.tick_with_elapsed(TICK);
        }

        let history: Vec<_> = scheduler
            .history()
            .map(|frame| frame.frame_number)
            .collect();
        assert_eq!(history, vec![7, 8, 9, 10]);
        assert_eq!(scheduler.frame_count(), 10);
        assert!((scheduler.average_fps(4) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_performance_summary() {
        let (mut scheduler, _) = scheduler();
        scheduler.set_update_callback(|ctx| {
            ctx.profiler
                .record("world_step", Duration::from_micros(100));
            ControlFlow::Continue(())
        });
        scheduler.start();
        scheduler.tick_with_elapsed(Duration::from_millis(20));
        scheduler.tick_with_elapsed(Duration::from_millis(20));

        let summary = scheduler.performance_summary();
        assert_eq!(summary.frame_count, 2);
        assert_eq!(summary.tick_count, 4);
        assert_eq!(summary.target_tick_rate, 100);
        assert_eq!(summary.average_frame_time, Duration::from_millis(20));
        assert!((summary.average_fps - 50.0).abs() < 1e-6);
        assert_eq!(summary.profile.get("world_step").map(|s| s.count), Some(4));

        scheduler.reset_stats();
        assert_eq!(scheduler.history().count(), 0);
        assert_eq!(scheduler.tick_count(), 4);
    }
}
