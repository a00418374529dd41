use std::time::{Duration, Instant};

use crate::game::TickReport;

/// Run-level counters accumulated from each tick's report
pub struct RunMetrics {
    pub start_time: Instant,
    pub elapsed_time: Duration,
    pub ticks: u64,
    pub alive: usize,
    pub peak_alive: usize,
    pub food_eaten: u64,
    pub food_spawned: u64,
    pub deaths: u64,
    pub evicted: u64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            elapsed_time: Duration::ZERO,
            ticks: 0,
            alive: 0,
            peak_alive: 0,
            food_eaten: 0,
            food_spawned: 0,
            deaths: 0,
            evicted: 0,
        }
    }

    pub fn record(&mut self, report: &TickReport) {
        self.ticks = report.tick;
        self.alive = report.alive;
        self.peak_alive = self.peak_alive.max(report.alive);
        self.food_eaten += report.food_eaten as u64;
        self.food_spawned += report.spawned_food as u64;
        self.deaths += report.deaths as u64;
        self.evicted += report.evicted as u64;
    }

    /// Refresh the wall-clock elapsed time
    pub fn update(&mut self) {
        self.elapsed_time = self.start_time.elapsed();
    }

    pub fn ticks_per_second(&self) -> f64 {
        let secs = self.elapsed_time.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.ticks as f64 / secs
        }
    }

    pub fn format_time(&self) -> String {
        let total_secs = self.elapsed_time.as_secs();
        let minutes = total_secs / 60;
        let seconds = total_secs % 60;
        format!("{:02}:{:02}", minutes, seconds)
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}
