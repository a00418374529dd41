//! Named-span timing for the per-tick phases
//!
//! Spans are explicit: `enter` hands back a [`Span`] token and `exit` records
//! the elapsed time under the span's name. Each name keeps running totals plus
//! a rolling window of recent samples for averages.

use std::cmp::Reverse;
use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

const DEFAULT_WINDOW: usize = 100;

/// Statistics for one span name
#[derive(Debug, Clone)]
pub struct SpanStats {
    count: u64,
    total_time: Duration,
    min_time: Duration,
    max_time: Duration,
    /// Most recent samples, oldest first
    recent_times: VecDeque<Duration>,
}

impl SpanStats {
    fn new(window_size: usize) -> Self {
        Self {
            count: 0,
            total_time: Duration::ZERO,
            min_time: Duration::MAX,
            max_time: Duration::ZERO,
            recent_times: VecDeque::with_capacity(window_size),
        }
    }

    fn record(&mut self, duration: Duration, window_size: usize) {
        self.count += 1;
        self.total_time += duration;
        self.min_time = self.min_time.min(duration);
        self.max_time = self.max_time.max(duration);

        if self.recent_times.len() >= window_size {
            self.recent_times.pop_front();
        }
        self.recent_times.push_back(duration);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn total_time(&self) -> Duration {
        self.total_time
    }

    /// Zero until the first sample
    pub fn min_time(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.min_time
        }
    }

    pub fn max_time(&self) -> Duration {
        self.max_time
    }

    /// Average over the rolling window
    pub fn avg_time(&self) -> Duration {
        if self.recent_times.is_empty() {
            Duration::ZERO
        } else {
            let sum: Duration = self.recent_times.iter().sum();
            sum / self.recent_times.len() as u32
        }
    }

    /// Average over every sample ever recorded
    pub fn overall_avg_time(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total_time.div_f64(self.count as f64)
        }
    }

    /// Operations per second at the rolling average
    pub fn throughput(&self) -> f64 {
        let avg = self.avg_time();
        if avg.is_zero() {
            0.0
        } else {
            1.0 / avg.as_secs_f64()
        }
    }
}

/// Token for an open span; pass it back to [`Profiler::exit`]
#[derive(Debug)]
#[must_use = "a span records nothing until it is passed to Profiler::exit"]
pub struct Span {
    name: &'static str,
    /// `None` when the profiler was disabled at `enter`
    start: Option<Instant>,
}

impl Span {
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// One row of a [`ProfilerSummary`]
#[derive(Debug, Clone, PartialEq)]
pub struct SpanSummary {
    pub name: &'static str,
    pub count: u64,
    pub total: Duration,
    pub average: Duration,
    pub min: Duration,
    pub max: Duration,
    /// Share of the summed total across all spans, 0..=100
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilerSummary {
    /// Sorted by total time, largest first
    pub spans: Vec<SpanSummary>,
    pub total: Duration,
}

impl ProfilerSummary {
    pub fn get(&self, name: &str) -> Option<&SpanSummary> {
        self.spans.iter().find(|span| span.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct Profiler {
    enabled: bool,
    window_size: usize,
    spans: BTreeMap<&'static str, SpanStats>,
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl Profiler {
    pub fn new(window_size: usize) -> Self {
        Self {
            enabled: true,
            window_size: window_size.max(1),
            spans: BTreeMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn enter(&self, name: &'static str) -> Span {
        Span {
            name,
            start: self.enabled.then(Instant::now),
        }
    }

    /// Close a span and record its elapsed time.
    ///
    /// Returns the elapsed time, or zero for a span opened while disabled.
    pub fn exit(&mut self, span: Span) -> Duration {
        let Some(start) = span.start else {
            return Duration::ZERO;
        };
        let elapsed = start.elapsed();
        self.record(span.name, elapsed);
        elapsed
    }

    /// Time a closure under `name`
    pub fn measure<T>(&mut self, name: &'static str, f: impl FnOnce() -> T) -> T {
        let span = self.enter(name);
        let result = f();
        self.exit(span);
        result
    }

    /// Record an externally measured duration
    pub fn record(&mut self, name: &'static str, duration: Duration) {
        if !self.enabled {
            return;
        }
        let window_size = self.window_size;
        self.spans
            .entry(name)
            .or_insert_with(|| SpanStats::new(window_size))
            .record(duration, window_size);
    }

    pub fn get(&self, name: &str) -> Option<&SpanStats> {
        self.spans.get(name)
    }

    pub fn span_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.spans.keys().copied()
    }

    pub fn summary(&self) -> ProfilerSummary {
        let total: Duration = self.spans.values().map(|s| s.total_time).sum();

        let mut spans: Vec<_> = self
            .spans
            .iter()
            .filter(|(_, stats)| stats.count > 0)
            .map(|(&name, stats)| SpanSummary {
                name,
                count: stats.count,
                total: stats.total_time,
                average: stats.overall_avg_time(),
                min: stats.min_time(),
                max: stats.max_time,
                percentage: if total.is_zero() {
                    0.0
                } else {
                    stats.total_time.as_secs_f64() / total.as_secs_f64() * 100.0
                },
            })
            .collect();
        spans.sort_by_key(|span| (Reverse(span.total), span.name));

        ProfilerSummary { spans, total }
    }

    /// Multi-line breakdown suitable for periodic logging
    ///
    /// ```text
    /// Profile (last 100):
    ///   snake_movement:   avg=  1.2ms  min=  0.9ms  max=  3.1ms  ( 48.2%)
    /// ```
    pub fn format_summary(&self) -> String {
        let summary = self.summary();
        if summary.spans.is_empty() {
            return String::from("Profile: no data collected yet");
        }

        let mut lines = vec![format!("Profile (last {}):", self.window_size)];
        for span in &summary.spans {
            let avg = self
                .spans
                .get(span.name)
                .map(SpanStats::avg_time)
                .unwrap_or_default();
            lines.push(format!(
                "  {:<18} avg={:>7}  min={:>7}  max={:>7}  ({:>5.1}%)",
                format!("{}:", span.name),
                format_duration(avg),
                format_duration(span.min),
                format_duration(span.max),
                span.percentage
            ));
        }
        lines.join("\n")
    }

    pub fn reset(&mut self) {
        self.spans.clear();
    }

    pub fn reset_span(&mut self, name: &str) {
        self.spans.remove(name);
    }
}

/// Compact duration, e.g. "850µs", "42.3ms", "1.20s"
pub fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();
    if micros < 1000 {
        format!("{}µs", micros)
    } else if micros < 1_000_000 {
        format!("{:.1}ms", micros as f64 / 1000.0)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}
