pub mod profiler;
pub mod run_metrics;

pub use profiler::{format_duration, Profiler, ProfilerSummary, Span, SpanStats, SpanSummary};
pub use run_metrics::RunMetrics;
