use chrono::{DateTime, Local};

use crate::metrics::{MetricsSummary, ResourceReport};

/// Immutable end-of-test snapshot handed to exporters and the console
/// summary. All numbers are final; nothing here mutates after assembly.
#[derive(Debug, Clone)]
pub struct TestReport {
    pub name: String,
    pub started_at: DateTime<Local>,
    pub ended_at: DateTime<Local>,
    pub metrics: MetricsSummary,
    pub resources: ResourceReport,
    pub breaker_opened_at_ms: Option<u64>,
    /// Primary CSV filename override from `metrics.outputFile`.
    pub output_file: Option<String>,
}

impl TestReport {
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        self.metrics.success_rate()
    }

    #[must_use]
    pub fn average_tps(&self) -> f64 {
        self.metrics.average_tps()
    }

    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.metrics.duration.as_millis()).unwrap_or(u64::MAX)
    }

    #[must_use]
    pub fn max_memory_mb(&self) -> f64 {
        (self.resources.max_rss_bytes as f64) / (1024.0 * 1024.0)
    }
}
