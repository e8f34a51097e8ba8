mod analyzer;
mod collector;
mod histogram;
mod resource;


use std::collections::BTreeMap;
use std::time::Duration;

pub use analyzer::{
    ErrorAnalyzer, ErrorReport, ExceptionSample, ExceptionSummary, ResponseErrorSample,
    StatusErrorSummary,
};
pub use collector::{CollectorHandle, spawn_metrics_collector};
pub use histogram::{LatencyHistogram, SnapshotHistogram};
pub use resource::{ResourceReport, ResourceSnapshot, spawn_resource_monitor};

/// Bounded ring of the most recent per-second TPS samples.
pub const MAX_TPS_SAMPLES: usize = 3600;

/// One terminal or lifecycle event per unit of work, sent from workers
/// to the collector task.
#[derive(Debug)]
pub enum MetricEvent {
    /// The unit reached the HTTP attempt; counts toward total requests.
    Started { id: u64 },
    Response {
        id: u64,
        status: u16,
        latency_ms: u64,
        bytes: u64,
        rate_wait_ms: u64,
        success: bool,
        error_body: Option<String>,
    },
    Timeout {
        id: u64,
        latency_ms: u64,
        rate_wait_ms: u64,
    },
    Transport {
        id: u64,
        kind: &'static str,
        message: String,
        rate_wait_ms: u64,
    },
    /// Breaker-open or synthesis failure; never reached an HTTP attempt.
    Skipped { id: u64, rate_wait_ms: u64 },
}

#[derive(Debug, Clone, Copy)]
pub struct TpsSample {
    pub timestamp_ms: u64,
    pub tps: u64,
}

/// Live view published by the collector once per second for progress
/// reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningStats {
    pub elapsed: Duration,
    pub current_tps: u64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
}

impl RunningStats {
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 1.0;
        }
        let success = self.successful_requests.min(self.total_requests);
        (success as f64) / (self.total_requests as f64)
    }
}

/// Percentile view over one accumulated histogram snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatencyStats {
    pub count: u64,
    pub min_ms: u64,
    pub max_ms: u64,
    pub mean_ms: f64,
    pub stdev_ms: f64,
    pub p50_ms: u64,
    pub p90_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
}

/// Immutable end-of-run aggregate, produced once by the collector.
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub duration: Duration,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub timeout_requests: u64,
    pub skipped_requests: u64,
    pub total_bytes: u64,
    pub status_codes: BTreeMap<u16, u64>,
    pub response_time: LatencyStats,
    pub rate_wait: LatencyStats,
    pub tps_samples: Vec<TpsSample>,
    pub max_tps: u64,
    pub errors: ErrorReport,
    /// Extra response-time percentiles requested via configuration,
    /// beyond the standard set.
    pub extra_percentiles: Vec<(f64, u64)>,
}

impl MetricsSummary {
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        (self.successful_requests as f64) / (self.total_requests as f64)
    }

    /// Requests per second over the whole run.
    #[must_use]
    pub fn average_tps(&self) -> f64 {
        let millis = self.duration.as_millis();
        if millis == 0 {
            return 0.0;
        }
        (self.total_requests as f64) * 1000.0 / (millis as f64)
    }
}
