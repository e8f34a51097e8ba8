use hdrhistogram::Histogram;

use crate::error::MetricsError;

use super::LatencyStats;

/// Millisecond values above one hour are clamped; nothing a load test
/// records legitimately exceeds the per-request hard cap anyway.
const HIGHEST_TRACKABLE_MS: u64 = 3_600_000;
const SIGNIFICANT_DIGITS: u8 = 3;

#[derive(Debug)]
pub struct LatencyHistogram {
    hist: Histogram<u64>,
}

impl LatencyHistogram {
    /// # Errors
    ///
    /// Returns an error if the histogram cannot be created.
    pub fn new() -> Result<Self, MetricsError> {
        let hist = Histogram::<u64>::new_with_bounds(1, HIGHEST_TRACKABLE_MS, SIGNIFICANT_DIGITS)
            .map_err(|err| MetricsError::Histogram {
                context: "create",
                source: Box::new(err),
            })?;
        Ok(Self { hist })
    }

    /// Record a millisecond value; zero clamps to one, values above the
    /// trackable bound saturate.
    pub fn record(&mut self, value_ms: u64) {
        let value = value_ms.clamp(1, HIGHEST_TRACKABLE_MS);
        drop(self.hist.record(value));
    }

    /// Fold another histogram into this one.
    pub fn merge(&mut self, other: &Self) {
        drop(self.hist.add(&other.hist));
    }

    pub fn clear(&mut self) {
        self.hist.reset();
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.hist.len()
    }

    #[must_use]
    pub fn stats(&self) -> LatencyStats {
        if self.hist.is_empty() {
            return LatencyStats::default();
        }
        LatencyStats {
            count: self.hist.len(),
            min_ms: self.hist.min(),
            max_ms: self.hist.max(),
            mean_ms: self.hist.mean(),
            stdev_ms: self.hist.stdev(),
            p50_ms: self.hist.value_at_quantile(0.5),
            p90_ms: self.hist.value_at_quantile(0.9),
            p95_ms: self.hist.value_at_quantile(0.95),
            p99_ms: self.hist.value_at_quantile(0.99),
        }
    }

    #[must_use]
    pub fn value_at_percentile(&self, percentile: f64) -> u64 {
        if self.hist.is_empty() {
            return 0;
        }
        self.hist.value_at_quantile(percentile / 100.0)
    }
}

/// Recorder/snapshot pair: writers land in the interval histogram, and a
/// periodic fold moves the interval into the accumulated copy that all
/// percentile reads use. Values recorded before fold K are visible to
/// readers at or before fold K+1.
#[derive(Debug)]
pub struct SnapshotHistogram {
    interval: LatencyHistogram,
    accumulated: LatencyHistogram,
}

impl SnapshotHistogram {
    /// # Errors
    ///
    /// Returns an error if either underlying histogram cannot be
    /// created.
    pub fn new() -> Result<Self, MetricsError> {
        Ok(Self {
            interval: LatencyHistogram::new()?,
            accumulated: LatencyHistogram::new()?,
        })
    }

    pub fn record(&mut self, value_ms: u64) {
        self.interval.record(value_ms);
    }

    /// Move interval values into the accumulated snapshot.
    pub fn fold(&mut self) {
        if self.interval.count() == 0 {
            return;
        }
        self.accumulated.merge(&self.interval);
        self.interval.clear();
    }

    /// The read side; only folded values are visible.
    #[must_use]
    pub const fn snapshot(&self) -> &LatencyHistogram {
        &self.accumulated
    }

    pub fn reset(&mut self) {
        self.interval.clear();
        self.accumulated.clear();
    }
}
