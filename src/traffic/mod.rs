mod pattern;

#[cfg(test)]
mod tests;

use std::time::Duration;

pub use pattern::load_pattern_points;

/// Target TPS as a pure function of elapsed time.
#[derive(Debug, Clone)]
pub enum TrafficProfile {
    Stable {
        target_tps: f64,
    },
    Ramp {
        start_tps: f64,
        target_tps: f64,
        ramp: Duration,
    },
    Spike {
        base_tps: f64,
        spike_tps: f64,
        start: Duration,
        duration: Duration,
    },
    /// Sorted `(elapsed_ms, tps)` points; clamped outside the range,
    /// linearly interpolated between flanking points.
    Custom {
        points: Vec<(u64, f64)>,
    },
}

impl TrafficProfile {
    /// Target TPS at `elapsed_ms` into a test of `total_ms`. Never
    /// negative.
    #[must_use]
    pub fn tps_at(&self, elapsed_ms: u64, _total_ms: u64) -> f64 {
        let tps = match *self {
            Self::Stable { target_tps } => target_tps,
            Self::Ramp {
                start_tps,
                target_tps,
                ramp,
            } => {
                let ramp_ms = u64::try_from(ramp.as_millis()).unwrap_or(u64::MAX);
                if elapsed_ms >= ramp_ms || ramp_ms == 0 {
                    target_tps
                } else {
                    let fraction = to_f64(elapsed_ms) / to_f64(ramp_ms);
                    start_tps + (target_tps - start_tps) * fraction
                }
            }
            Self::Spike {
                base_tps,
                spike_tps,
                start,
                duration,
            } => {
                let start_ms = u64::try_from(start.as_millis()).unwrap_or(u64::MAX);
                let end_ms =
                    start_ms.saturating_add(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX));
                if elapsed_ms >= start_ms && elapsed_ms < end_ms {
                    spike_tps
                } else {
                    base_tps
                }
            }
            Self::Custom { ref points } => interpolate(points, elapsed_ms),
        };
        tps.max(0.0)
    }

    /// Upper bound over the whole run; used only as a sizing hint.
    #[must_use]
    pub fn max_tps(&self) -> f64 {
        match *self {
            Self::Stable { target_tps } => target_tps,
            Self::Ramp {
                start_tps,
                target_tps,
                ..
            } => start_tps.max(target_tps),
            Self::Spike {
                base_tps,
                spike_tps,
                ..
            } => base_tps.max(spike_tps),
            Self::Custom { ref points } => points
                .iter()
                .map(|&(_, tps)| tps)
                .fold(0.0_f64, f64::max),
        }
    }
}

fn interpolate(points: &[(u64, f64)], elapsed_ms: u64) -> f64 {
    let Some(&(first_ms, first_tps)) = points.first() else {
        return 0.0;
    };
    if elapsed_ms <= first_ms {
        return first_tps;
    }
    let Some(&(last_ms, last_tps)) = points.last() else {
        return 0.0;
    };
    if elapsed_ms >= last_ms {
        return last_tps;
    }

    // partition_point yields the first index with t > elapsed; the pair
    // flanking elapsed is (idx - 1, idx).
    let idx = points.partition_point(|&(t, _)| t <= elapsed_ms);
    let (Some(&(lo_ms, lo_tps)), Some(&(hi_ms, hi_tps))) =
        (points.get(idx.saturating_sub(1)), points.get(idx))
    else {
        return last_tps;
    };
    if hi_ms == lo_ms {
        return hi_tps;
    }
    let span = to_f64(hi_ms.saturating_sub(lo_ms));
    let offset = to_f64(elapsed_ms.saturating_sub(lo_ms));
    lo_tps + (hi_tps - lo_tps) * (offset / span)
}

fn to_f64(value: u64) -> f64 {
    // Lossy above 2^53; elapsed-time millis stay far below that.
    value as f64
}
