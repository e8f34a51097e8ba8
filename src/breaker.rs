use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::error::ConfigError;
use crate::util::epoch_ms;

/// Sliding-window error-rate trip. Once open it stays open until an
/// explicit `reset`; the open transition is observed at most once per
/// continuous open period.
#[derive(Debug)]
pub struct CircuitBreaker {
    window: Mutex<VecDeque<bool>>,
    capacity: usize,
    threshold: f64,
    open: AtomicBool,
    // 0 = never opened.
    opened_at_ms: AtomicU64,
}

impl CircuitBreaker {
    /// # Errors
    ///
    /// Returns an error if `threshold` leaves `[0, 1]` or `window_size`
    /// is zero.
    pub fn new(threshold: f64, window_size: usize) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::BreakerThresholdOutOfRange);
        }
        if window_size < 1 {
            return Err(ConfigError::BreakerWindowZero);
        }
        Ok(Self {
            window: Mutex::new(VecDeque::with_capacity(window_size)),
            capacity: window_size,
            threshold,
            open: AtomicBool::new(false),
            opened_at_ms: AtomicU64::new(0),
        })
    }

    /// Record one outcome (`true` = success). Evaluates the trip only
    /// once the window is full.
    pub fn record_result(&self, success: bool) {
        let Ok(mut window) = self.window.lock() else {
            return;
        };
        if window.len() >= self.capacity {
            window.pop_front();
        }
        window.push_back(success);

        if window.len() < self.capacity {
            return;
        }
        let failures = window.iter().filter(|&&outcome| !outcome).count();
        let rate = fraction(failures, self.capacity);
        if rate > self.threshold
            && self
                .open
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            self.opened_at_ms.store(epoch_ms().max(1), Ordering::Release);
            tracing::warn!(
                "Circuit breaker opened: error rate {:.3} exceeded threshold {:.3} over the last {} requests.",
                rate,
                self.threshold,
                self.capacity
            );
        }
    }

    /// Lock-free gate consulted before every submission and at worker
    /// entry.
    #[must_use]
    pub fn allow_request(&self) -> bool {
        !self.open.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Epoch millis of the open transition, if it ever happened.
    #[must_use]
    pub fn opened_at_ms(&self) -> Option<u64> {
        match self.opened_at_ms.load(Ordering::Acquire) {
            0 => None,
            stamp => Some(stamp),
        }
    }

    /// Failure fraction over the current window; 0 when empty.
    #[must_use]
    pub fn current_error_rate(&self) -> f64 {
        let Ok(window) = self.window.lock() else {
            return 0.0;
        };
        if window.is_empty() {
            return 0.0;
        }
        let failures = window.iter().filter(|&&outcome| !outcome).count();
        fraction(failures, window.len())
    }

    /// Clear the window and close the breaker.
    pub fn reset(&self) {
        if let Ok(mut window) = self.window.lock() {
            window.clear();
        }
        self.open.store(false, Ordering::Release);
    }
}

fn fraction(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    let numerator = u32::try_from(numerator).unwrap_or(u32::MAX);
    let denominator = u32::try_from(denominator).unwrap_or(u32::MAX);
    f64::from(numerator) / f64::from(denominator)
}
