use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};

/// Floor for configured rates; a zero or negative target would starve
/// every waiter forever.
pub const MIN_TPS: f64 = 1e-6;

const REFILL_TICK: Duration = Duration::from_millis(50);

/// Pacing limiter with a live-updatable rate.
///
/// Permits drip into a semaphore from a background refill task; the
/// bucket never holds more than one second's worth, so bursts are capped
/// at the most recent second. Fractional and sub-Hz rates are carried as
/// a running remainder, so a 0.2 TPS regulator releases one permit every
/// five seconds rather than starving.
#[derive(Debug)]
pub struct RateRegulator {
    rate_bits: Arc<AtomicU64>,
    permits: Arc<Semaphore>,
    refill: JoinHandle<()>,
}

impl RateRegulator {
    #[must_use]
    pub fn new(initial_tps: f64) -> Self {
        let rate_bits = Arc::new(AtomicU64::new(clamp_rate(initial_tps).to_bits()));
        let permits = Arc::new(Semaphore::new(0));
        let refill = spawn_refill_task(Arc::clone(&rate_bits), Arc::clone(&permits));
        Self {
            rate_bits,
            permits,
            refill,
        }
    }

    /// Block until a permit is available and return the wait in seconds.
    pub async fn acquire(&self) -> f64 {
        let start = Instant::now();
        match self.permits.acquire().await {
            Ok(permit) => permit.forget(),
            Err(_) => return 0.0,
        }
        start.elapsed().as_secs_f64()
    }

    /// Effective for future refills immediately; in-flight waiters may
    /// observe either the old or the new rate.
    pub fn set_rate(&self, tps: f64) {
        self.rate_bits
            .store(clamp_rate(tps).to_bits(), Ordering::Release);
    }

    #[must_use]
    pub fn current_rate(&self) -> f64 {
        f64::from_bits(self.rate_bits.load(Ordering::Acquire))
    }
}

impl Drop for RateRegulator {
    fn drop(&mut self) {
        self.refill.abort();
    }
}

fn clamp_rate(tps: f64) -> f64 {
    if tps.is_finite() { tps.max(MIN_TPS) } else { MIN_TPS }
}

fn spawn_refill_task(rate_bits: Arc<AtomicU64>, permits: Arc<Semaphore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(REFILL_TICK);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut carry: f64 = 0.0;
        let mut last = Instant::now();
        loop {
            tick.tick().await;
            let now = Instant::now();
            let elapsed = now.duration_since(last).as_secs_f64();
            last = now;

            let rate = f64::from_bits(rate_bits.load(Ordering::Acquire));
            carry += rate * elapsed;
            let quota = carry.floor();
            carry -= quota;

            if quota < 1.0 {
                continue;
            }
            let quota = quota_to_permits(quota);
            // Cap the bucket at one second's worth of permits.
            let cap = quota_to_permits(rate.ceil()).max(1);
            let available = permits.available_permits();
            if available < cap {
                let to_add = quota.min(cap.saturating_sub(available));
                permits.add_permits(to_add);
            }
        }
    })
}

fn quota_to_permits(quota: f64) -> usize {
    if quota >= 1e18 {
        return usize::MAX;
    }
    if quota <= 0.0 {
        return 0;
    }
    quota as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::time::Duration;

    fn run_async_test<F>(future: F) -> Result<(), String>
    where
        F: Future<Output = Result<(), String>>,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| format!("Failed to build runtime: {}", err))?;
        runtime.block_on(future)
    }

    #[test]
    fn acquire_reports_wait_duration() -> Result<(), String> {
        run_async_test(async {
            let regulator = RateRegulator::new(20.0);
            let wait = regulator.acquire().await;
            assert!(wait >= 0.0);
            assert!(wait < 2.0, "waited {} s at 20 TPS", wait);
            Ok(())
        })
    }

    #[test]
    fn rate_floor_prevents_starvation() {
        let clamped = clamp_rate(0.0);
        assert!(clamped > 0.0);
        assert!(clamp_rate(f64::NAN) > 0.0);
        assert!(clamp_rate(-5.0) > 0.0);
    }

    #[test]
    fn set_rate_applies_to_future_refills() -> Result<(), String> {
        run_async_test(async {
            let regulator = RateRegulator::new(5.0);
            regulator.set_rate(500.0);
            assert!((regulator.current_rate() - 500.0).abs() < f64::EPSILON);

            let start = tokio::time::Instant::now();
            for _ in 0..20 {
                let _wait = regulator.acquire().await;
            }
            // 20 permits at 500 TPS arrive within the first refill
            // window or two; at the old 5 TPS this would take seconds.
            assert!(
                start.elapsed() < Duration::from_secs(2),
                "rate update was not picked up"
            );
            Ok(())
        })
    }

    #[test]
    fn sub_hz_rates_eventually_release() -> Result<(), String> {
        run_async_test(async {
            tokio::time::pause();
            let regulator = RateRegulator::new(0.5);
            let acquire = regulator.acquire();
            let wait =
                tokio::time::timeout(Duration::from_secs(10), acquire)
                    .await
                    .map_err(|_| "sub-Hz acquire starved".to_owned())?;
            assert!(wait >= 0.0);
            Ok(())
        })
    }

    #[test]
    fn concurrent_acquires_are_livelock_free() -> Result<(), String> {
        run_async_test(async {
            let regulator = std::sync::Arc::new(RateRegulator::new(1000.0));
            let mut handles = Vec::new();
            for _ in 0..8 {
                let regulator = std::sync::Arc::clone(&regulator);
                handles.push(tokio::spawn(async move {
                    for _ in 0..5 {
                        let _wait = regulator.acquire().await;
                    }
                }));
            }
            for handle in handles {
                tokio::time::timeout(Duration::from_secs(5), handle)
                    .await
                    .map_err(|_| "acquire livelocked".to_owned())?
                    .map_err(|err| format!("join failed: {}", err))?;
            }
            Ok(())
        })
    }
}
