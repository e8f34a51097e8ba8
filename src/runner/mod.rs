mod report;
mod worker;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Local;
use tokio::sync::Semaphore;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, sleep};
use tracing::{info, warn};

use crate::breaker::CircuitBreaker;
use crate::config::TestSpec;
use crate::error::{AppError, AppResult, ConfigError};
use crate::http::{RateRegulator, build_client};
use crate::metrics::{RunningStats, spawn_metrics_collector, spawn_resource_monitor};
use crate::request::RequestGenerator;
use crate::shutdown::ShutdownSender;
use crate::traffic::TrafficProfile;
use crate::validate::ResponseValidator;

pub use report::TestReport;

use worker::{WorkerContext, run_unit};

/// Grace period for in-flight workers after the deadline.
const POOL_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
/// Pause between submissions; real pacing comes from the rate regulator.
const SUBMISSION_PAUSE: Duration = Duration::from_millis(1);
/// Progress records are emitted every this many rate-update ticks.
const PROGRESS_EVERY_TICKS: u32 = 10;

/// Owns one test run end to end: schedulers, the dispatcher, the worker
/// pool, and result assembly. Single-use; a second `execute` fails.
pub struct ExecutionController {
    spec: Arc<TestSpec>,
    shutdown_tx: ShutdownSender,
    executed: AtomicBool,
    validator: Option<ResponseValidator>,
}

impl ExecutionController {
    #[must_use]
    pub fn new(spec: TestSpec, shutdown_tx: ShutdownSender) -> Self {
        Self {
            spec: Arc::new(spec),
            shutdown_tx,
            executed: AtomicBool::new(false),
            validator: None,
        }
    }

    /// Attach an optional response validator before `execute`.
    #[must_use]
    pub fn with_validator(mut self, validator: ResponseValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Request an early stop from any task. Idempotent; in-flight
    /// workers are abandoned to their timeouts and partial metrics
    /// remain valid.
    pub fn stop(&self) {
        drop(self.shutdown_tx.send(()));
    }

    /// Run the test to completion and assemble the final report.
    ///
    /// # Errors
    ///
    /// Returns an error on re-execution, on wiring failures (client or
    /// collector construction), or if the metrics task is lost.
    pub async fn execute(&self) -> AppResult<TestReport> {
        if self
            .executed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AppError::AlreadyExecuted);
        }

        let spec = Arc::clone(&self.spec);
        let started_at = Local::now();
        let run_start = Instant::now();
        let total_ms = u64::try_from(spec.duration.as_millis()).unwrap_or(u64::MAX);

        info!(
            "Starting test '{}': duration {:?}, max target {:.1} TPS.",
            spec.name,
            spec.duration,
            spec.profile.max_tps()
        );

        let client = build_client(spec.request_timeout).map_err(AppError::http)?;

        let collector = spawn_metrics_collector(
            &self.shutdown_tx,
            run_start,
            spec.metrics.percentiles.clone(),
        )
        .map_err(AppError::metrics)?;

        let resource_task = spawn_resource_monitor(
            &self.shutdown_tx,
            spec.metrics.sample_interval,
            spec.metrics.resource_monitoring,
        );

        let regulator = Arc::new(RateRegulator::new(spec.profile.tps_at(0, total_ms)));
        let rate_task = spawn_rate_scheduler(
            &self.shutdown_tx,
            Arc::clone(&regulator),
            spec.profile.clone(),
            run_start,
            total_ms,
            collector.stats_rx.clone(),
        );

        let breaker = match spec.breaker.as_ref() {
            Some(settings) => Some(Arc::new(
                CircuitBreaker::new(settings.error_threshold, settings.window_size)
                    .map_err(AppError::config)?,
            )),
            None => None,
        };

        let generator = Arc::new(
            RequestGenerator::new(
                spec.templates.clone(),
                spec.sources.clone(),
                spec.base_url.clone(),
            )
            .map_err(|_| AppError::config(ConfigError::NoRequestTemplates))?,
        );

        let context = Arc::new(WorkerContext {
            client,
            regulator,
            breaker: breaker.clone(),
            generator,
            validator: self.validator.clone(),
            events_tx: collector.events_tx.clone(),
            request_timeout: spec.request_timeout,
            run_start,
        });

        let pool = Arc::new(Semaphore::new(spec.pool.max_size));
        let externally_stopped = self.dispatch(&context, &pool, run_start).await;

        if !externally_stopped {
            drain_pool(&pool, spec.pool.max_size).await;
        }

        drop(self.shutdown_tx.send(()));
        drop(collector.events_tx);

        let metrics = collector.task.await.map_err(AppError::from)?;
        let resources = resource_task.await.unwrap_or_default();
        rate_task.abort();

        let report = TestReport {
            name: spec.name.clone(),
            started_at,
            ended_at: Local::now(),
            metrics,
            resources,
            breaker_opened_at_ms: breaker.as_ref().and_then(|breaker| breaker.opened_at_ms()),
            output_file: spec.metrics.output_file.clone(),
        };

        info!(
            "Test '{}' finished: {} requests, {:.2}% success, {:.1} avg TPS.",
            report.name,
            report.metrics.total_requests,
            report.success_rate() * 100.0,
            report.average_tps()
        );
        Ok(report)
    }

    /// Submission loop. Returns true when an external stop (rather than
    /// the deadline or the breaker) ended it.
    async fn dispatch(
        &self,
        context: &Arc<WorkerContext>,
        pool: &Arc<Semaphore>,
        run_start: Instant,
    ) -> bool {
        let deadline = run_start
            .checked_add(self.spec.duration)
            .unwrap_or_else(Instant::now);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut next_id: u64 = 0;

        while Instant::now() < deadline {
            match shutdown_rx.try_recv() {
                Err(TryRecvError::Empty) => {}
                Ok(()) | Err(TryRecvError::Closed) | Err(TryRecvError::Lagged(_)) => {
                    info!("Stop requested; abandoning submission loop.");
                    return true;
                }
            }

            if let Some(breaker) = context.breaker.as_ref() {
                if !breaker.allow_request() {
                    warn!(
                        "Circuit breaker is open (error rate {:.3}); halting submission.",
                        breaker.current_error_rate()
                    );
                    break;
                }
            }

            let id = next_id;
            next_id = next_id.saturating_add(1);
            let unit_context = Arc::clone(context);

            match Arc::clone(pool).try_acquire_owned() {
                Ok(permit) => {
                    drop(tokio::spawn(async move {
                        let _permit = permit;
                        run_unit(unit_context, id).await;
                    }));
                }
                // Saturated pool: run the unit on the submission task
                // instead of dropping it.
                Err(_) => run_unit(unit_context, id).await,
            }

            sleep(SUBMISSION_PAUSE).await;
        }
        false
    }
}

/// Wait for every worker permit to return, bounded by the drain grace.
async fn drain_pool(pool: &Arc<Semaphore>, max_size: usize) {
    let wanted = u32::try_from(max_size).unwrap_or(u32::MAX);
    match tokio::time::timeout(POOL_DRAIN_TIMEOUT, pool.acquire_many(wanted)).await {
        Ok(Ok(permits)) => drop(permits),
        Ok(Err(_)) => {}
        Err(_) => warn!(
            "Worker pool did not drain within {:?}; accepting partial metrics.",
            POOL_DRAIN_TIMEOUT
        ),
    }
}

/// 1 Hz scheduler: pushes the profile's target into the regulator and
/// logs a progress record every tenth tick. Per-tick problems are
/// logged, never fatal.
fn spawn_rate_scheduler(
    shutdown_tx: &ShutdownSender,
    regulator: Arc<RateRegulator>,
    profile: TrafficProfile,
    run_start: Instant,
    total_ms: u64,
    stats_rx: watch::Receiver<RunningStats>,
) -> JoinHandle<()> {
    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks: u32 = 0;
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = tick.tick() => {
                    let elapsed = crate::util::elapsed_ms(run_start);
                    let target = profile.tps_at(elapsed, total_ms);
                    regulator.set_rate(target);

                    ticks = ticks.saturating_add(1);
                    if ticks % PROGRESS_EVERY_TICKS == 0 {
                        let stats = *stats_rx.borrow();
                        let progress_pct = if total_ms == 0 {
                            100.0
                        } else {
                            (elapsed.min(total_ms) as f64) / (total_ms as f64) * 100.0
                        };
                        info!(
                            "Progress {:.0}%: target {:.1} TPS, actual {} TPS, success rate {:.2}%.",
                            progress_pct,
                            target,
                            stats.current_tps,
                            stats.success_rate() * 100.0
                        );
                    }
                }
            }
        }
    })
}
