use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::MetricsError;
use crate::shutdown::ShutdownSender;
use crate::util::epoch_ms;

use super::analyzer::ErrorAnalyzer;
use super::histogram::SnapshotHistogram;
use super::{MAX_TPS_SAMPLES, MetricEvent, MetricsSummary, RunningStats, TpsSample};

const EVENT_CHANNEL_CAPACITY: usize = 16_384;
const DRAIN_GRACE: Duration = Duration::from_millis(200);
const ERROR_REPORT_TOP_N: usize = 10;

pub struct CollectorHandle {
    pub events_tx: mpsc::Sender<MetricEvent>,
    pub stats_rx: watch::Receiver<RunningStats>,
    pub task: JoinHandle<MetricsSummary>,
}

struct CollectorState {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    timeout_requests: u64,
    skipped_requests: u64,
    total_bytes: u64,
    status_codes: BTreeMap<u16, u64>,
    requests_last_second: u64,
    current_tps: u64,
    max_tps: u64,
    tps_samples: VecDeque<TpsSample>,
    response_time: SnapshotHistogram,
    rate_wait: SnapshotHistogram,
    analyzer: ErrorAnalyzer,
}

impl CollectorState {
    fn new() -> Result<Self, MetricsError> {
        Ok(Self {
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            timeout_requests: 0,
            skipped_requests: 0,
            total_bytes: 0,
            status_codes: BTreeMap::new(),
            requests_last_second: 0,
            current_tps: 0,
            max_tps: 0,
            tps_samples: VecDeque::new(),
            response_time: SnapshotHistogram::new()?,
            rate_wait: SnapshotHistogram::new()?,
            analyzer: ErrorAnalyzer::new(),
        })
    }

    fn process_event(&mut self, event: MetricEvent) {
        match event {
            MetricEvent::Started { id: _ } => {
                self.total_requests = self.total_requests.saturating_add(1);
            }
            MetricEvent::Response {
                id: _,
                status,
                latency_ms,
                bytes,
                rate_wait_ms,
                success,
                error_body,
            } => {
                self.bump_second();
                let slot = self.status_codes.entry(status).or_insert(0);
                *slot = slot.saturating_add(1);
                self.response_time.record(latency_ms);
                self.rate_wait.record(rate_wait_ms);
                self.total_bytes = self.total_bytes.saturating_add(bytes);
                if success {
                    self.successful_requests = self.successful_requests.saturating_add(1);
                } else {
                    self.failed_requests = self.failed_requests.saturating_add(1);
                    if let Some(body) = error_body {
                        self.analyzer.record_error_response(status, &body);
                    }
                }
            }
            MetricEvent::Timeout {
                id: _,
                latency_ms,
                rate_wait_ms,
            } => {
                self.bump_second();
                self.failed_requests = self.failed_requests.saturating_add(1);
                self.timeout_requests = self.timeout_requests.saturating_add(1);
                self.response_time.record(latency_ms);
                self.rate_wait.record(rate_wait_ms);
                self.analyzer
                    .record_exception("timeout", "request exceeded the hard per-request timeout");
            }
            MetricEvent::Transport {
                id: _,
                kind,
                message,
                rate_wait_ms,
            } => {
                self.bump_second();
                self.failed_requests = self.failed_requests.saturating_add(1);
                self.rate_wait.record(rate_wait_ms);
                self.analyzer.record_exception(kind, &message);
            }
            MetricEvent::Skipped { id: _, rate_wait_ms } => {
                self.bump_second();
                self.skipped_requests = self.skipped_requests.saturating_add(1);
                self.rate_wait.record(rate_wait_ms);
            }
        }
    }

    // Every terminal path of a unit bumps the per-second counter exactly
    // once.
    fn bump_second(&mut self) {
        self.requests_last_second = self.requests_last_second.saturating_add(1);
    }

    /// Read-and-reset the per-second counter, publish the sample, and
    /// fold histogram intervals into their snapshots.
    fn on_second(&mut self) {
        let tps = self.requests_last_second;
        self.requests_last_second = 0;
        self.current_tps = tps;
        self.max_tps = self.max_tps.max(tps);
        if self.tps_samples.len() >= MAX_TPS_SAMPLES {
            self.tps_samples.pop_front();
        }
        self.tps_samples.push_back(TpsSample {
            timestamp_ms: epoch_ms(),
            tps,
        });
        self.response_time.fold();
        self.rate_wait.fold();
    }

    fn running_stats(&self, run_start: Instant) -> RunningStats {
        RunningStats {
            elapsed: run_start.elapsed(),
            current_tps: self.current_tps,
            total_requests: self.total_requests,
            successful_requests: self.successful_requests,
            failed_requests: self.failed_requests,
        }
    }

    fn into_summary(mut self, duration: Duration, percentiles: &[f64]) -> MetricsSummary {
        self.response_time.fold();
        self.rate_wait.fold();
        let extra_percentiles = percentiles
            .iter()
            .map(|&percentile| {
                (
                    percentile,
                    self.response_time.snapshot().value_at_percentile(percentile),
                )
            })
            .collect();
        MetricsSummary {
            duration,
            total_requests: self.total_requests,
            successful_requests: self.successful_requests,
            failed_requests: self.failed_requests,
            timeout_requests: self.timeout_requests,
            skipped_requests: self.skipped_requests,
            total_bytes: self.total_bytes,
            status_codes: self.status_codes,
            response_time: self.response_time.snapshot().stats(),
            rate_wait: self.rate_wait.snapshot().stats(),
            tps_samples: self.tps_samples.into_iter().collect(),
            max_tps: self.max_tps,
            errors: self.analyzer.report(ERROR_REPORT_TOP_N),
            extra_percentiles,
        }
    }
}

/// Spawn the single-owner metrics task. Workers send [`MetricEvent`]s;
/// the task also runs the 1 Hz sampling tick and publishes
/// [`RunningStats`] over a watch channel. The returned join handle
/// yields the final [`MetricsSummary`].
///
/// # Errors
///
/// Returns an error if the histograms cannot be created.
pub fn spawn_metrics_collector(
    shutdown_tx: &ShutdownSender,
    run_start: Instant,
    percentiles: Vec<f64>,
) -> Result<CollectorHandle, MetricsError> {
    let mut state = CollectorState::new()?;
    let (events_tx, mut events_rx) = mpsc::channel::<MetricEvent>(EVENT_CHANNEL_CAPACITY);
    let (stats_tx, stats_rx) = watch::channel(RunningStats::default());
    let mut shutdown_rx = shutdown_tx.subscribe();

    let task = tokio::spawn(async move {
        let mut second_tick = tokio::time::interval(Duration::from_secs(1));
        second_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                maybe_event = events_rx.recv() => {
                    match maybe_event {
                        Some(event) => state.process_event(event),
                        None => break,
                    }
                }
                _ = second_tick.tick() => {
                    state.on_second();
                    drop(stats_tx.send(state.running_stats(run_start)));
                }
            }
        }

        // Late events from workers that finished during shutdown still
        // count; drain briefly rather than dropping them.
        let drain_deadline = Instant::now()
            .checked_add(DRAIN_GRACE)
            .unwrap_or_else(Instant::now);
        loop {
            match events_rx.try_recv() {
                Ok(event) => state.process_event(event),
                Err(mpsc::error::TryRecvError::Empty) => {
                    if Instant::now() > drain_deadline {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Err(mpsc::error::TryRecvError::Disconnected) => break,
            }
        }

        if state.requests_last_second > 0 {
            state.on_second();
        }

        state.into_summary(run_start.elapsed(), &percentiles)
    });

    Ok(CollectorHandle {
        events_tx,
        stats_rx,
        task,
    })
}
