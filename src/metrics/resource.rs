use std::collections::VecDeque;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::shutdown::ShutdownSender;
use crate::util::epoch_ms;

/// Bounded retention for periodic snapshots.
pub const MAX_RESOURCE_SNAPSHOTS: usize = 7200;

#[derive(Debug, Clone, Copy)]
pub struct ResourceSnapshot {
    pub timestamp_ms: u64,
    pub cpu_pct: f64,
    pub rss_bytes: u64,
    pub virtual_bytes: u64,
    pub total_mem_bytes: u64,
    pub free_mem_bytes: u64,
    pub threads: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ResourceReport {
    pub snapshots: Vec<ResourceSnapshot>,
    pub max_cpu_pct: f64,
    pub max_rss_bytes: u64,
}

/// Periodic process-resource sampler reading `/proc`. On platforms
/// without `/proc` the task idles and returns an empty report.
pub fn spawn_resource_monitor(
    shutdown_tx: &ShutdownSender,
    sample_interval: Duration,
    enabled: bool,
) -> JoinHandle<ResourceReport> {
    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::spawn(async move {
        let mut report = ResourceReport::default();
        if !enabled {
            drop(shutdown_rx.recv().await);
            return report;
        }

        let mut snapshots: VecDeque<ResourceSnapshot> = VecDeque::new();
        let mut tick = tokio::time::interval(sample_interval.max(Duration::from_millis(100)));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut previous_cpu: Option<(Instant, u64)> = None;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = tick.tick() => {
                    let Some(snapshot) = sample(&mut previous_cpu) else {
                        continue;
                    };
                    report.max_cpu_pct = report.max_cpu_pct.max(snapshot.cpu_pct);
                    report.max_rss_bytes = report.max_rss_bytes.max(snapshot.rss_bytes);
                    if snapshots.len() >= MAX_RESOURCE_SNAPSHOTS {
                        snapshots.pop_front();
                    }
                    snapshots.push_back(snapshot);
                }
            }
        }

        report.snapshots = snapshots.into_iter().collect();
        report
    })
}

fn sample(previous_cpu: &mut Option<(Instant, u64)>) -> Option<ResourceSnapshot> {
    let (rss_bytes, virtual_bytes) = read_memory()?;
    let cpu_ticks = read_cpu_ticks()?;
    let now = Instant::now();

    let cpu_pct = match previous_cpu.replace((now, cpu_ticks)) {
        Some((last_instant, last_ticks)) => {
            cpu_percent(cpu_ticks.saturating_sub(last_ticks), now - last_instant)
        }
        None => 0.0,
    };

    let (total_mem_bytes, free_mem_bytes) = read_system_memory().unwrap_or((0, 0));

    Some(ResourceSnapshot {
        timestamp_ms: epoch_ms(),
        cpu_pct,
        rss_bytes,
        virtual_bytes,
        total_mem_bytes,
        free_mem_bytes,
        threads: read_thread_count().unwrap_or(0),
    })
}

fn cpu_percent(delta_ticks: u64, elapsed: Duration) -> f64 {
    let ticks_per_sec = clock_ticks_per_second();
    let elapsed_secs = elapsed.as_secs_f64();
    if ticks_per_sec == 0 || elapsed_secs <= 0.0 {
        return 0.0;
    }
    let cpu_secs = (delta_ticks as f64) / (ticks_per_sec as f64);
    let pct = cpu_secs / elapsed_secs * 100.0;
    if pct.is_nan() { 0.0 } else { pct.max(0.0) }
}

#[cfg(target_os = "linux")]
fn read_memory() -> Option<(u64, u64)> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let mut parts = statm.split_whitespace();
    let size_pages = parts.next()?.parse::<u64>().ok()?;
    let resident_pages = parts.next()?.parse::<u64>().ok()?;
    let page_size = page_size()?;
    Some((
        resident_pages.saturating_mul(page_size),
        size_pages.saturating_mul(page_size),
    ))
}

#[cfg(target_os = "linux")]
fn read_cpu_ticks() -> Option<u64> {
    let stat = std::fs::read_to_string("/proc/self/stat").ok()?;
    // Field 2 is the parenthesized command and may contain spaces; skip
    // past the closing paren before splitting.
    let after_comm = stat.rsplit_once(')').map(|(_, rest)| rest)?;
    let mut fields = after_comm.split_whitespace();
    // utime and stime are fields 14 and 15 of the full line; 11 and 12
    // after state (field 3).
    let utime = fields.nth(11)?.parse::<u64>().ok()?;
    let stime = fields.next()?.parse::<u64>().ok()?;
    Some(utime.saturating_add(stime))
}

#[cfg(target_os = "linux")]
fn read_system_memory() -> Option<(u64, u64)> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    let mut total_kb = None;
    let mut available_kb = None;
    for line in meminfo.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            total_kb = parse_kb(rest);
        } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
            available_kb = parse_kb(rest);
        }
        if total_kb.is_some() && available_kb.is_some() {
            break;
        }
    }
    Some((
        total_kb?.saturating_mul(1024),
        available_kb?.saturating_mul(1024),
    ))
}

#[cfg(target_os = "linux")]
fn parse_kb(rest: &str) -> Option<u64> {
    rest.trim().split_whitespace().next()?.parse::<u64>().ok()
}

#[cfg(target_os = "linux")]
fn read_thread_count() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("Threads:") {
            return rest.trim().parse::<u64>().ok();
        }
    }
    None
}

#[cfg(target_os = "linux")]
fn page_size() -> Option<u64> {
    // Safety: sysconf is safe to call; we only read the page size.
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page_size <= 0 {
        return None;
    }
    u64::try_from(page_size).ok()
}

#[cfg(target_os = "linux")]
fn clock_ticks_per_second() -> u64 {
    // Safety: sysconf is safe to call; we only read the tick rate.
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    u64::try_from(ticks).unwrap_or(100)
}

#[cfg(not(target_os = "linux"))]
fn read_memory() -> Option<(u64, u64)> {
    None
}

#[cfg(not(target_os = "linux"))]
fn read_cpu_ticks() -> Option<u64> {
    None
}

#[cfg(not(target_os = "linux"))]
fn read_system_memory() -> Option<(u64, u64)> {
    None
}

#[cfg(not(target_os = "linux"))]
fn read_thread_count() -> Option<u64> {
    None
}

#[cfg(not(target_os = "linux"))]
fn clock_ticks_per_second() -> u64 {
    0
}
