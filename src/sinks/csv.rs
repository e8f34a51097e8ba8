use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};

use crate::error::SinkError;
use crate::runner::TestReport;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone)]
pub struct WrittenFiles {
    pub primary: PathBuf,
    pub tps_samples: PathBuf,
    pub resource_snapshots: PathBuf,
}

/// Write the primary metrics CSV plus the TPS-sample and
/// resource-snapshot series into `output_dir`.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or any file
/// cannot be written. Callers log these; export failures never change
/// the outcome of a finished run.
pub async fn write_report(output_dir: &Path, report: &TestReport) -> Result<WrittenFiles, SinkError> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|err| SinkError::CreateOutputDir {
            path: output_dir.to_path_buf(),
            source: err,
        })?;

    let primary_name = report.output_file.clone().unwrap_or_else(|| {
        format!(
            "{}_{}.csv",
            sanitize_name(&report.name),
            report.started_at.format(FILE_STAMP_FORMAT)
        )
    });
    let primary = output_dir.join(primary_name);
    write_file(&primary, primary_csv(report)?).await?;

    let tps_samples = output_dir.join("tps_samples.csv");
    write_file(&tps_samples, tps_csv(report)?).await?;

    let resource_snapshots = output_dir.join("resource_snapshots.csv");
    write_file(&resource_snapshots, resource_csv(report)?).await?;

    Ok(WrittenFiles {
        primary,
        tps_samples,
        resource_snapshots,
    })
}

async fn write_file(path: &Path, contents: String) -> Result<(), SinkError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|err| SinkError::WriteCsv {
            path: path.to_path_buf(),
            source: err,
        })
}

fn primary_csv(report: &TestReport) -> Result<String, SinkError> {
    let metrics = &report.metrics;
    let response = &metrics.response_time;
    let wait = &metrics.rate_wait;

    let mut out = String::new();
    row(&mut out, "Metric", "Value")?;
    row(
        &mut out,
        "Start Time",
        &report.started_at.format(TIMESTAMP_FORMAT).to_string(),
    )?;
    row(
        &mut out,
        "End Time",
        &report.ended_at.format(TIMESTAMP_FORMAT).to_string(),
    )?;
    row(&mut out, "Duration (ms)", &report.duration_ms().to_string())?;
    row(
        &mut out,
        "Duration (s)",
        &format!("{:.1}", metrics.duration.as_secs_f64()),
    )?;
    row(&mut out, "Total Requests", &metrics.total_requests.to_string())?;
    row(
        &mut out,
        "Successful Requests",
        &metrics.successful_requests.to_string(),
    )?;
    row(&mut out, "Failed Requests", &metrics.failed_requests.to_string())?;
    row(
        &mut out,
        "Timeout Requests",
        &metrics.timeout_requests.to_string(),
    )?;
    row(
        &mut out,
        "Skipped Requests",
        &metrics.skipped_requests.to_string(),
    )?;
    row(
        &mut out,
        "Success Rate",
        &format!("{:.4}", report.success_rate()),
    )?;
    row(&mut out, "Average TPS", &format!("{:.2}", report.average_tps()))?;
    row(&mut out, "Max TPS", &metrics.max_tps.to_string())?;

    row(&mut out, "Min Response Time (ms)", &response.min_ms.to_string())?;
    row(
        &mut out,
        "Median Response Time (ms)",
        &response.p50_ms.to_string(),
    )?;
    row(&mut out, "P90 Response Time (ms)", &response.p90_ms.to_string())?;
    row(&mut out, "P95 Response Time (ms)", &response.p95_ms.to_string())?;
    row(&mut out, "P99 Response Time (ms)", &response.p99_ms.to_string())?;
    row(&mut out, "Max Response Time (ms)", &response.max_ms.to_string())?;
    for &(percentile, value) in &metrics.extra_percentiles {
        row(
            &mut out,
            &format!("P{} Response Time (ms)", format_percentile(percentile)),
            &value.to_string(),
        )?;
    }

    row(
        &mut out,
        "Min Rate Limiter Wait (ms)",
        &wait.min_ms.to_string(),
    )?;
    row(
        &mut out,
        "Median Rate Limiter Wait (ms)",
        &wait.p50_ms.to_string(),
    )?;
    row(
        &mut out,
        "P90 Rate Limiter Wait (ms)",
        &wait.p90_ms.to_string(),
    )?;
    row(
        &mut out,
        "P99 Rate Limiter Wait (ms)",
        &wait.p99_ms.to_string(),
    )?;
    row(
        &mut out,
        "Max Rate Limiter Wait (ms)",
        &wait.max_ms.to_string(),
    )?;

    for (status, count) in &metrics.status_codes {
        row(&mut out, &format!("Status Code {}", status), &count.to_string())?;
    }

    row(
        &mut out,
        "Max CPU (%)",
        &format!("{:.1}", report.resources.max_cpu_pct),
    )?;
    row(
        &mut out,
        "Max Memory Used (MB)",
        &format!("{:.1}", report.max_memory_mb()),
    )?;

    Ok(out)
}

fn tps_csv(report: &TestReport) -> Result<String, SinkError> {
    let start_ms = epoch_ms_of(&report.started_at);
    let mut out = String::new();
    line(&mut out, "Timestamp, Elapsed (ms), TPS")?;
    for sample in &report.metrics.tps_samples {
        line(
            &mut out,
            &format!(
                "{}, {}, {}",
                format_epoch_ms(sample.timestamp_ms),
                sample.timestamp_ms.saturating_sub(start_ms),
                sample.tps
            ),
        )?;
    }
    Ok(out)
}

fn resource_csv(report: &TestReport) -> Result<String, SinkError> {
    let start_ms = epoch_ms_of(&report.started_at);
    let mut out = String::new();
    line(
        &mut out,
        "Timestamp, Elapsed (ms), CPU (%), RSS (MB), Virtual (MB), Total Memory (MB), Free Memory (MB), Threads",
    )?;
    for snapshot in &report.resources.snapshots {
        line(
            &mut out,
            &format!(
                "{}, {}, {:.1}, {:.1}, {:.1}, {:.1}, {:.1}, {}",
                format_epoch_ms(snapshot.timestamp_ms),
                snapshot.timestamp_ms.saturating_sub(start_ms),
                snapshot.cpu_pct,
                to_mb(snapshot.rss_bytes),
                to_mb(snapshot.virtual_bytes),
                to_mb(snapshot.total_mem_bytes),
                to_mb(snapshot.free_mem_bytes),
                snapshot.threads
            ),
        )?;
    }
    Ok(out)
}

fn row(out: &mut String, metric: &str, value: &str) -> Result<(), SinkError> {
    writeln!(out, "{},{}", metric, value).map_err(|err| SinkError::FormatRow { source: err })
}

fn line(out: &mut String, text: &str) -> Result<(), SinkError> {
    writeln!(out, "{}", text).map_err(|err| SinkError::FormatRow { source: err })
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

fn format_percentile(percentile: f64) -> String {
    if percentile.fract() == 0.0 {
        format!("{:.0}", percentile)
    } else {
        format!("{}", percentile)
    }
}

fn to_mb(bytes: u64) -> f64 {
    (bytes as f64) / (1024.0 * 1024.0)
}

fn epoch_ms_of(stamp: &DateTime<Local>) -> u64 {
    u64::try_from(stamp.timestamp_millis()).unwrap_or(0)
}

fn format_epoch_ms(epoch_ms: u64) -> String {
    let millis = i64::try_from(epoch_ms).unwrap_or(0);
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|stamp| stamp.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| epoch_ms.to_string())
}
