use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use chrono::{Local, TimeZone};

use super::*;
use crate::metrics::{
    ErrorReport, LatencyStats, MetricsSummary, ResourceReport, ResourceSnapshot, TpsSample,
};
use crate::runner::TestReport;

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

fn sample_report() -> Result<TestReport, String> {
    let started_at = Local
        .with_ymd_and_hms(2026, 7, 4, 12, 0, 0)
        .single()
        .ok_or("bad start stamp")?;
    let started_ms = u64::try_from(started_at.timestamp_millis()).map_err(|_| "negative epoch")?;

    let mut status_codes = BTreeMap::new();
    status_codes.insert(200_u16, 180_u64);
    status_codes.insert(500_u16, 20_u64);

    Ok(TestReport {
        name: "export test".to_owned(),
        started_at,
        ended_at: started_at + chrono::TimeDelta::seconds(2),
        metrics: MetricsSummary {
            duration: Duration::from_secs(2),
            total_requests: 200,
            successful_requests: 180,
            failed_requests: 20,
            timeout_requests: 3,
            skipped_requests: 1,
            total_bytes: 4000,
            status_codes,
            response_time: LatencyStats {
                count: 200,
                min_ms: 2,
                max_ms: 120,
                mean_ms: 25.0,
                stdev_ms: 10.0,
                p50_ms: 20,
                p90_ms: 60,
                p95_ms: 80,
                p99_ms: 110,
            },
            rate_wait: LatencyStats {
                count: 200,
                min_ms: 1,
                max_ms: 15,
                mean_ms: 4.0,
                stdev_ms: 2.0,
                p50_ms: 3,
                p90_ms: 8,
                p95_ms: 10,
                p99_ms: 14,
            },
            tps_samples: vec![
                TpsSample {
                    timestamp_ms: started_ms.saturating_add(1000),
                    tps: 98,
                },
                TpsSample {
                    timestamp_ms: started_ms.saturating_add(2000),
                    tps: 102,
                },
            ],
            max_tps: 102,
            errors: ErrorReport::default(),
            extra_percentiles: vec![(99.9, 118)],
        },
        resources: ResourceReport {
            snapshots: vec![ResourceSnapshot {
                timestamp_ms: started_ms.saturating_add(1000),
                cpu_pct: 12.5,
                rss_bytes: 64 * 1024 * 1024,
                virtual_bytes: 128 * 1024 * 1024,
                total_mem_bytes: 8 * 1024 * 1024 * 1024,
                free_mem_bytes: 4 * 1024 * 1024 * 1024,
                threads: 12,
            }],
            max_cpu_pct: 37.5,
            max_rss_bytes: 96 * 1024 * 1024,
        },
        breaker_opened_at_ms: None,
        output_file: None,
    })
}

#[test]
fn primary_csv_contains_required_rows() -> Result<(), String> {
    run_async_test(async {
        let dir = tempfile::tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
        let report = sample_report()?;
        let files = write_report(dir.path(), &report)
            .await
            .map_err(|err| format!("write failed: {}", err))?;

        let contents = std::fs::read_to_string(&files.primary)
            .map_err(|err| format!("read failed: {}", err))?;
        for expected in [
            "Metric,Value",
            "Duration (ms),2000",
            "Total Requests,200",
            "Successful Requests,180",
            "Failed Requests,20",
            "Timeout Requests,3",
            "Skipped Requests,1",
            "Success Rate,0.9000",
            "Average TPS,100.00",
            "Max TPS,102",
            "Median Response Time (ms),20",
            "P95 Response Time (ms),80",
            "P99.9 Response Time (ms),118",
            "P99 Rate Limiter Wait (ms),14",
            "Status Code 200,180",
            "Status Code 500,20",
            "Max CPU (%),37.5",
            "Max Memory Used (MB),96.0",
        ] {
            assert!(
                contents.contains(expected),
                "primary CSV missing row '{}' in:\n{}",
                expected,
                contents
            );
        }
        Ok(())
    })
}

#[test]
fn primary_file_name_embeds_sanitized_name_and_stamp() -> Result<(), String> {
    run_async_test(async {
        let dir = tempfile::tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
        let report = sample_report()?;
        let files = write_report(dir.path(), &report)
            .await
            .map_err(|err| format!("write failed: {}", err))?;
        let file_name = files
            .primary
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or("missing file name")?
            .to_owned();
        assert_eq!(file_name, "export_test_20260704_120000.csv");
        Ok(())
    })
}

#[test]
fn output_file_override_is_respected() -> Result<(), String> {
    run_async_test(async {
        let dir = tempfile::tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
        let mut report = sample_report()?;
        report.output_file = Some("custom.csv".to_owned());
        let files = write_report(dir.path(), &report)
            .await
            .map_err(|err| format!("write failed: {}", err))?;
        assert_eq!(
            files.primary.file_name().and_then(|name| name.to_str()),
            Some("custom.csv")
        );
        Ok(())
    })
}

#[test]
fn tps_csv_lists_every_sample_with_elapsed_offsets() -> Result<(), String> {
    run_async_test(async {
        let dir = tempfile::tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
        let report = sample_report()?;
        let files = write_report(dir.path(), &report)
            .await
            .map_err(|err| format!("write failed: {}", err))?;

        let contents = std::fs::read_to_string(&files.tps_samples)
            .map_err(|err| format!("read failed: {}", err))?;
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.first().copied(), Some("Timestamp, Elapsed (ms), TPS"));
        assert_eq!(lines.len(), 3);
        assert!(lines.get(1).is_some_and(|line| line.ends_with("1000, 98")));
        assert!(lines.get(2).is_some_and(|line| line.ends_with("2000, 102")));
        Ok(())
    })
}

#[test]
fn resource_csv_has_header_and_rows() -> Result<(), String> {
    run_async_test(async {
        let dir = tempfile::tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
        let report = sample_report()?;
        let files = write_report(dir.path(), &report)
            .await
            .map_err(|err| format!("write failed: {}", err))?;

        let contents = std::fs::read_to_string(&files.resource_snapshots)
            .map_err(|err| format!("read failed: {}", err))?;
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines.first().copied(),
            Some(
                "Timestamp, Elapsed (ms), CPU (%), RSS (MB), Virtual (MB), Total Memory (MB), Free Memory (MB), Threads"
            )
        );
        assert_eq!(lines.len(), 2);
        assert!(lines.get(1).is_some_and(|line| line.contains("12.5")));
        Ok(())
    })
}

#[test]
fn exports_are_deterministic_for_the_same_report() -> Result<(), String> {
    run_async_test(async {
        let dir_a = tempfile::tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
        let dir_b = tempfile::tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
        let report = sample_report()?;

        let first = write_report(dir_a.path(), &report)
            .await
            .map_err(|err| format!("write failed: {}", err))?;
        let second = write_report(dir_b.path(), &report)
            .await
            .map_err(|err| format!("write failed: {}", err))?;

        let left = std::fs::read_to_string(&first.primary)
            .map_err(|err| format!("read failed: {}", err))?;
        let right = std::fs::read_to_string(&second.primary)
            .map_err(|err| format!("read failed: {}", err))?;
        assert_eq!(left, right);
        Ok(())
    })
}

#[test]
fn print_summary_does_not_panic() -> Result<(), String> {
    let report = sample_report()?;
    print_summary(&report);
    Ok(())
}
