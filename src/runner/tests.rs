use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use super::*;
use crate::config::{BreakerSettings, MetricsOptions, PoolConfig, TestSpec};
use crate::request::RequestTemplate;
use crate::shutdown::shutdown_channel;

fn run_async_test<F>(future: F) -> Result<(), String>
where
    F: Future<Output = Result<(), String>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(|err| format!("Failed to build runtime: {}", err))?;
    runtime.block_on(future)
}

/// Minimal fixture server answering every request with the given status.
async fn spawn_status_server(status: u16) -> Result<String, String> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|err| format!("bind failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("local_addr failed: {}", err))?;

    drop(tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            drop(tokio::spawn(async move {
                let mut buffer = [0_u8; 1024];
                if stream.read(&mut buffer).await.is_err() {
                    return;
                }
                let reason = if status == 200 { "OK" } else { "Error" };
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Length: 2\r\nConnection: close\r\n\r\nOK",
                    status, reason
                );
                drop(stream.write_all(response.as_bytes()).await);
                drop(stream.flush().await);
            }));
        }
    }));

    Ok(format!("http://{}/", addr))
}

fn spec_against(url: &str, duration: Duration, breaker: Option<BreakerSettings>) -> TestSpec {
    TestSpec {
        name: "unit-run".to_owned(),
        base_url: None,
        duration,
        profile: crate::traffic::TrafficProfile::Stable { target_tps: 100.0 },
        pool: PoolConfig {
            core_size: 2,
            max_size: 8,
            queue_size: 16,
            keep_alive: Duration::from_secs(5),
        },
        templates: vec![RequestTemplate {
            name: "hit".to_owned(),
            weight: 1,
            method: reqwest::Method::GET,
            url: url.to_owned(),
            headers: Vec::new(),
            body: None,
        }],
        sources: BTreeMap::new(),
        metrics: MetricsOptions {
            percentiles: Vec::new(),
            output_file: None,
            resource_monitoring: false,
            sample_interval: Duration::from_secs(1),
        },
        breaker,
        request_timeout: Duration::from_secs(5),
    }
}

#[test]
fn controllers_are_single_use() -> Result<(), String> {
    run_async_test(async {
        let url = spawn_status_server(200).await?;
        let shutdown_tx = shutdown_channel();
        let controller =
            ExecutionController::new(spec_against(&url, Duration::from_millis(200), None), shutdown_tx);

        let report = controller
            .execute()
            .await
            .map_err(|err| format!("first execute failed: {}", err))?;
        assert!(report.metrics.total_requests > 0, "no requests were sent");

        match controller.execute().await {
            Err(crate::error::AppError::AlreadyExecuted) => Ok(()),
            Err(err) => Err(format!("unexpected error: {}", err)),
            Ok(_) => Err("second execute must fail".to_owned()),
        }
    })
}

#[test]
fn stable_run_reports_success() -> Result<(), String> {
    run_async_test(async {
        let url = spawn_status_server(200).await?;
        let shutdown_tx = shutdown_channel();
        let controller =
            ExecutionController::new(spec_against(&url, Duration::from_millis(500), None), shutdown_tx);

        let report = controller
            .execute()
            .await
            .map_err(|err| format!("execute failed: {}", err))?;

        assert!(report.metrics.total_requests > 0);
        assert_eq!(
            report.metrics.successful_requests + report.metrics.failed_requests,
            report.metrics.total_requests
        );
        assert!((report.success_rate() - 1.0).abs() < f64::EPSILON);
        assert!(report.breaker_opened_at_ms.is_none());
        assert!(report.metrics.status_codes.contains_key(&200));
        Ok(())
    })
}

#[test]
fn breaker_trip_halts_submission() -> Result<(), String> {
    run_async_test(async {
        let url = spawn_status_server(500).await?;
        let shutdown_tx = shutdown_channel();
        let breaker = Some(BreakerSettings {
            error_threshold: 0.5,
            window_size: 10,
        });
        let controller = ExecutionController::new(
            spec_against(&url, Duration::from_secs(10), breaker),
            shutdown_tx,
        );

        let started = tokio::time::Instant::now();
        let report = controller
            .execute()
            .await
            .map_err(|err| format!("execute failed: {}", err))?;

        assert!(
            started.elapsed() < Duration::from_secs(8),
            "breaker should end the run well before the deadline"
        );
        assert_eq!(report.metrics.successful_requests, 0);
        assert!(report.metrics.failed_requests >= 10);
        assert!(report.breaker_opened_at_ms.is_some());
        Ok(())
    })
}

#[test]
fn validator_rejected_2xx_fails_without_body_samples() -> Result<(), String> {
    run_async_test(async {
        let url = spawn_status_server(200).await?;
        let shutdown_tx = shutdown_channel();
        let validator = crate::validate::ResponseValidator::new(vec![
            crate::validate::ValidationRule::BodyContains {
                fragment: "definitely-not-in-the-body".to_owned(),
            },
        ]);
        let controller =
            ExecutionController::new(spec_against(&url, Duration::from_millis(300), None), shutdown_tx)
                .with_validator(validator);

        let report = controller
            .execute()
            .await
            .map_err(|err| format!("execute failed: {}", err))?;

        assert!(report.metrics.total_requests > 0);
        assert_eq!(report.metrics.successful_requests, 0);
        assert_eq!(report.metrics.failed_requests, report.metrics.total_requests);
        // Sub-400 responses are never sampled, even when the validator
        // rejects them.
        assert!(report.metrics.errors.statuses.is_empty());
        Ok(())
    })
}

#[test]
fn stop_ends_the_run_early() -> Result<(), String> {
    run_async_test(async {
        let url = spawn_status_server(200).await?;
        let shutdown_tx = shutdown_channel();
        let controller = std::sync::Arc::new(ExecutionController::new(
            spec_against(&url, Duration::from_secs(30), None),
            shutdown_tx,
        ));

        let stopper = std::sync::Arc::clone(&controller);
        drop(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            stopper.stop();
            // stop is idempotent.
            stopper.stop();
        }));

        let started = tokio::time::Instant::now();
        let report = controller
            .execute()
            .await
            .map_err(|err| format!("execute failed: {}", err))?;
        assert!(
            started.elapsed() < Duration::from_secs(10),
            "stop() must end the run early"
        );
        // Partial metrics from before the stop remain valid.
        assert_eq!(
            report.metrics.successful_requests + report.metrics.failed_requests,
            report.metrics.total_requests
        );
        Ok(())
    })
}
