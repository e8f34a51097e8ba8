use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, Request};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use crate::breaker::CircuitBreaker;
use crate::http::RateRegulator;
use crate::metrics::MetricEvent;
use crate::request::RequestGenerator;
use crate::util::elapsed_ms;
use crate::validate::ResponseValidator;

/// Shared collaborators captured once and handed to every unit of work.
pub(super) struct WorkerContext {
    pub client: Client,
    pub regulator: Arc<RateRegulator>,
    pub breaker: Option<Arc<CircuitBreaker>>,
    pub generator: Arc<RequestGenerator>,
    pub validator: Option<ResponseValidator>,
    pub events_tx: mpsc::Sender<MetricEvent>,
    pub request_timeout: Duration,
    pub run_start: Instant,
}

/// One unit of work: pace, gate, synthesize, fire, classify.
///
/// Failures never escape; every terminal path emits exactly one metric
/// event and (when an HTTP attempt happened) feeds the breaker.
pub(super) async fn run_unit(ctx: Arc<WorkerContext>, id: u64) {
    let wait_secs = ctx.regulator.acquire().await;
    let rate_wait_ms = (wait_secs * 1000.0).round() as u64;

    if let Some(breaker) = ctx.breaker.as_ref() {
        if !breaker.allow_request() {
            send(&ctx, MetricEvent::Skipped { id, rate_wait_ms }).await;
            return;
        }
    }

    let generated = match ctx
        .generator
        .generate(&ctx.client, id, elapsed_ms(ctx.run_start))
    {
        Ok(generated) => generated,
        Err(err) => {
            debug!("Request synthesis failed for unit {}: {}", id, err);
            send(&ctx, MetricEvent::Skipped { id, rate_wait_ms }).await;
            return;
        }
    };

    send(&ctx, MetricEvent::Started { id }).await;

    let start = Instant::now();
    let outcome = tokio::time::timeout(
        ctx.request_timeout,
        execute(&ctx.client, generated.request),
    )
    .await;
    let latency_ms = elapsed_ms(start);

    match outcome {
        Ok(Ok((status, headers, body))) => {
            let status_2xx = (200..300).contains(&status);
            let success = match ctx.validator.as_ref() {
                Some(validator) => {
                    let verdict = validator.validate(status, &headers, &body);
                    if !verdict.ok {
                        for (kind, description) in &verdict.failures {
                            debug!("Validation failed for unit {} ({}): {}", id, kind, description);
                        }
                    }
                    status_2xx && verdict.ok
                }
                None => status_2xx,
            };

            record_breaker(&ctx, success);
            // Body samples are kept for error status codes only; a
            // validator-rejected 2xx still counts as a failure.
            let error_body = (!success && status >= 400).then(|| body.clone());
            send(
                &ctx,
                MetricEvent::Response {
                    id,
                    status,
                    latency_ms,
                    bytes: body.len() as u64,
                    rate_wait_ms,
                    success,
                    error_body,
                },
            )
            .await;
        }
        Ok(Err(err)) if err.is_timeout() => {
            record_breaker(&ctx, false);
            send(
                &ctx,
                MetricEvent::Timeout {
                    id,
                    latency_ms,
                    rate_wait_ms,
                },
            )
            .await;
        }
        Ok(Err(err)) => {
            record_breaker(&ctx, false);
            send(
                &ctx,
                MetricEvent::Transport {
                    id,
                    kind: classify_transport(&err),
                    message: err.to_string(),
                    rate_wait_ms,
                },
            )
            .await;
        }
        Err(_) => {
            // The guard elapsed; any response arriving later is dropped.
            record_breaker(&ctx, false);
            send(
                &ctx,
                MetricEvent::Timeout {
                    id,
                    latency_ms,
                    rate_wait_ms,
                },
            )
            .await;
        }
    }
}

async fn execute(
    client: &Client,
    request: Request,
) -> Result<(u16, HeaderMap, String), reqwest::Error> {
    let response = client.execute(request).await?;
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response.text().await?;
    Ok((status, headers, body))
}

fn record_breaker(ctx: &WorkerContext, success: bool) {
    if let Some(breaker) = ctx.breaker.as_ref() {
        breaker.record_result(success);
    }
}

async fn send(ctx: &WorkerContext, event: MetricEvent) {
    // The collector may already be gone during shutdown; late events are
    // simply dropped.
    drop(ctx.events_tx.send(event).await);
}

fn classify_transport(err: &reqwest::Error) -> &'static str {
    if err.is_connect() {
        "connect"
    } else if err.is_request() {
        "request"
    } else if err.is_body() || err.is_decode() {
        "body"
    } else if err.is_redirect() {
        "redirect"
    } else {
        "transport"
    }
}
