use crate::runner::TestReport;

/// Console summary printed after a run reaches its terminal state.
pub fn print_summary(report: &TestReport) {
    let metrics = &report.metrics;

    println!();
    println!("=== {} ===", report.name);
    println!(
        "Duration:            {:.1} s ({} ms)",
        metrics.duration.as_secs_f64(),
        report.duration_ms()
    );
    println!("Total requests:      {}", metrics.total_requests);
    println!(
        "Success / failure:   {} / {}",
        metrics.successful_requests, metrics.failed_requests
    );
    println!(
        "Timeouts / skipped:  {} / {}",
        metrics.timeout_requests, metrics.skipped_requests
    );
    println!("Success rate:        {:.2}%", report.success_rate() * 100.0);
    println!("Average TPS:         {:.2}", report.average_tps());
    println!("P95 response time:   {} ms", metrics.response_time.p95_ms);
    println!("Max CPU:             {:.1}%", report.resources.max_cpu_pct);
    println!("Max memory:          {:.1} MB", report.max_memory_mb());

    if let Some(opened_at) = report.breaker_opened_at_ms {
        println!("Circuit breaker:     OPEN (tripped at epoch {} ms)", opened_at);
    }

    if !metrics.errors.is_empty() {
        println!();
        println!("Top errors:");
        for entry in &metrics.errors.statuses {
            println!("  HTTP {}: {} responses", entry.status, entry.count);
        }
        for entry in &metrics.errors.exceptions {
            println!("  {}: {} errors", entry.kind, entry.count);
        }
    }
    println!();
}
