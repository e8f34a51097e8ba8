use tracing_subscriber::EnvFilter;

/// Default directives for a load-test run: the crate itself logs at
/// info (debug with `-v`), while the HTTP stack's internals stay at
/// warn so per-request chatter cannot drown the 1 Hz progress records.
fn default_directives(verbose: bool) -> String {
    let crate_level = if verbose { "debug" } else { "info" };
    format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,h2=warn",
        crate_level
    )
}

fn resolve_filter(verbose: bool) -> EnvFilter {
    let from_env = std::env::var("TPSGEN_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok());
    from_env.unwrap_or_else(|| {
        EnvFilter::try_new(default_directives(verbose))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

/// Install the global subscriber. Progress records carry no module
/// targets; they read as a test log, not a trace.
pub fn init_logging(verbose: bool) {
    let result = tracing_subscriber::fmt()
        .with_env_filter(resolve_filter(verbose))
        .with_target(false)
        .try_init();
    if let Err(err) = result {
        eprintln!("Failed to initialize logging: {}", err);
    }
}
