use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use tpsgen::config;
use tpsgen::error::AppResult;
use tpsgen::logger;
use tpsgen::runner::ExecutionController;
use tpsgen::shutdown::{setup_signal_shutdown_handler, shutdown_channel};
use tpsgen::sinks;

#[derive(Debug, Parser)]
#[command(
    name = "tpsgen",
    about = "Declarative HTTP load generator with time-varying TPS profiles.",
    version
)]
struct Cli {
    /// Path to the test configuration (.json or .toml).
    config_path: PathBuf,
    /// Directory for CSV outputs. Defaults to the current directory.
    output_dir: Option<PathBuf>,
    /// Enable debug logging (TPSGEN_LOG / RUST_LOG override this).
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            use clap::error::ErrorKind;
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                drop(err.print());
                return ExitCode::SUCCESS;
            }
            drop(err.print());
            eprintln!("Usage: tpsgen <config-path> [output-dir]");
            return ExitCode::from(1);
        }
    };

    logger::init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> AppResult<()> {
    let spec = config::load_test_spec(&cli.config_path)?;
    let output_dir = cli.output_dir.unwrap_or_else(|| PathBuf::from("."));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let shutdown_tx = shutdown_channel();
        let signal_task = setup_signal_shutdown_handler(&shutdown_tx);

        let controller = ExecutionController::new(spec, shutdown_tx.clone());
        let report = controller.execute().await?;

        // A finished run is a success regardless of HTTP outcomes;
        // export problems are logged, never fatal.
        match sinks::write_report(&output_dir, &report).await {
            Ok(files) => tracing::info!("Results written to {}", files.primary.display()),
            Err(err) => tracing::error!("Failed to export results: {}", err),
        }
        sinks::print_summary(&report);

        drop(shutdown_tx.send(()));
        drop(signal_task.await);
        Ok(())
    })
}
