//! Main entry point for the meter-data-downloader CLI

use clap::Parser;
use meter_data_downloader::cli::{Cli, CliError, Commands};
use meter_data_downloader::shutdown::ShutdownCoordinator;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing on stderr with optional JSON formatting.
///
/// `RUST_LOG` wins; otherwise the level follows `-v`.
fn init_tracing(verbose: u8) {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("meter_data_downloader={level}")));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    meter_data_downloader::metrics::describe_metrics();

    // Ctrl+C cancels the running fetch; the executor still closes the session
    let shutdown = ShutdownCoordinator::shared();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - closing device session...");
                shutdown.request_shutdown();
            }
        }
    });

    let result = match &cli.command {
        Commands::Fetch(args) => args.execute(&cli, shutdown.clone()).await,
        Commands::Window(args) => args.execute(&cli),
    };

    if let Err(e) = result {
        let code = e
            .downcast_ref::<CliError>()
            .map_or(1, CliError::exit_code);
        if cli.verbose > 0 {
            error!("Command failed: {:?}", e);
        } else {
            error!("Command failed: {}", e);
        }
        std::process::exit(code);
    }
}
