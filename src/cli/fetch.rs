//! Command line surface and the fetch command

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde_json::json;

use super::window::WindowArgs;
use super::CliError;
use crate::address::DeviceAddress;
use crate::device::shelly_rpc::ShellyRpcConnector;
use crate::device::ChannelSelector;
use crate::downloader::config::{MAX_CHANNEL, REQUEST_TIMEOUT_SECS};
use crate::downloader::{FetchExecutor, FetchFailure, FetchJob, FetchSummary, ProgressMode};
use crate::shutdown::SharedShutdown;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
}

/// Meter data downloader CLI
#[derive(Parser, Debug)]
#[command(name = "meter-data-downloader")]
#[command(about = "Download historical energy-meter telemetry into a flat log", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log detail (-v debug, -vv trace); also logs full error detail
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Output format (json or human)
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Progress display
    #[arg(long, global = true, value_enum, default_value_t = ProgressMode::Bar)]
    pub progress: ProgressMode,

    /// Per-call device timeout in seconds
    #[arg(
        long,
        global = true,
        default_value_t = REQUEST_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: u64,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a period of history from a device
    Fetch(FetchArgs),

    /// Resolve and print a time window without contacting a device
    Window(WindowArgs),
}

fn parse_address(s: &str) -> Result<DeviceAddress, String> {
    DeviceAddress::parse(s).map_err(|e| e.to_string())
}

/// Fetch command arguments
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Start date: ISO 8601 timestamp (2025-05-01T00:00:00) or relative period (5m, 2h, 1d)
    pub start_date: String,

    /// End date (ISO 8601); defaults to now, ignored for relative periods
    pub end_date: Option<String>,

    /// Device address: host, host:port or http://host[:port]
    #[arg(long, env = "SHELLY", value_parser = parse_address)]
    pub shelly: DeviceAddress,

    /// Channel to read (0-2); omit for the whole-meter history
    #[arg(
        short,
        long,
        env = "CHANNEL",
        value_parser = clap::value_parser!(u8).range(0..=(MAX_CHANNEL as i64))
    )]
    pub channel: Option<u8>,

    /// Output file; "[mac]" is replaced by the device MAC address
    /// [default: [mac].log, or [mac]_ch<N>.log with --channel]
    #[arg(short, long)]
    pub output: Option<String>,

    /// Remove the output file before writing
    #[arg(long, default_value_t = false)]
    pub clear: bool,
}

impl FetchArgs {
    /// Build the job described by these arguments
    pub fn to_job(&self) -> FetchJob {
        let mut job = FetchJob::new(self.shelly.clone(), self.start_date.clone())
            .with_channel(ChannelSelector::from_index(self.channel))
            .with_clear(self.clear);
        if let Some(end) = &self.end_date {
            job = job.with_end(end.clone());
        }
        if let Some(output) = &self.output {
            job = job.with_output(output.clone());
        }
        job
    }

    /// Execute the fetch command
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<()> {
        let connector = ShellyRpcConnector::default()
            .with_request_timeout(Duration::from_secs(cli.timeout));

        let executor = FetchExecutor::new(Arc::new(connector))
            .with_progress(cli.progress)
            .with_verbose(cli.verbose > 0)
            .with_shutdown(shutdown);

        let job = self.to_job();
        match executor.execute(&job).await {
            Ok(summary) => match cli.output_format {
                OutputFormat::Json => output_json(&summary),
                OutputFormat::Human => {
                    output_human(&summary);
                    Ok(())
                }
            },
            Err(failure) => {
                if cli.output_format == OutputFormat::Json {
                    output_failure_json(&failure)?;
                }
                Err(CliError::from(failure).into())
            }
        }
    }
}

/// Render a summary as one JSON object on stdout
pub fn output_json(summary: &FetchSummary) -> Result<()> {
    let value = json!({
        "status": "success",
        "summary": summary,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&value).context("Failed to serialize summary to JSON")?
    );
    Ok(())
}

fn output_failure_json(failure: &FetchFailure) -> Result<()> {
    let value = json!({
        "status": if failure.is_cancelled() { "cancelled" } else { "error" },
        "stage": failure.stage,
        "error": failure.error.to_string(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&value).context("Failed to serialize failure to JSON")?
    );
    Ok(())
}

/// Render a summary for humans on stdout
pub fn output_human(summary: &FetchSummary) {
    print!("{}", format_human(summary));
}

/// Human-readable summary text
pub fn format_human(summary: &FetchSummary) -> String {
    format!(
        "Device:        {}\n\
         Window:        {}\n\
         Output:        {}\n\
         Device calls:  {}\n\
         Items:         {}\n\
         Average items per call: {:.2}\n\
         Elapsed:       {} ms\n",
        summary.identity,
        summary.window,
        summary.output_path.display(),
        summary.calls_made,
        summary.items_returned,
        summary.average_items_per_call,
        summary.elapsed_ms
    )
}
