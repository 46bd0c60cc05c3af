//! Window subcommand: resolve a time window without touching a device

use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};
use clap::Parser;
use serde_json::json;

use super::fetch::{Cli, OutputFormat};
use super::CliError;
use crate::window::{resolve_window, TimeWindow};

/// Window command arguments
#[derive(Parser, Debug)]
pub struct WindowArgs {
    /// Start date: ISO 8601 timestamp or relative period (5m, 2h, 1d)
    pub start_date: String,

    /// End date (ISO 8601); defaults to now, ignored for relative periods
    pub end_date: Option<String>,
}

impl WindowArgs {
    /// Resolve against `now`
    pub fn resolve<Tz: TimeZone>(&self, now: DateTime<Tz>) -> Result<TimeWindow, CliError> {
        Ok(resolve_window(&self.start_date, self.end_date.as_deref(), now)?)
    }

    /// Execute the window command
    pub fn execute(&self, cli: &Cli) -> Result<()> {
        let window = self.resolve(Local::now())?;

        match cli.output_format {
            OutputFormat::Json => {
                let value = json!({
                    "start": window.start(),
                    "end": window.end(),
                    "start_secs": window.start_secs(),
                    "end_secs": window.end_secs(),
                    "duration_secs": window.end_secs() - window.start_secs(),
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&value).context("Failed to serialize window")?
                );
            }
            OutputFormat::Human => {
                println!("Window:   {window}");
                println!(
                    "Seconds:  {} .. {} ({} s)",
                    window.start_secs(),
                    window.end_secs(),
                    window.end_secs() - window.start_secs()
                );
            }
        }
        Ok(())
    }
}
