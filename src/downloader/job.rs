//! Fetch job description and results

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use super::config::MAX_CHANNEL;
use super::DownloadError;
use crate::address::DeviceAddress;
use crate::device::ChannelSelector;
use crate::fetcher::FetchProgress;
use crate::output::OutputTemplate;
use crate::window::TimeWindow;
use crate::DeviceIdentity;

/// What to fetch and where to write it
#[derive(Debug, Clone)]
pub struct FetchJob {
    /// Device to fetch from
    pub address: DeviceAddress,
    /// History to read
    pub channel: ChannelSelector,
    /// Start date: absolute timestamp or relative period (`2d`)
    pub start_input: String,
    /// End date; ignored for relative start input
    pub end_input: Option<String>,
    /// Output path template; defaults per channel when absent
    pub output_template: Option<OutputTemplate>,
    /// Remove the destination before the first write
    pub clear_existing: bool,
}

impl FetchJob {
    /// Create a job for the aggregate history, ending now
    pub fn new(address: DeviceAddress, start_input: impl Into<String>) -> Self {
        Self {
            address,
            channel: ChannelSelector::Aggregate,
            start_input: start_input.into(),
            end_input: None,
            output_template: None,
            clear_existing: false,
        }
    }

    /// Set the end date
    pub fn with_end(mut self, end_input: impl Into<String>) -> Self {
        self.end_input = Some(end_input.into());
        self
    }

    /// Select a channel
    pub fn with_channel(mut self, channel: ChannelSelector) -> Self {
        self.channel = channel;
        self
    }

    /// Set the output template
    pub fn with_output(mut self, template: impl Into<String>) -> Self {
        self.output_template = Some(OutputTemplate::new(template));
        self
    }

    /// Clear the destination before writing
    pub fn with_clear(mut self, clear_existing: bool) -> Self {
        self.clear_existing = clear_existing;
        self
    }

    /// Effective output template
    pub fn output_template(&self) -> OutputTemplate {
        self.output_template
            .clone()
            .unwrap_or_else(|| OutputTemplate::default_for(self.channel))
    }

    /// Validate fields that do not depend on the clock
    pub fn validate(&self) -> Result<(), DownloadError> {
        if self.start_input.trim().is_empty() {
            return Err(DownloadError::InvalidInput(
                "start date cannot be empty".to_string(),
            ));
        }

        if let Some(channel) = self.channel.index() {
            if channel > MAX_CHANNEL {
                return Err(DownloadError::InvalidInput(format!(
                    "channel must be between 0 and {MAX_CHANNEL}, got {channel}"
                )));
            }
        }

        if let Some(template) = &self.output_template {
            if template.as_str().trim().is_empty() {
                return Err(DownloadError::InvalidInput(
                    "output path cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Orchestrator stage, used to name where a run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStage {
    /// Parsing and validating the window
    ResolvingWindow,
    /// Opening the device session
    Connecting,
    /// Reading device identity
    Identifying,
    /// Paging through history and writing records
    Fetching,
    /// Computing the summary
    Summarizing,
}

impl FetchStage {
    /// Stable label for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStage::ResolvingWindow => "resolving_window",
            FetchStage::Connecting => "connecting",
            FetchStage::Identifying => "identifying",
            FetchStage::Fetching => "fetching",
            FetchStage::Summarizing => "summarizing",
        }
    }
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FetchStage::ResolvingWindow => "resolving time window",
            FetchStage::Connecting => "connecting to device",
            FetchStage::Identifying => "reading device identity",
            FetchStage::Fetching => "fetching history",
            FetchStage::Summarizing => "summarizing",
        };
        f.write_str(text)
    }
}

/// Outcome of a successful fetch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchSummary {
    /// Resolved window
    pub window: TimeWindow,
    /// Device the records came from
    pub identity: DeviceIdentity,
    /// File the records were appended to
    pub output_path: PathBuf,
    /// History calls issued
    pub calls_made: u64,
    /// Records written
    pub items_returned: u64,
    /// Records per call
    pub average_items_per_call: f64,
    /// Wall time of the whole run in milliseconds
    pub elapsed_ms: u64,
}

impl FetchSummary {
    /// Assemble a summary from the final progress
    pub fn new(
        window: TimeWindow,
        identity: DeviceIdentity,
        output_path: PathBuf,
        progress: &FetchProgress,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            window,
            identity,
            output_path,
            calls_made: progress.calls_made,
            items_returned: progress.items_returned,
            average_items_per_call: progress.average_items_per_call,
            elapsed_ms,
        }
    }
}

/// A failed fetch and the stage it failed in
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{stage} failed: {error}")]
pub struct FetchFailure {
    /// Stage in progress when the error occurred
    pub stage: FetchStage,
    /// The error
    #[source]
    pub error: DownloadError,
}

impl FetchFailure {
    /// Attach a stage to an error
    pub fn new(stage: FetchStage, error: impl Into<DownloadError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }

    /// Whether the run was interrupted rather than failed
    pub fn is_cancelled(&self) -> bool {
        self.error == DownloadError::Cancelled
    }
}
