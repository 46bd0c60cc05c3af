//! Fetch orchestration
//!
//! This module composes the window resolver, device session, period
//! fetcher, log sink and progress reporter into one run.
//!
//! # Overview
//!
//! 1. **Job**: describe what to fetch with [`job::FetchJob`]
//! 2. **Execution**: run it with [`executor::FetchExecutor`]
//! 3. **Progress**: rendered by [`progress::ProgressReporter`]
//! 4. **Result**: a [`job::FetchSummary`] or a [`job::FetchFailure`] naming the stage
//!
//! # Quick Start
//!
//! ```no_run
//! use meter_data_downloader::address::DeviceAddress;
//! use meter_data_downloader::device::{shelly_rpc::ShellyRpcConnector, ChannelSelector};
//! use meter_data_downloader::downloader::{FetchExecutor, FetchJob, ProgressMode};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let job = FetchJob::new(DeviceAddress::parse("192.168.1.100")?, "2025-05-01T00:00:00")
//!     .with_end("2025-05-02T00:00:00")
//!     .with_channel(ChannelSelector::Channel(0))
//!     .with_clear(true);
//!
//! let executor = FetchExecutor::new(Arc::new(ShellyRpcConnector::default()))
//!     .with_progress(ProgressMode::Log);
//! let summary = executor.execute(&job).await?;
//! println!("{} calls, {} records", summary.calls_made, summary.items_returned);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Every failure is a [`DownloadError`]:
//! - `InvalidInput` - bad date, channel or window; user-correctable
//! - `Connection` - transport failure
//! - `Protocol` - malformed or unexpected device response
//! - `Output` - the log file could not be written
//! - `Cancelled` - interrupted by Ctrl+C
//!
//! None are retried. The device session is closed on every path.

pub mod config;
pub mod executor;
pub mod job;
pub mod progress;

pub use executor::FetchExecutor;
pub use job::{FetchFailure, FetchJob, FetchStage, FetchSummary};
pub use progress::{ProgressMode, ProgressReporter};

use crate::address::AddressError;
use crate::device::DeviceError;
use crate::output::OutputError;
use crate::window::WindowError;

/// Fetch errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DownloadError {
    /// Bad user input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Transport-level failure
    #[error("connection error: {0}")]
    Connection(String),

    /// Malformed or unexpected device response
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Output file could not be written
    #[error("output error: {0}")]
    Output(String),

    /// Interrupted before completion
    #[error("cancelled by user")]
    Cancelled,
}

impl From<WindowError> for DownloadError {
    fn from(err: WindowError) -> Self {
        DownloadError::InvalidInput(err.to_string())
    }
}

impl From<AddressError> for DownloadError {
    fn from(err: AddressError) -> Self {
        DownloadError::InvalidInput(err.to_string())
    }
}

impl From<DeviceError> for DownloadError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::Connection(msg) => DownloadError::Connection(msg),
            DeviceError::Protocol(msg) => DownloadError::Protocol(msg),
            DeviceError::NotConnected => DownloadError::Connection(err.to_string()),
        }
    }
}

impl From<OutputError> for DownloadError {
    fn from(err: OutputError) -> Self {
        DownloadError::Output(err.to_string())
    }
}
