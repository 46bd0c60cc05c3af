//! # Meter Data Downloader Library
//!
//! Retrieves historical energy-meter telemetry from a smart-metering device and
//! appends it to a flat, comma-separated time-series log.
//!
//! ## Features
//!
//! - **Flexible windows**: absolute timestamps or relative shorthand (`2d`, `6h`, `15m`)
//! - **Paged retrieval**: drives the device's cursor-based history protocol to completion
//! - **Streaming output**: records are appended line by line as pages arrive
//! - **Guaranteed cleanup**: the device session is released on every exit path,
//!   including errors and Ctrl+C
//!
//! ## Quick Start
//!
//! ```no_run
//! use meter_data_downloader::address::DeviceAddress;
//! use meter_data_downloader::device::shelly_rpc::ShellyRpcConnector;
//! use meter_data_downloader::downloader::{FetchExecutor, FetchJob};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let job = FetchJob::new(DeviceAddress::parse("192.168.1.100")?, "2d");
//!
//! let executor = FetchExecutor::new(Arc::new(ShellyRpcConnector::default()));
//! let summary = executor.execute(&job).await?;
//! println!("{} records written to {}", summary.items_returned, summary.output_path.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`window`] - Turns start/end input into a validated time window
//! - [`address`] - Device address parsing
//! - [`device`] - Transport seam, device session lifecycle, HTTP RPC transport
//! - [`fetcher`] - Paged history retrieval with progress tracking
//! - [`output`] - Append-only log sink and filename templating
//! - [`downloader`] - Fetch orchestration, progress reporting, error taxonomy
//! - [`shutdown`] - Ctrl+C coordination

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Device address parsing and normalisation
pub mod address;

/// CLI command implementations
pub mod cli;

/// Device transport seam and session lifecycle
pub mod device;

/// Fetch orchestration
pub mod downloader;

/// Paged history retrieval
pub mod fetcher;

/// Metrics instrumentation
pub mod metrics;

/// Log output
pub mod output;

/// Graceful shutdown coordination
pub mod shutdown;

/// Time window resolution
pub mod window;

pub use address::DeviceAddress;
pub use window::TimeWindow;

/// One device-reported sample.
///
/// Field cardinality is fixed per device/channel and opaque to this crate: the
/// values are forwarded in the order the device reported them. `None` marks a
/// value the device reported as null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Sample timestamp (Unix epoch seconds)
    pub timestamp: i64,
    /// Sample values in device order
    pub fields: Vec<Option<f64>>,
}

impl TelemetryRecord {
    /// Create a record from a timestamp and its values
    pub fn new(timestamp: i64, fields: Vec<Option<f64>>) -> Self {
        Self { timestamp, fields }
    }

    /// Sample timestamp as a UTC datetime, if it is in range
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

/// Identity of the device a session is connected to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// MAC address as reported by the device (e.g., "A8032ABE54DC")
    pub mac: String,
    /// Hardware model (e.g., "SPEM-003CEBEU")
    pub model: String,
    /// Firmware build identifier
    pub firmware_id: String,
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MAC={}, Model={}, FW={}", self.mac, self.model, self.firmware_id)
    }
}
