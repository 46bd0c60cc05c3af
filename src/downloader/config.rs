//! Fetch configuration constants

use std::time::Duration;

/// Time allowed for the connection check to succeed.
/// Devices on the local network answer within milliseconds; 10 seconds covers
/// a device waking from Wi-Fi power save.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Time allowed for a single RPC call to complete.
/// A full history page can take several seconds to assemble on the device.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Upper bound on history pages per fetch.
/// At the device page size of several hundred records this covers years of
/// one-minute data; hitting it indicates a misbehaving cursor.
pub const MAX_PAGES: u64 = 10_000;

/// Progress log step in percent for the log progress view
pub const PROGRESS_LOG_STEP: f64 = 10.0;

/// Output filename template used when none is given
pub const DEFAULT_OUTPUT_TEMPLATE: &str = "[mac].log";

/// Highest selectable channel index
pub const MAX_CHANNEL: u8 = 2;

/// Connect timeout as a [`Duration`]
pub fn connect_timeout() -> Duration {
    Duration::from_secs(CONNECT_TIMEOUT_SECS)
}

/// Request timeout as a [`Duration`]
pub fn request_timeout() -> Duration {
    Duration::from_secs(REQUEST_TIMEOUT_SECS)
}
