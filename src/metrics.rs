//! Fetch instrumentation
//!
//! Metrics go through the `metrics` facade. Without an installed recorder
//! every call is a no-op, so library users opt in by installing their own
//! exporter before running a fetch.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;
use tracing::debug;

use crate::device::ChannelSelector;

/// History pages requested
pub const RPC_PAGES_TOTAL: &str = "rpc_pages_total";
/// Records received from devices
pub const RECORDS_FETCHED_TOTAL: &str = "records_fetched_total";
/// Fetches that ran to completion
pub const FETCHES_COMPLETED_TOTAL: &str = "fetches_completed_total";
/// Fetches that ended in an error, labelled by stage
pub const FETCHES_FAILED_TOTAL: &str = "fetches_failed_total";
/// Wall time of a fetch
pub const FETCH_DURATION_SECONDS: &str = "fetch_duration_seconds";

/// Register metric descriptions with the installed recorder
///
/// Call once after installing a recorder; harmless otherwise.
pub fn describe_metrics() {
    describe_counter!(RPC_PAGES_TOTAL, Unit::Count, "Total number of history pages requested");
    describe_counter!(
        RECORDS_FETCHED_TOTAL,
        Unit::Count,
        "Total number of telemetry records received"
    );
    describe_counter!(
        FETCHES_COMPLETED_TOTAL,
        Unit::Count,
        "Total number of fetches completed successfully"
    );
    describe_counter!(
        FETCHES_FAILED_TOTAL,
        Unit::Count,
        "Total number of failed fetches"
    );
    describe_histogram!(
        FETCH_DURATION_SECONDS,
        Unit::Seconds,
        "Fetch duration in seconds"
    );
    debug!("Metric descriptions registered");
}

/// Per-fetch metric recorder
pub struct FetchMetrics {
    channel: String,
    start_time: Instant,
}

impl FetchMetrics {
    /// Start tracking a fetch
    pub fn start(channel: ChannelSelector) -> Self {
        Self {
            channel: channel.to_string(),
            start_time: Instant::now(),
        }
    }

    /// Record one history page and the records it carried
    pub fn record_page(&self, records: u64) {
        counter!(RPC_PAGES_TOTAL, "channel" => self.channel.clone()).increment(1);
        counter!(RECORDS_FETCHED_TOTAL, "channel" => self.channel.clone()).increment(records);
    }

    /// Record successful completion
    pub fn record_success(&self) {
        counter!(FETCHES_COMPLETED_TOTAL, "channel" => self.channel.clone()).increment(1);
        histogram!(FETCH_DURATION_SECONDS, "outcome" => "success")
            .record(self.start_time.elapsed().as_secs_f64());
    }

    /// Record a failure at `stage`
    pub fn record_failure(&self, stage: &str) {
        counter!(
            FETCHES_FAILED_TOTAL,
            "channel" => self.channel.clone(),
            "stage" => stage.to_string(),
        )
        .increment(1);
        histogram!(FETCH_DURATION_SECONDS, "outcome" => "failure")
            .record(self.start_time.elapsed().as_secs_f64());
    }
}
