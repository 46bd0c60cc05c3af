//! Paged history retrieval
//!
//! [`period::PeriodFetcher`] turns a device's cursor-based history protocol
//! into a lazy stream of [`FetchEvent`]s. Records arrive in device order,
//! each tagged with the progress known after the page that carried it.

use crate::device::DeviceResult;
use crate::TelemetryRecord;
use futures_util::Stream;
use serde::Serialize;
use std::pin::Pin;

pub mod period;

pub use period::PeriodFetcher;

/// Progress of one fetch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct FetchProgress {
    /// Percent of the window served, `0..=100`, never decreasing
    pub percent_complete: f64,
    /// History calls issued so far
    pub calls_made: u64,
    /// Records returned so far
    pub items_returned: u64,
    /// `items_returned / calls_made`, zero before the first call
    pub average_items_per_call: f64,
}

impl FetchProgress {
    /// Account for one page
    ///
    /// `position_consumed` and `window_length` are in seconds. The percent
    /// is clamped to `0..=100` and never moves backwards.
    pub fn record_page(&mut self, items: usize, position_consumed: i64, window_length: i64) {
        self.calls_made += 1;
        self.items_returned += items as u64;
        self.average_items_per_call = self.items_returned as f64 / self.calls_made as f64;

        let raw = if window_length > 0 {
            (100.0 * position_consumed as f64 / window_length as f64).clamp(0.0, 100.0)
        } else {
            100.0
        };
        self.percent_complete = self.percent_complete.max(raw);
    }

    /// Mark the fetch as complete
    pub fn finish(&mut self) {
        self.percent_complete = 100.0;
    }
}

/// One element of a period stream
#[derive(Debug, Clone, PartialEq)]
pub enum FetchEvent {
    /// A record, with progress as of the page that carried it
    Record {
        /// The record
        record: TelemetryRecord,
        /// Progress after the carrying page
        progress: FetchProgress,
    },
    /// A page that carried no records but moved the cursor
    Progress(FetchProgress),
    /// Terminal event; `percent_complete` is 100
    Complete(FetchProgress),
}

impl FetchEvent {
    /// Progress carried by this event
    pub fn progress(&self) -> &FetchProgress {
        match self {
            FetchEvent::Record { progress, .. } => progress,
            FetchEvent::Progress(progress) | FetchEvent::Complete(progress) => progress,
        }
    }
}

/// Stream of fetch events borrowing a device session
pub type PeriodStream<'a> = Pin<Box<dyn Stream<Item = DeviceResult<FetchEvent>> + Send + 'a>>;
