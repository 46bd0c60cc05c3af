//! PeriodFetcher: drives the paged history call across one window

use futures_util::stream::{self, StreamExt};
use tracing::debug;

use super::{FetchEvent, FetchProgress, PeriodStream};
use crate::device::{
    ChannelSelector, DeviceError, DeviceResult, DeviceSession, PageCursor, PageRequest,
};
use crate::downloader::config::MAX_PAGES;
use crate::window::TimeWindow;

/// Pages through the history of one channel
///
/// Borrows the session for the lifetime of the stream it produces, so the
/// stream cannot outlive the connection.
pub struct PeriodFetcher<'a> {
    session: &'a DeviceSession,
    channel: ChannelSelector,
    max_pages: u64,
}

#[derive(Debug, Clone, Copy)]
struct PageState {
    cursor: Option<i64>,
    progress: FetchProgress,
    done: bool,
}

impl<'a> PeriodFetcher<'a> {
    /// Create a fetcher over an open session
    pub fn new(session: &'a DeviceSession, channel: ChannelSelector) -> Self {
        Self {
            session,
            channel,
            max_pages: MAX_PAGES,
        }
    }

    /// Override the page cap
    pub fn with_max_pages(mut self, max_pages: u64) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Stream every record of `window`
    ///
    /// One history call is made per page and never retried. A failed call
    /// is yielded as the last item; records already yielded stay delivered.
    /// The stream ends after a [`FetchEvent::Complete`] or an error.
    pub fn fetch(&self, window: &TimeWindow) -> PeriodStream<'a> {
        let session = self.session;
        let channel = self.channel;
        let max_pages = self.max_pages;
        let window_start = window.start_secs();
        let window_end = window.end_secs();
        let window_length = window_end - window_start;

        let initial = PageState {
            cursor: None,
            progress: FetchProgress::default(),
            done: false,
        };

        let stream = stream::unfold(initial, move |mut state| async move {
            if state.done {
                return None;
            }

            if window_length <= 0 {
                debug!(window_start, window_end, "Window is empty after conversion to seconds");
                state.progress.finish();
                state.done = true;
                let events = vec![Ok(FetchEvent::Complete(state.progress))];
                return Some((stream::iter(events), state));
            }

            if state.progress.calls_made >= max_pages {
                state.done = true;
                let err = DeviceError::Protocol(format!(
                    "page limit ({max_pages}) exceeded - possible infinite loop. Last cursor: {:?}",
                    state.cursor
                ));
                return Some((stream::iter(vec![Err(err)]), state));
            }

            let request = PageRequest {
                channel,
                window_start,
                window_end,
                cursor: state.cursor,
            };

            let page = match session.history_page(&request).await {
                Ok(page) => page,
                Err(e) => {
                    state.done = true;
                    return Some((stream::iter(vec![Err(e)]), state));
                }
            };

            state
                .progress
                .record_page(page.records.len(), page.position_consumed, window_length);

            let mut stuck = None;
            let finished = match page.next {
                PageCursor::Done => true,
                PageCursor::Next(next) if next >= window_end => true,
                PageCursor::Next(next) if next <= request.from_ts() => {
                    stuck = Some(DeviceError::Protocol(format!(
                        "cursor did not advance: requested from {}, device returned {next}",
                        request.from_ts()
                    )));
                    false
                }
                PageCursor::Next(next) => {
                    state.cursor = Some(next);
                    false
                }
            };

            debug!(
                page = state.progress.calls_made,
                cursor = ?page.next,
                records = page.records.len(),
                percent = state.progress.percent_complete,
                "Page fetched"
            );

            let progress = state.progress;
            let had_records = !page.records.is_empty();
            let mut events: Vec<DeviceResult<FetchEvent>> = page
                .records
                .into_iter()
                .map(|record| Ok(FetchEvent::Record { record, progress }))
                .collect();

            // Records already on this page are delivered before the error
            if let Some(err) = stuck {
                state.done = true;
                events.push(Err(err));
            } else if finished {
                state.progress.finish();
                state.done = true;
                events.push(Ok(FetchEvent::Complete(state.progress)));
            } else if !had_records {
                events.push(Ok(FetchEvent::Progress(progress)));
            }

            Some((stream::iter(events), state))
        })
        .flatten();

        Box::pin(stream)
    }
}
