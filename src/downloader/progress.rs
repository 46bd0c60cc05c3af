//! Progress reporting for a running fetch.
//!
//! [`ProgressReporter`] enforces the rules every view relies on: the shown
//! percent never decreases within a fetch, and completion always renders
//! 100% even if the last page already reported it. Views decide how the
//! numbers reach the user.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use super::config::PROGRESS_LOG_STEP;
use crate::fetcher::FetchProgress;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}";

/// How progress is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ProgressMode {
    /// Interactive progress bar on stderr
    #[default]
    Bar,
    /// Log line every 10%
    Log,
    /// No progress output
    Off,
}

/// Renders progress updates
pub trait ProgressView: Send {
    /// Show `percent` (already monotonic) with the latest counters
    fn render(&mut self, percent: f64, progress: &FetchProgress);

    /// Show completion
    fn finish(&mut self, progress: &FetchProgress);

    /// The fetch ended without completing
    fn abandon(&mut self) {}
}

/// Monotonic progress reporter
pub struct ProgressReporter {
    view: Box<dyn ProgressView>,
    last_percent: Option<f64>,
    finished: bool,
}

impl ProgressReporter {
    /// Wrap a view
    pub fn new(view: Box<dyn ProgressView>) -> Self {
        Self {
            view,
            last_percent: None,
            finished: false,
        }
    }

    /// Reporter for a [`ProgressMode`]
    pub fn from_mode(mode: ProgressMode, label: impl Into<String>) -> Self {
        let view: Box<dyn ProgressView> = match mode {
            ProgressMode::Bar => Box::new(BarView::new(label.into())),
            ProgressMode::Log => Box::new(LogView::new(PROGRESS_LOG_STEP)),
            ProgressMode::Off => Box::new(OffView),
        };
        Self::new(view)
    }

    /// Report an update; returns the percent actually shown
    pub fn report(&mut self, progress: &FetchProgress) -> f64 {
        let shown = match self.last_percent {
            Some(last) => last.max(progress.percent_complete),
            None => progress.percent_complete,
        };
        self.last_percent = Some(shown);
        self.view.render(shown, progress);
        shown
    }

    /// Report completion at 100%
    pub fn finish(&mut self, progress: &FetchProgress) {
        let mut final_progress = *progress;
        final_progress.percent_complete = 100.0;
        self.last_percent = Some(100.0);
        self.finished = true;
        self.view.finish(&final_progress);
    }

    /// Highest percent shown so far
    pub fn last_percent(&self) -> Option<f64> {
        self.last_percent
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if !self.finished {
            self.view.abandon();
        }
    }
}

fn counters_message(progress: &FetchProgress) -> String {
    format!(
        "{} records, {} calls",
        progress.items_returned, progress.calls_made
    )
}

/// indicatif progress bar scaled to 100
pub struct BarView {
    bar: ProgressBar,
}

impl BarView {
    /// Create a bar with a leading label
    pub fn new(label: String) -> Self {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        bar.set_message(label);
        Self { bar }
    }
}

impl ProgressView for BarView {
    fn render(&mut self, percent: f64, progress: &FetchProgress) {
        self.bar.set_position(percent.floor() as u64);
        self.bar.set_message(counters_message(progress));
    }

    fn finish(&mut self, progress: &FetchProgress) {
        self.bar.set_position(100);
        self.bar.finish_with_message(counters_message(progress));
    }

    fn abandon(&mut self) {
        self.bar.abandon();
    }
}

/// Logs one line each time progress crosses a step
pub struct LogView {
    step: f64,
    last_logged: f64,
}

impl LogView {
    /// Log every `step` percent
    pub fn new(step: f64) -> Self {
        Self {
            step,
            last_logged: 0.0,
        }
    }
}

impl ProgressView for LogView {
    fn render(&mut self, percent: f64, progress: &FetchProgress) {
        if percent >= 100.0 || percent - self.last_logged < self.step {
            return;
        }
        self.last_logged = percent;
        info!(
            percent,
            calls = progress.calls_made,
            items = progress.items_returned,
            "[PROGRESS] {percent:.1}% complete"
        );
    }

    fn finish(&mut self, progress: &FetchProgress) {
        info!(
            calls = progress.calls_made,
            items = progress.items_returned,
            "[PROGRESS] 100.0% complete"
        );
    }
}

/// Discards progress
pub struct OffView;

impl ProgressView for OffView {
    fn render(&mut self, _percent: f64, _progress: &FetchProgress) {}

    fn finish(&mut self, _progress: &FetchProgress) {}
}
