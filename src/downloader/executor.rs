//! Fetch executor: resolve, connect, identify, stream, summarize, close
//!
//! The session is closed after every run, whether it succeeded, failed at
//! any stage, or was interrupted through the shutdown handle.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local, TimeZone};
use futures_util::StreamExt;
use tracing::{debug, error, info, warn, Instrument};

use super::config::MAX_PAGES;
use super::job::{FetchFailure, FetchJob, FetchStage, FetchSummary};
use super::progress::{ProgressMode, ProgressReporter};
use super::DownloadError;
use crate::device::{DeviceConnector, DeviceSession};
use crate::fetcher::{FetchEvent, FetchProgress, PeriodFetcher};
use crate::metrics::FetchMetrics;
use crate::output::{LogSink, RecordSink};
use crate::shutdown::SharedShutdown;
use crate::window::{resolve_window, TimeWindow};
use crate::DeviceIdentity;

/// What a completed session hands back for the summary
struct SessionOutcome {
    identity: DeviceIdentity,
    output_path: PathBuf,
    progress: FetchProgress,
}

/// Runs [`FetchJob`]s against devices reached through a connector
pub struct FetchExecutor {
    connector: Arc<dyn DeviceConnector>,
    progress_mode: ProgressMode,
    verbose: bool,
    max_pages: u64,
    shutdown: Option<SharedShutdown>,
}

impl FetchExecutor {
    /// Create an executor with bar progress and no shutdown handle
    pub fn new(connector: Arc<dyn DeviceConnector>) -> Self {
        Self {
            connector,
            progress_mode: ProgressMode::default(),
            verbose: false,
            max_pages: MAX_PAGES,
            shutdown: None,
        }
    }

    /// Select the progress view
    pub fn with_progress(mut self, mode: ProgressMode) -> Self {
        self.progress_mode = mode;
        self
    }

    /// Log full error detail on failure
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Override the page cap
    pub fn with_max_pages(mut self, max_pages: u64) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Attach a shared shutdown handle for cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Run a job with the window anchored at the current local time
    pub async fn execute(&self, job: &FetchJob) -> Result<FetchSummary, FetchFailure> {
        self.execute_at(job, Local::now()).await
    }

    /// Run a job with the window anchored at `now`
    ///
    /// # Errors
    /// Returns a [`FetchFailure`] naming the stage that failed. Records
    /// written before a failure stay in the output file.
    pub async fn execute_at<Tz: TimeZone>(
        &self,
        job: &FetchJob,
        now: DateTime<Tz>,
    ) -> Result<FetchSummary, FetchFailure> {
        let started = Instant::now();
        let metrics = FetchMetrics::start(job.channel);

        let window = match job
            .validate()
            .and_then(|()| Ok(resolve_window(&job.start_input, job.end_input.as_deref(), now)?))
        {
            Ok(window) => window,
            Err(error) => {
                let failure = FetchFailure::new(FetchStage::ResolvingWindow, error);
                self.log_failure(&failure);
                metrics.record_failure(failure.stage.as_str());
                return Err(failure);
            }
        };

        let span = tracing::info_span!(
            "fetch_period",
            device = %job.address,
            channel = %job.channel
        );

        self.execute_window(job, window, started, &metrics)
            .instrument(span)
            .await
    }

    async fn execute_window(
        &self,
        job: &FetchJob,
        window: TimeWindow,
        started: Instant,
        metrics: &FetchMetrics,
    ) -> Result<FetchSummary, FetchFailure> {
        info!(window = %window, "Fetching period");

        let mut session = DeviceSession::new(self.connector.clone(), job.address.clone());
        let mut stage = FetchStage::Connecting;

        let result = match &self.shutdown {
            Some(shutdown) => {
                tokio::select! {
                    biased;
                    _ = shutdown.wait_for_shutdown() => {
                        info!("Shutdown requested - abandoning fetch");
                        Err(DownloadError::Cancelled)
                    }
                    result = self.run_session(&mut session, job, &window, &mut stage, metrics) => {
                        result
                    }
                }
            }
            None => {
                self.run_session(&mut session, job, &window, &mut stage, metrics)
                    .await
            }
        };

        session.close().await;

        match result {
            Ok(outcome) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                let summary = FetchSummary::new(
                    window,
                    outcome.identity,
                    outcome.output_path,
                    &outcome.progress,
                    elapsed_ms,
                );
                metrics.record_success();
                info!(
                    calls = summary.calls_made,
                    items = summary.items_returned,
                    average = summary.average_items_per_call,
                    elapsed_ms,
                    "Fetch completed"
                );
                Ok(summary)
            }
            Err(error) => {
                let failure = FetchFailure::new(stage, error);
                self.log_failure(&failure);
                metrics.record_failure(stage.as_str());
                Err(failure)
            }
        }
    }

    async fn run_session(
        &self,
        session: &mut DeviceSession,
        job: &FetchJob,
        window: &TimeWindow,
        stage: &mut FetchStage,
        metrics: &FetchMetrics,
    ) -> Result<SessionOutcome, DownloadError> {
        *stage = FetchStage::Connecting;
        session.open().await?;

        *stage = FetchStage::Identifying;
        let identity = session.identity().await?;
        info!(device = %session.address(), identity = %identity, "Device identified");

        *stage = FetchStage::Fetching;
        let template = job.output_template();
        if !template.has_placeholder() {
            warn!(template = %template, "Output template has no [mac] placeholder");
        }
        let output_path = template.render(&identity.mac);
        let mut sink = LogSink::new(&output_path);
        if job.clear_existing {
            sink.clear();
        }
        sink.ensure_exists()?;
        info!(path = %sink.path().display(), "Writing records");

        let label = format!("{} ch {}", identity.mac, job.channel);
        let mut reporter = ProgressReporter::from_mode(self.progress_mode, label);
        let fetcher = PeriodFetcher::new(&*session, job.channel).with_max_pages(self.max_pages);
        let mut stream = fetcher.fetch(window);

        let mut pages_seen = 0u64;
        let mut items_seen = 0u64;
        let mut completed = None;

        while let Some(event) = stream.next().await {
            let event = event?;

            let progress = *event.progress();
            if progress.calls_made > pages_seen {
                metrics.record_page(progress.items_returned - items_seen);
                pages_seen = progress.calls_made;
                items_seen = progress.items_returned;
            }

            match event {
                FetchEvent::Record { record, progress } => {
                    sink.write_record(&record)?;
                    reporter.report(&progress);
                }
                FetchEvent::Progress(progress) => {
                    reporter.report(&progress);
                }
                FetchEvent::Complete(progress) => {
                    reporter.finish(&progress);
                    completed = Some(progress);
                }
            }
        }

        *stage = FetchStage::Summarizing;
        let progress = completed.ok_or_else(|| {
            DownloadError::Protocol("history ended without a completion signal".to_string())
        })?;
        debug!(written = sink.records_written(), "Sink finished");

        Ok(SessionOutcome {
            identity,
            output_path,
            progress,
        })
    }

    fn log_failure(&self, failure: &FetchFailure) {
        if self.verbose {
            error!(stage = %failure.stage, error = ?failure.error, "Fetch failed");
        } else {
            error!(stage = %failure.stage, error = %failure.error, "Fetch failed");
        }
    }
}
