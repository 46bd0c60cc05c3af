//! CLI error types and exit codes

use crate::downloader::FetchFailure;
use crate::window::WindowError;

/// Exit status for failed commands
pub const EXIT_FAILURE: i32 = 1;

/// Exit status for commands interrupted by Ctrl+C (128 + SIGINT)
pub const EXIT_CANCELLED: i32 = 130;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Fetch failed at a named stage
    #[error("{0}")]
    Fetch(#[from] FetchFailure),

    /// Window input rejected
    #[error("invalid window: {0}")]
    Window(#[from] WindowError),
}

impl CliError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Fetch(failure) if failure.is_cancelled() => EXIT_CANCELLED,
            _ => EXIT_FAILURE,
        }
    }
}
