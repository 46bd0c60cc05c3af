//! Record output

use crate::TelemetryRecord;

pub mod log;
pub mod path;

pub use log::LogSink;
pub use path::OutputTemplate;

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV serialization error
    #[error("CSV error: {0}")]
    CsvError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for fetched records
pub trait RecordSink {
    /// Persist a single record
    fn write_record(&mut self, record: &TelemetryRecord) -> OutputResult<()>;

    /// Persist several records in order
    fn write_records(&mut self, records: &[TelemetryRecord]) -> OutputResult<()> {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    /// Number of records written so far
    fn records_written(&self) -> u64;
}
