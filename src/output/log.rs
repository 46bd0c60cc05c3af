//! Append-only delimited log sink
//!
//! Each record becomes one line `timestamp,field1,field2,...` with no header.
//! Null fields become empty tokens so the column count stays fixed. The sink
//! holds only the path: every line is written with a single append to a
//! freshly opened file, so no handle is held between records.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use csv::{Terminator, WriterBuilder};
use tracing::{debug, info, warn};

use super::{OutputError, OutputResult, RecordSink};
use crate::TelemetryRecord;

/// Serialize one record as a newline-terminated line
pub fn format_line(record: &TelemetryRecord) -> OutputResult<String> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::with_capacity(16 * (record.fields.len() + 1)));

    let row = std::iter::once(record.timestamp.to_string()).chain(
        record
            .fields
            .iter()
            .map(|field| field.map(|v| v.to_string()).unwrap_or_default()),
    );

    writer
        .write_record(row)
        .map_err(|e| OutputError::CsvError(format!("Failed to format record: {e}")))?;

    let bytes = writer
        .into_inner()
        .map_err(|e| OutputError::CsvError(format!("Failed to finish record: {e}")))?;

    String::from_utf8(bytes).map_err(|e| OutputError::CsvError(e.to_string()))
}

/// Log file sink
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    records_written: u64,
}

impl LogSink {
    /// Create a sink for `path`; nothing is touched on disk yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records_written: 0,
        }
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the destination before the first write
    ///
    /// A missing file is fine. Any other failure is logged as a warning and
    /// the run continues appending to whatever is there.
    pub fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!(path = %self.path.display(), "Cleared existing output"),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Nothing to clear")
            }
            Err(e) => warn!(path = %self.path.display(), error = %e, "Could not clear output file"),
        }
    }

    /// Create the destination (and its parent directories) if missing
    pub fn ensure_exists(&self) -> OutputResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| OutputError::IoError(format!("Failed to create directory: {e}")))?;
        }

        self.open_append().map(|_| ())
    }

    /// Append every record of `records` to the file at `path`
    pub fn write(path: impl Into<PathBuf>, records: &[TelemetryRecord]) -> OutputResult<Self> {
        let mut sink = Self::new(path);
        sink.ensure_exists()?;
        sink.write_records(records)?;
        Ok(sink)
    }

    fn open_append(&self) -> OutputResult<std::fs::File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                OutputError::IoError(format!("Failed to open {}: {e}", self.path.display()))
            })
    }
}

impl RecordSink for LogSink {
    fn write_record(&mut self, record: &TelemetryRecord) -> OutputResult<()> {
        let line = format_line(record)?;
        let mut file = self.open_append()?;
        file.write_all(line.as_bytes())
            .map_err(|e| OutputError::IoError(format!("Failed to append record: {e}")))?;
        self.records_written += 1;
        Ok(())
    }

    fn records_written(&self) -> u64 {
        self.records_written
    }
}
