//! Append-only observation logging.
//!
//! Every processed sample produces one [`ObservationRow`], alert or not, so
//! the log is a complete replayable history of what the monitor saw.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use wavewatch_types::ObservationRow;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("log write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("log row could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Destination for observation rows. Rows arrive in observation order and
/// are never rewritten.
pub trait ObservationSink: Send {
    fn append(&mut self, row: &ObservationRow) -> Result<(), SinkError>;
}

/// One JSON object per line, appended to a file.
///
/// The file is opened per append so an external rotation or truncation
/// between writes is picked up without restarting the monitor.
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ObservationSink for JsonlSink {
    fn append(&mut self, row: &ObservationRow) -> Result<(), SinkError> {
        // One write_all per row: with O_APPEND a row from another writer on
        // the same path cannot land mid-line.
        let mut line = serde_json::to_string(row)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// In-memory sink for tests; the shared handle outlives the sink.
#[derive(Clone, Default)]
pub struct MemorySink {
    rows: Arc<Mutex<Vec<ObservationRow>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<ObservationRow> {
        self.rows
            .lock()
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }
}

impl ObservationSink for MemorySink {
    fn append(&mut self, row: &ObservationRow) -> Result<(), SinkError> {
        if let Ok(mut rows) = self.rows.lock() {
            rows.push(row.clone());
        }
        Ok(())
    }
}
