//! Append-only report log written next to the operator configuration
//!
//! The report is the only place, besides the status LED, where an operator can
//! see what a provisioning pass did. Write failures are logged and otherwise
//! ignored; a half-written report must never stop the pass.

use anyhow::{Context, Result};
use log::{debug, error, warn};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Outcome of one external action
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionRecord {
    pub tag: String,
    pub command: String,
    pub output: Vec<u8>,
    pub failure: Option<String>,
}

impl ActionRecord {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

pub struct ReportLog<W: Write = BufWriter<File>> {
    writer: W,
}

impl ReportLog {
    /// Create (or truncate) the report file at `path`
    pub fn create(path: &Path) -> Result<Self> {
        let file =
            File::create(path).context(format!("failed to create report log {path:?}"))?;

        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> ReportLog<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Record a line written to the configuration file at `destination`
    pub fn record_line(&mut self, destination: &Path, line: &[u8]) {
        self.append(format!("{}: ", destination.display()).as_bytes());
        self.append(line);
        self.append(b"\n");
    }

    /// Record an external action and its captured output
    pub fn record_action(&mut self, record: &ActionRecord) {
        debug!("{} ({}): {:?}", record.tag, record.command, record.failure);

        if let Some(failure) = &record.failure {
            self.append(format!("{} exec fail: {failure}\n", record.tag).as_bytes());
        }

        self.append(format!("{} output:\n", record.tag).as_bytes());
        self.append(&record.output);
        self.append(b"\n");
    }

    /// Record a free-form note
    pub fn record_note(&mut self, note: &str) {
        self.append(format!("{note}\n").as_bytes());
    }

    /// Record the error that ends the pass
    pub fn record_error(&mut self, msg: &str, err: &anyhow::Error) {
        self.append(format!("ERROR: {msg}: {err:#}\n").as_bytes());
    }

    /// Flush and close the report, handing back the underlying writer
    pub fn close(mut self) -> W {
        if let Err(e) = self.writer.flush() {
            error!("failed to flush report log: {e:#}");
        }

        self.writer
    }

    fn append(&mut self, bytes: &[u8]) {
        if let Err(e) = self.writer.write_all(bytes) {
            warn!("failed to write report log: {e:#}");
        }
    }
}
