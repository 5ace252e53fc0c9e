//! Timing series output.
//!
//! Finished series are appended to a [`SeriesLog`], which keeps them in
//! memory and forwards a copy to any attached [`SeriesSink`]s. The built-in
//! sink writes JSON lines, one series per line. Formatting and statistics
//! are left to downstream tools.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::harness::{CallKind, HarnessError, TimingSeries};

/// A sink that receives finished series.
pub trait SeriesSink {
    fn append(&mut self, record: &SeriesRecord) -> Result<(), HarnessError>;
}

/// A serialisable snapshot of one [`TimingSeries`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesRecord {
    pub kind: CallKind,
    /// When the series was reported.
    pub recorded_at: DateTime<Utc>,
    /// Elapsed time of each call, in nanoseconds, in issue order.
    pub samples_ns: Vec<u64>,
}

impl From<&TimingSeries> for SeriesRecord {
    fn from(series: &TimingSeries) -> Self {
        Self {
            kind: series.kind(),
            recorded_at: Utc::now(),
            samples_ns: series
                .iter()
                .map(|sample| u64::try_from(sample.as_nanos()).unwrap_or(u64::MAX))
                .collect(),
        }
    }
}

/// Every series reported in a run, plus optional forwarding sinks.
#[derive(Default)]
pub struct SeriesLog {
    records: Vec<SeriesRecord>,
    forward_sinks: Vec<Box<dyn SeriesSink>>,
}

impl std::fmt::Debug for SeriesLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeriesLog")
            .field("records", &self.records)
            .field("forward_sinks", &self.forward_sinks.len())
            .finish()
    }
}

impl SeriesLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink to receive a copy of every record.
    pub fn add_forward_sink(&mut self, sink: Box<dyn SeriesSink>) {
        self.forward_sinks.push(sink);
    }

    /// Record a series and forward it to every attached sink.
    pub fn append(&mut self, series: &TimingSeries) -> Result<(), HarnessError> {
        let record = SeriesRecord::from(series);
        for sink in self.forward_sinks.iter_mut() {
            sink.append(&record)?;
        }
        self.records.push(record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SeriesRecord> {
        self.records.iter()
    }
}

// ---------------------------------------------------------------------------
// Built-in sink: JSON lines
// ---------------------------------------------------------------------------

/// Writes each record as one JSON line to any writer.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<File> {
    /// Open or create a file; records are appended.
    pub fn append_to(path: impl AsRef<Path>) -> Result<Self, io::Error> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl JsonLinesSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> SeriesSink for JsonLinesSink<W> {
    fn append(&mut self, record: &SeriesRecord) -> Result<(), HarnessError> {
        let line = serde_json::to_string(record)?;
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        Ok(())
    }
}
