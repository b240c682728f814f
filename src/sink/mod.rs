//! # Record Sink Module
//!
//! Append-only CSV output for parsed records.
//!
//! Two layouts are supported:
//! - `tolerant`: `time_ms,sensor,value`
//! - `minimal`: `time_ms,voc` (the sensor label is dropped)
//!
//! Every row is flushed before `write_record` returns, so an accepted record
//! survives the process dying right after it.

use serde::Deserialize;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

use crate::error::Result;
use crate::parser::Record;

/// Column layout of the output file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RecordMode {
    /// Two columns: timestamp and value
    Minimal,
    /// Three columns: timestamp, sensor label and value
    #[default]
    Tolerant,
}

impl RecordMode {
    /// Header row written when the sink is created
    pub fn header(self) -> &'static [&'static str] {
        match self {
            RecordMode::Minimal => &["time_ms", "voc"],
            RecordMode::Tolerant => &["time_ms", "sensor", "value"],
        }
    }

    /// Project a record onto this layout's columns
    pub fn row(self, record: &Record) -> Vec<String> {
        match self {
            RecordMode::Minimal => vec![record.timestamp_ms.to_string(), record.value_text()],
            RecordMode::Tolerant => vec![
                record.timestamp_ms.to_string(),
                record.sensor.clone(),
                record.value_text(),
            ],
        }
    }
}

/// Destination for accepted records
pub trait RecordSink {
    /// Append one record and make it durable before returning
    fn write_record(&mut self, record: &Record) -> Result<()>;
}

/// Output that can be pushed past the OS page cache
pub trait SyncTarget {
    fn sync(&self) -> io::Result<()>;
}

impl SyncTarget for File {
    fn sync(&self) -> io::Result<()> {
        self.sync_data()
    }
}

impl SyncTarget for Vec<u8> {
    fn sync(&self) -> io::Result<()> {
        Ok(())
    }
}

/// CSV writer with a per-row flush
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    mode: RecordMode,
    sync: bool,
    rows: u64,
}

impl CsvSink<File> {
    /// Create (or truncate) the output file and write the header
    ///
    /// # Arguments
    ///
    /// * `path` - Output CSV path
    /// * `mode` - Column layout
    /// * `sync` - fsync after each row in addition to flushing
    pub fn create<P: AsRef<Path>>(path: P, mode: RecordMode, sync: bool) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        debug!("Created output file {}", path.as_ref().display());
        Self::new(file, mode, sync)
    }
}

impl<W: Write + SyncTarget> CsvSink<W> {
    /// Wrap a writer and emit the header row
    pub fn new(inner: W, mode: RecordMode, sync: bool) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(inner);
        writer.write_record(mode.header())?;
        writer.flush()?;

        Ok(Self {
            writer,
            mode,
            sync,
            rows: 0,
        })
    }

    pub fn mode(&self) -> RecordMode {
        self.mode
    }

    /// Rows written so far, header excluded
    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    /// Flush and hand back the underlying writer
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| crate::error::LoggerError::Io(e.into_error()))
    }
}

impl<W: Write + SyncTarget> RecordSink for CsvSink<W> {
    fn write_record(&mut self, record: &Record) -> Result<()> {
        self.writer.write_record(self.mode.row(record))?;
        self.writer.flush()?;
        if self.sync {
            self.writer.get_ref().sync()?;
        }
        self.rows += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(sink: CsvSink<Vec<u8>>) -> String {
        String::from_utf8(sink.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_tolerant_header_and_rows() {
        let mut sink = CsvSink::new(Vec::new(), RecordMode::Tolerant, false).unwrap();
        sink.write_record(&Record::new(92346, "VOC", 642.0)).unwrap();
        sink.write_record(&Record::new(1234, "", 567.5)).unwrap();

        assert_eq!(sink.rows_written(), 2);
        assert_eq!(
            written(sink),
            "time_ms,sensor,value\n92346,VOC,642.0\n1234,,567.5\n"
        );
    }

    #[test]
    fn test_minimal_mode_drops_sensor() {
        let mut sink = CsvSink::new(Vec::new(), RecordMode::Minimal, false).unwrap();
        sink.write_record(&Record::new(1234, "VOC", 567.0)).unwrap();

        assert_eq!(written(sink), "time_ms,voc\n1234,567.0\n");
    }

    #[test]
    fn test_sensor_with_quote_is_escaped() {
        let mut sink = CsvSink::new(Vec::new(), RecordMode::Tolerant, false).unwrap();
        sink.write_record(&Record::new(1, "a\"b", 2.0)).unwrap();

        assert_eq!(written(sink), "time_ms,sensor,value\n1,\"a\"\"b\",2.0\n");
    }

    #[test]
    fn test_header_only_when_empty() {
        let sink = CsvSink::new(Vec::new(), RecordMode::Minimal, true).unwrap();
        assert_eq!(sink.rows_written(), 0);
        assert_eq!(written(sink), "time_ms,voc\n");
    }

    #[test]
    fn test_file_sink_rows_visible_before_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voc_data.csv");

        let mut sink = CsvSink::create(&path, RecordMode::Tolerant, true).unwrap();
        sink.write_record(&Record::new(100, "X", 1.5)).unwrap();

        // Read while the sink is still open
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "time_ms,sensor,value\n100,X,1.5\n");
        assert_eq!(sink.mode(), RecordMode::Tolerant);
    }

    #[test]
    fn test_create_truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voc_data.csv");
        std::fs::write(&path, "old contents\n").unwrap();

        let sink = CsvSink::create(&path, RecordMode::Minimal, false).unwrap();
        drop(sink);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "time_ms,voc\n");
    }

    #[test]
    fn test_create_in_missing_directory_fails() {
        let result = CsvSink::create("/nonexistent/dir/out.csv", RecordMode::Tolerant, false);
        assert!(matches!(result, Err(crate::error::LoggerError::Io(_))));
    }
}
