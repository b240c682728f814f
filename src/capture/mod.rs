//! # Capture Module
//!
//! Long-running loop that turns serial lines into CSV rows.
//!
//! Lines that time out or fail to parse are skipped silently. Each accepted
//! record is written and flushed before the next line is read, and the loop
//! only ends when the cancel channel flips to `true` (or its sender is gone).

use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::Result;
use crate::parser::{parse_line, ParseOutcome};
use crate::serial::LineSource;
use crate::shutdown::cancelled;
use crate::sink::RecordSink;

/// Number of records between progress log messages
const LOG_INTERVAL_RECORDS: u64 = 1000;

/// Totals for one capture run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    /// Non-empty lines received
    pub lines_read: u64,
    pub records_written: u64,
    /// Non-empty lines that did not parse
    pub rejected: u64,
}

/// Capture records until cancelled
///
/// # Arguments
///
/// * `source` - Line source, read sequentially
/// * `sink` - Destination for accepted records
/// * `cancel` - Capture stops once this reads `true`
///
/// # Returns
///
/// * `Result<CaptureSummary>` - Totals at the time of cancellation
///
/// # Errors
///
/// Returns error if the source fails or a record cannot be written. The
/// caller owns the transport and must close it on this path.
pub async fn run_capture<S, K>(
    source: &mut S,
    sink: &mut K,
    cancel: &mut watch::Receiver<bool>,
) -> Result<CaptureSummary>
where
    S: LineSource + ?Sized,
    K: RecordSink + ?Sized,
{
    let mut summary = CaptureSummary::default();
    let mut last_log_count: u64 = 0;

    loop {
        // Only the read is cancellable; writes below always run to completion
        let raw = tokio::select! {
            biased;
            _ = cancelled(cancel) => {
                debug!("Capture cancelled");
                break;
            }
            line = source.read_line() => line?,
        };

        let line = raw.text().trim();
        if line.is_empty() {
            continue;
        }
        summary.lines_read += 1;

        let record = match parse_line(line) {
            ParseOutcome::Valid(record) => record,
            ParseOutcome::Rejected => {
                summary.rejected += 1;
                continue;
            }
        };

        sink.write_record(&record)?;
        summary.records_written += 1;

        if summary.records_written - last_log_count >= LOG_INTERVAL_RECORDS {
            info!(
                "Captured {} records ({} rejected lines)",
                summary.records_written, summary.rejected
            );
            last_log_count = summary.records_written;
        }
    }

    info!(
        "Capture finished: {} records written, {} of {} lines rejected",
        summary.records_written, summary.rejected, summary.lines_read
    );
    Ok(summary)
}
