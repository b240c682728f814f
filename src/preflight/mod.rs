//! # Preflight Module
//!
//! Confirms that an opened serial port is actually producing usable readings
//! before the logger commits to a long capture.
//!
//! The check reads lines until one of three things happens:
//! - enough lines parse: pass immediately, without using the rest of the budget
//! - the time budget runs out
//! - the line budget runs out
//!
//! A failed check distinguishes a silent port (no bytes at all, usually the
//! wrong port, baud rate or cable) from a chatty port whose lines never parse
//! (usually the wrong sketch or line format). The second case carries the
//! first few raw lines so the operator can see what the board is printing.

use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::parser::{parse_line, ParseOutcome, Record};
use crate::serial::LineSource;
use crate::shutdown::cancelled;

/// Limits for a single preflight run
#[derive(Debug, Clone, PartialEq)]
pub struct PreflightBudget {
    /// Stop sampling once this much time has passed
    pub max_elapsed: Duration,
    /// Stop sampling after this many reads, timeouts included
    pub max_lines: usize,
    /// Valid rows needed to pass
    pub min_valid_rows: usize,
    /// Raw lines kept for diagnostics
    pub sample_capacity: usize,
}

/// Why a preflight check failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Not a single byte arrived
    NoData,
    /// Bytes arrived but no line parsed
    Unparseable,
}

impl FailureReason {
    /// Process exit status reported for this failure
    pub fn exit_code(self) -> i32 {
        match self {
            FailureReason::NoData => 2,
            FailureReason::Unparseable => 3,
        }
    }
}

/// Counters collected during a failed check
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub lines_read: usize,
    pub bytes_read: usize,
    /// First non-empty lines received, trimmed, in arrival order
    pub samples: Vec<String>,
    /// Time budget the check ran under
    pub window: Duration,
}

/// Outcome of a preflight run
#[derive(Debug, Clone, PartialEq)]
pub enum PreflightResult {
    Passed {
        /// First valid record seen
        sample: Record,
        valid_rows: usize,
    },
    Failed {
        reason: FailureReason,
        diagnostics: Diagnostics,
    },
}

impl PreflightResult {
    pub fn is_passed(&self) -> bool {
        matches!(self, PreflightResult::Passed { .. })
    }
}

impl fmt::Display for PreflightResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreflightResult::Passed { sample, valid_rows } => {
                write!(f, "Received {} valid row(s). Sample: {}", valid_rows, sample)
            }
            PreflightResult::Failed {
                reason: FailureReason::NoData,
                diagnostics,
            } => write!(
                f,
                "No data received within {:.1}s (read {} line(s), 0 bytes).",
                diagnostics.window.as_secs_f64(),
                diagnostics.lines_read
            ),
            PreflightResult::Failed {
                reason: FailureReason::Unparseable,
                diagnostics,
            } => {
                write!(
                    f,
                    "Data was received but no valid rows were parsed within {:.1}s (read {} line(s), {} bytes).",
                    diagnostics.window.as_secs_f64(),
                    diagnostics.lines_read,
                    diagnostics.bytes_read
                )?;
                if !diagnostics.samples.is_empty() {
                    write!(f, " Sample line(s): {}", diagnostics.samples.join(" | "))?;
                }
                Ok(())
            }
        }
    }
}

/// Mutable evidence gathered during one run
struct ValidatorState {
    started: Instant,
    lines_read: usize,
    bytes_read: usize,
    valid_rows: usize,
    first_valid: Option<Record>,
    samples: Vec<String>,
}

impl ValidatorState {
    fn new(sample_capacity: usize) -> Self {
        Self {
            started: Instant::now(),
            lines_read: 0,
            bytes_read: 0,
            valid_rows: 0,
            first_valid: None,
            samples: Vec::with_capacity(sample_capacity),
        }
    }

    fn exhausted(&self, budget: &PreflightBudget) -> bool {
        self.started.elapsed() >= budget.max_elapsed || self.lines_read >= budget.max_lines
    }

    fn into_failure(self, window: Duration) -> PreflightResult {
        let reason = if self.bytes_read == 0 {
            FailureReason::NoData
        } else {
            FailureReason::Unparseable
        };

        PreflightResult::Failed {
            reason,
            diagnostics: Diagnostics {
                lines_read: self.lines_read,
                bytes_read: self.bytes_read,
                samples: self.samples,
                window,
            },
        }
    }
}

/// Run the preflight check against a line source
///
/// # Arguments
///
/// * `source` - Line source, read sequentially
/// * `budget` - Time, line and sample limits for this run
///
/// # Returns
///
/// * `Result<PreflightResult>` - Pass or fail verdict
///
/// # Errors
///
/// Returns error only if the source itself fails; unusable data is a
/// `PreflightResult::Failed`, not an error.
pub async fn run_preflight<S>(source: &mut S, budget: &PreflightBudget) -> Result<PreflightResult>
where
    S: LineSource + ?Sized,
{
    if let Err(e) = source.discard_buffered() {
        debug!("Could not discard buffered input, continuing: {}", e);
    }

    info!(
        "Preflight: waiting up to {:?} / {} line(s) for {} valid row(s)",
        budget.max_elapsed, budget.max_lines, budget.min_valid_rows
    );

    let mut state = ValidatorState::new(budget.sample_capacity);

    while !state.exhausted(budget) {
        let raw = source.read_line().await?;
        state.lines_read += 1;
        if raw.is_empty() {
            continue;
        }

        state.bytes_read += raw.byte_len();

        let line = raw.text().trim();
        if line.is_empty() {
            continue;
        }

        if state.samples.len() < budget.sample_capacity {
            state.samples.push(line.to_string());
        }

        if let ParseOutcome::Valid(record) = parse_line(line) {
            state.valid_rows += 1;
            let sample = state.first_valid.get_or_insert(record);

            if state.valid_rows >= budget.min_valid_rows {
                info!(
                    "Preflight passed after {} line(s) ({} bytes)",
                    state.lines_read, state.bytes_read
                );
                return Ok(PreflightResult::Passed {
                    sample: sample.clone(),
                    valid_rows: state.valid_rows,
                });
            }
        }
    }

    warn!(
        "Preflight budget exhausted: {} line(s), {} bytes, {} valid row(s)",
        state.lines_read, state.bytes_read, state.valid_rows
    );
    Ok(state.into_failure(budget.max_elapsed))
}

/// Run the preflight check unless `cancel` fires first
///
/// # Returns
///
/// * `Result<Option<PreflightResult>>` - `None` if cancelled before a verdict
pub async fn run_preflight_until_cancelled<S>(
    source: &mut S,
    budget: &PreflightBudget,
    cancel: &mut watch::Receiver<bool>,
) -> Result<Option<PreflightResult>>
where
    S: LineSource + ?Sized,
{
    tokio::select! {
        biased;
        _ = cancelled(cancel) => {
            info!("Preflight cancelled");
            Ok(None)
        }
        result = run_preflight(source, budget) => result.map(Some),
    }
}
