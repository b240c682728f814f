//! # Line Parser Module
//!
//! Tolerant parsing of one telemetry line into a normalized [`Record`].
//!
//! Sensor sketches print readings in a handful of shapes. The rules below are
//! tried in order and the first one that produces a record wins:
//!
//! 1. `time_ms,sensor,value` (e.g. `92346,VOC,642`)
//! 2. `time_ms,value` (e.g. `1234,567`)
//! 3. Anything with at least two numbers in it (e.g. `t=1234 voc=567`): the
//!    first number is the timestamp, truncated toward zero, and the second
//!    is the value.
//!
//! A rule whose numeric conversion fails hands the line to the next rule.
//! Parsing never fails with an error; unusable lines come back as
//! [`ParseOutcome::Rejected`].
//!
//! ```
//! use voc_logger::parser::{parse_line, ParseOutcome, Record};
//!
//! assert_eq!(
//!     parse_line("92346,VOC,642"),
//!     ParseOutcome::Valid(Record::new(92346, "VOC", 642.0))
//! );
//! assert_eq!(parse_line("abc"), ParseOutcome::Rejected);
//! ```

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Optional sign, optional integer part, optional point, at least one digit
///
/// ASCII digits only, so every extracted token converts with `str::parse`.
const NUMERIC_TOKEN_PATTERN: &str = r"[-+]?[0-9]*\.?[0-9]+";

/// One normalized sensor reading
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Device timestamp in milliseconds
    pub timestamp_ms: i64,
    /// Sensor label, empty when the line did not carry one
    pub sensor: String,
    /// Measured value
    pub value: f64,
}

impl Record {
    /// Create a new record
    pub fn new(timestamp_ms: i64, sensor: impl Into<String>, value: f64) -> Self {
        Self {
            timestamp_ms,
            sensor: sensor.into(),
            value,
        }
    }

    /// Value rendered the way it is written to CSV
    ///
    /// Plain decimals keep a trailing `.0` (`642.0`). Very large and very
    /// small magnitudes use a signed, two-digit exponent (`1e+16`, `1.5e-05`),
    /// and non-finite values are `nan`, `inf` and `-inf`.
    pub fn value_text(&self) -> String {
        format_value(self.value)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.timestamp_ms, self.sensor, self.value_text())
    }
}

/// Result of parsing a single line
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// The line produced a complete record
    Valid(Record),
    /// The line is malformed, has the wrong shape, or lacks numbers
    Rejected,
}

impl ParseOutcome {
    /// Convert into an `Option`, dropping the rejection
    pub fn into_record(self) -> Option<Record> {
        match self {
            ParseOutcome::Valid(record) => Some(record),
            ParseOutcome::Rejected => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ParseOutcome::Valid(_))
    }
}

impl From<Option<Record>> for ParseOutcome {
    fn from(record: Option<Record>) -> Self {
        record.map_or(ParseOutcome::Rejected, ParseOutcome::Valid)
    }
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    // Debug output is the shortest round-trip form and switches to
    // exponent notation outside 1e-4..1e16
    let text = format!("{:?}", value);
    let Some((mantissa, exponent)) = text.split_once('e') else {
        return text;
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    format!("{}e{}{:0>2}", mantissa, sign, digits)
}

fn numeric_token_regex() -> &'static Regex {
    static NUMERIC_TOKEN: OnceLock<Regex> = OnceLock::new();
    NUMERIC_TOKEN.get_or_init(|| {
        Regex::new(NUMERIC_TOKEN_PATTERN).expect("numeric token pattern is valid")
    })
}

/// Parse one trimmed telemetry line
///
/// # Arguments
///
/// * `line` - Line text with the trailing newline and surrounding whitespace removed
///
/// # Returns
///
/// * `ParseOutcome` - `Valid` with the normalized record, or `Rejected`
pub fn parse_line(line: &str) -> ParseOutcome {
    if line.is_empty() {
        return ParseOutcome::Rejected;
    }

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();

    parse_labeled_row(&fields)
        .or_else(|| parse_pair_row(&fields))
        .or_else(|| parse_numeric_tokens(line))
        .into()
}

/// Rule 1: `time_ms,sensor,value`
fn parse_labeled_row(fields: &[&str]) -> Option<Record> {
    let [time, sensor, value] = fields else {
        return None;
    };
    if time.is_empty() || sensor.is_empty() || value.is_empty() {
        return None;
    }

    let timestamp_ms = time.parse::<i64>().ok()?;
    let value = value.parse::<f64>().ok()?;
    Some(Record::new(timestamp_ms, *sensor, value))
}

/// Rule 2: `time_ms,value`
fn parse_pair_row(fields: &[&str]) -> Option<Record> {
    let [time, value] = fields else {
        return None;
    };
    if time.is_empty() || value.is_empty() {
        return None;
    }

    let timestamp_ms = time.parse::<i64>().ok()?;
    let value = value.parse::<f64>().ok()?;
    Some(Record::new(timestamp_ms, "", value))
}

/// Rule 3: first two numbers anywhere on the line
fn parse_numeric_tokens(line: &str) -> Option<Record> {
    let mut tokens = numeric_token_regex().find_iter(line).map(|m| m.as_str());
    let time = tokens.next()?;
    let value = tokens.next()?;

    let timestamp_ms = truncate_to_millis(time.parse::<f64>().ok()?)?;
    let value = value.parse::<f64>().ok()?;
    Some(Record::new(timestamp_ms, "", value))
}

/// Truncate toward zero, refusing values that do not fit an `i64`
fn truncate_to_millis(raw: f64) -> Option<i64> {
    let truncated = raw.trunc();
    if !truncated.is_finite() || truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return None;
    }
    Some(truncated as i64)
}
