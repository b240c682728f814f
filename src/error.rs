//! # Error Types
//!
//! Custom error types for VOC Logger using `thiserror`.
//!
//! Rejected lines are not errors; they are [`crate::parser::ParseOutcome::Rejected`]
//! values handled by the caller.

use thiserror::Error;

/// Main error type for VOC Logger
#[derive(Debug, Error)]
pub enum LoggerError {
    /// Serial transport errors (open, read, buffer control)
    #[error("Serial error: {0}")]
    Serial(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV output errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for VOC Logger
pub type Result<T> = std::result::Result<T, LoggerError>;
