//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! usable configuration that matches the stock Arduino VOC sketch: 9600 baud,
//! one-second reads, a five-second preflight window.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{LoggerError, Result};
use crate::preflight::PreflightBudget;
use crate::sink::RecordMode;

/// Baud rates accepted for the sensor link
pub const SUPPORTED_BAUD_RATES: &[u32] = &[
    1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600,
];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub preflight: PreflightConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Upper bound on a single line read; a read that times out yields an empty line
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Preflight check configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PreflightConfig {
    /// Wait after opening the port, before sampling
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    #[serde(default = "default_preflight_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_lines")]
    pub max_lines: usize,

    #[serde(default = "default_min_valid_rows")]
    pub min_valid_rows: usize,

    #[serde(default = "default_sample_lines")]
    pub sample_lines: usize,
}

/// CSV output configuration
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    #[serde(default)]
    pub mode: RecordMode,

    /// fsync the file after every row, on top of the per-row flush
    #[serde(default)]
    pub sync: bool,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyACM0".to_string() }
fn default_baud_rate() -> u32 { 9600 }
fn default_timeout_ms() -> u64 { 1000 }

fn default_settle_ms() -> u64 { 1000 }
fn default_preflight_timeout_ms() -> u64 { 5000 }
fn default_max_lines() -> usize { 20 }
fn default_min_valid_rows() -> usize { 1 }
fn default_sample_lines() -> usize { 5 }

fn default_output_path() -> PathBuf { PathBuf::from("voc_data.csv") }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            timeout_ms: default_preflight_timeout_ms(),
            max_lines: default_max_lines(),
            min_valid_rows: default_min_valid_rows(),
            sample_lines: default_sample_lines(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            mode: RecordMode::default(),
            sync: false,
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> LoggerError {
    LoggerError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use voc_logger::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.trim().is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(format!(
                "baud_rate {} is not supported (expected one of {:?})",
                self.serial.baud_rate, SUPPORTED_BAUD_RATES
            )));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10_000 {
            return Err(invalid("serial timeout_ms must be between 1 and 10000"));
        }

        if self.preflight.settle_ms > 60_000 {
            return Err(invalid("settle_ms must be between 0 and 60000"));
        }

        if self.preflight.timeout_ms == 0 || self.preflight.timeout_ms > 600_000 {
            return Err(invalid("preflight timeout_ms must be between 1 and 600000"));
        }

        if self.preflight.max_lines == 0 {
            return Err(invalid("max_lines must be greater than 0"));
        }

        if self.preflight.min_valid_rows == 0 {
            return Err(invalid("min_valid_rows must be greater than 0"));
        }

        // Unreachable pass condition otherwise
        if self.preflight.min_valid_rows > self.preflight.max_lines {
            return Err(invalid("min_valid_rows cannot exceed max_lines"));
        }

        if self.preflight.sample_lines > 100 {
            return Err(invalid("sample_lines must be between 0 and 100"));
        }

        if self.output.path.as_os_str().is_empty() {
            return Err(invalid("output path cannot be empty"));
        }

        Ok(())
    }

    /// Per-read timeout for the serial line source
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.serial.timeout_ms)
    }

    /// Delay between opening the port and starting preflight
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.preflight.settle_ms)
    }

    /// Preflight budget derived from the `[preflight]` table
    pub fn preflight_budget(&self) -> PreflightBudget {
        PreflightBudget {
            max_elapsed: Duration::from_millis(self.preflight.timeout_ms),
            max_lines: self.preflight.max_lines,
            min_valid_rows: self.preflight.min_valid_rows,
            sample_capacity: self.preflight.sample_lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.output.mode, RecordMode::Tolerant);
        assert!(!config.output.sync);
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[serial]
port = "/dev/ttyUSB0"
baud_rate = 115200

[preflight]
min_valid_rows = 3

[output]
path = "readings.csv"
mode = "minimal"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.preflight.min_valid_rows, 3);
        assert_eq!(config.preflight.max_lines, 20);
        assert_eq!(config.output.path, PathBuf::from("readings.csv"));
        assert_eq!(config.output.mode, RecordMode::Minimal);
    }

    #[test]
    fn test_shipped_default_config_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml");
        let config = Config::load(path).unwrap();
        let defaults = Config::default();

        assert_eq!(config.serial.port, defaults.serial.port);
        assert_eq!(config.serial.timeout_ms, defaults.serial.timeout_ms);
        assert_eq!(config.preflight_budget(), defaults.preflight_budget());
        assert_eq!(config.output.path, defaults.output.path);
        assert_eq!(config.output.mode, defaults.output.mode);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = Config::load("/nonexistent/voc-logger.toml");
        assert!(matches!(result, Err(LoggerError::Io(_))));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let result = Config::from_toml_str("[output]\nmode = \"verbose\"\n");
        assert!(matches!(result, Err(LoggerError::Config(_))));
    }

    #[test]
    fn test_empty_serial_port() {
        let mut config = Config::default();
        config.serial.port = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = Config::default();
        config.serial.baud_rate = 420_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_baud_rates() {
        for &baud in SUPPORTED_BAUD_RATES {
            let mut config = Config::default();
            config.serial.baud_rate = baud;
            assert!(config.validate().is_ok(), "Baud rate {} should be valid", baud);
        }
    }

    #[test]
    fn test_timeout_ms_zero() {
        let mut config = Config::default();
        config.serial.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_ms_too_high() {
        let mut config = Config::default();
        config.serial.timeout_ms = 10_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_settle_is_allowed() {
        let mut config = Config::default();
        config.preflight.settle_ms = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_preflight_timeout_zero() {
        let mut config = Config::default();
        config.preflight.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_lines_zero() {
        let mut config = Config::default();
        config.preflight.max_lines = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_valid_rows_zero() {
        let mut config = Config::default();
        config.preflight.min_valid_rows = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_valid_rows_above_max_lines() {
        let mut config = Config::default();
        config.preflight.max_lines = 5;
        config.preflight.min_valid_rows = 6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sample_lines_too_high() {
        let mut config = Config::default();
        config.preflight.sample_lines = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_output_path() {
        let mut config = Config::default();
        config.output.path = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_preflight_budget_conversion() {
        let budget = Config::default().preflight_budget();
        assert_eq!(budget.max_elapsed, Duration::from_secs(5));
        assert_eq!(budget.max_lines, 20);
        assert_eq!(budget.min_valid_rows, 1);
        assert_eq!(budget.sample_capacity, 5);
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_serial_port(), "/dev/ttyACM0");
        assert_eq!(default_baud_rate(), 9600);
        assert_eq!(default_timeout_ms(), 1000);
        assert_eq!(default_settle_ms(), 1000);
        assert_eq!(default_preflight_timeout_ms(), 5000);
        assert_eq!(default_max_lines(), 20);
        assert_eq!(default_min_valid_rows(), 1);
        assert_eq!(default_sample_lines(), 5);
        assert_eq!(default_output_path(), PathBuf::from("voc_data.csv"));
    }
}
