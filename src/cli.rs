//! # Command Line Interface
//!
//! Flags override the matching values from the TOML configuration.

use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::sink::RecordMode;

/// Configuration file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_PATH: &str = "voc-logger.toml";

#[derive(Parser, Debug, Clone)]
#[command(name = "voc-logger")]
#[command(author, version, about = "Capture serial sensor telemetry into a CSV file")]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Serial port (e.g. /dev/ttyACM0 or COM5)
    #[arg(long, short)]
    pub port: Option<String>,

    /// Baud rate
    #[arg(long, short)]
    pub baud: Option<u32>,

    /// Output CSV file
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Output column layout
    #[arg(long, short, value_enum)]
    pub mode: Option<RecordMode>,

    /// fsync the output file after every row
    #[arg(long)]
    pub sync: bool,
}

impl Cli {
    /// Build the effective configuration
    ///
    /// Reads `--config` if given (a missing file is an error), otherwise
    /// `voc-logger.toml` if present, otherwise built-in defaults. Flags are
    /// applied on top and the result is validated.
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load(DEFAULT_CONFIG_PATH)?,
            None => {
                debug!("No configuration file, using defaults");
                Config::default()
            }
        };

        if let Some(port) = &self.port {
            config.serial.port = port.clone();
        }
        if let Some(baud) = self.baud {
            config.serial.baud_rate = baud;
        }
        if let Some(output) = &self.output {
            config.output.path = output.clone();
        }
        if let Some(mode) = self.mode {
            config.output.mode = mode;
        }
        if self.sync {
            config.output.sync = true;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_flags_override_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[serial]\nport = \"/dev/ttyUSB0\"\nbaud_rate = 115200\n")
            .unwrap();
        temp_file.flush().unwrap();

        let cli = Cli::try_parse_from([
            "voc-logger",
            "--config",
            temp_file.path().to_str().unwrap(),
            "-p",
            "COM5",
            "-o",
            "run1.csv",
            "--mode",
            "minimal",
            "--sync",
        ])
        .unwrap();
        let config = cli.resolve_config().unwrap();

        assert_eq!(config.serial.port, "COM5");
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.output.path, PathBuf::from("run1.csv"));
        assert_eq!(config.output.mode, RecordMode::Minimal);
        assert!(config.output.sync);
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let cli = Cli::try_parse_from(["voc-logger", "-c", "/nonexistent/voc.toml"]).unwrap();
        assert!(cli.resolve_config().is_err());
    }

    #[test]
    fn test_invalid_override_fails_validation() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"").unwrap();

        let cli = Cli::try_parse_from([
            "voc-logger",
            "-c",
            temp_file.path().to_str().unwrap(),
            "--baud",
            "12345",
        ])
        .unwrap();
        assert!(cli.resolve_config().is_err());
    }

    #[test]
    fn test_unknown_mode_flag_rejected() {
        assert!(Cli::try_parse_from(["voc-logger", "--mode", "verbose"]).is_err());
    }
}
