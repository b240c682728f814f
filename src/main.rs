//! # VOC Logger
//!
//! Capture line-delimited sensor telemetry from a serial device into CSV.
//!
//! # Control Flow
//!
//! 1. **Startup**
//!    - Set up logging with tracing subscriber
//!    - Resolve configuration (file, then command line flags)
//!    - Open the serial port; exit with status 1 on failure
//!
//! 2. **Preflight**
//!    - Wait the settle delay (many boards reset when the port opens)
//!    - Sample lines until one parses or the budget runs out
//!    - Exit with status 2 (no data) or 3 (unparseable data) on failure
//!
//! 3. **Capture**
//!    - Append every valid line to the CSV file, flushing each row
//!    - Stop cleanly on Ctrl+C
//!
//! Ctrl+C is honoured from the moment the port is open. Stopping before
//! capture starts exits with status 0 and creates no CSV file. The serial
//! port is closed on every exit path after it was opened.
//!
//! Expected output:
//! ```text
//! INFO voc_logger: [OK] Opened serial port /dev/ttyACM0 @ 9600.
//! INFO voc_logger: [OK] Preflight check passed: Received 1 valid row(s). Sample: 92346,VOC,642.0
//! INFO voc_logger: [OK] Writing CSV to voc_data.csv...
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use voc_logger::capture::{run_capture, CaptureSummary};
use voc_logger::cli::Cli;
use voc_logger::config::Config;
use voc_logger::preflight::{run_preflight_until_cancelled, FailureReason, PreflightResult};
use voc_logger::serial::SensorSerial;
use voc_logger::shutdown::{cancelled, ctrl_c_channel};
use voc_logger::sink::CsvSink;

/// Exit status when the serial port cannot be opened
const EXIT_OPEN_FAILED: i32 = 1;

/// How a session with an open port ended
enum SessionEnd {
    Captured(CaptureSummary),
    PreflightFailed(FailureReason),
    /// Ctrl+C arrived before capture started
    Interrupted,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("VOC Logger v{} starting...", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let config = cli.resolve_config().context("Invalid configuration")?;

    let mut serial = match SensorSerial::open(
        &config.serial.port,
        config.serial.baud_rate,
        config.read_timeout(),
    ) {
        Ok(serial) => serial,
        Err(e) => {
            error!(
                "[FAIL] Could not open serial port {} @ {}: {}",
                config.serial.port, config.serial.baud_rate, e
            );
            std::process::exit(EXIT_OPEN_FAILED);
        }
    };
    info!(
        "[OK] Opened serial port {} @ {}.",
        serial.device_path(),
        serial.baud_rate()
    );

    let mut cancel = ctrl_c_channel();
    let outcome = run_session(&mut serial, &config, &mut cancel).await;
    serial.close();

    match outcome? {
        SessionEnd::Captured(summary) => {
            info!(
                "[OK] Stopped by user (Ctrl+C). {} record(s) written to {}.",
                summary.records_written,
                config.output.path.display()
            );
            Ok(())
        }
        SessionEnd::PreflightFailed(reason) => std::process::exit(reason.exit_code()),
        SessionEnd::Interrupted => {
            warn!("Stopped by user (Ctrl+C) before capture started. No CSV written.");
            Ok(())
        }
    }
}

/// Preflight, then capture until Ctrl+C
///
/// Never closes the port; `main` does that on every path.
async fn run_session(
    serial: &mut SensorSerial,
    config: &Config,
    cancel: &mut watch::Receiver<bool>,
) -> Result<SessionEnd> {
    tokio::select! {
        biased;
        _ = cancelled(cancel) => return Ok(SessionEnd::Interrupted),
        _ = tokio::time::sleep(config.settle_delay()) => {}
    }

    let result = run_preflight_until_cancelled(serial, &config.preflight_budget(), cancel)
        .await
        .context("Serial read failed during preflight")?;
    let Some(result) = result else {
        return Ok(SessionEnd::Interrupted);
    };

    if let PreflightResult::Failed { reason, .. } = &result {
        error!("[FAIL] Preflight check failed: {}", result);
        return Ok(SessionEnd::PreflightFailed(*reason));
    }
    info!("[OK] Preflight check passed: {}", result);

    let mut sink = CsvSink::create(&config.output.path, config.output.mode, config.output.sync)
        .with_context(|| format!("Could not create {}", config.output.path.display()))?;
    info!("[OK] Writing CSV to {}...", config.output.path.display());
    info!("Press Ctrl+C to stop");

    let summary = run_capture(serial, &mut sink, cancel)
        .await
        .context("Capture failed")?;

    Ok(SessionEnd::Captured(summary))
}
