//! # Serial Communication Module
//!
//! Handles the serial link to the sensor board.
//!
//! This module handles:
//! - Opening the serial port (8N1, no flow control) at the configured baud rate
//! - Splitting the byte stream into lines with a per-read timeout
//! - Discarding stale input before the preflight check

pub mod line_source;

pub use line_source::{LineReader, LineSource, RawLine};

use async_trait::async_trait;
use std::time::Duration;
use tokio_serial::SerialPort;
use tracing::{debug, info};

use crate::error::{LoggerError, Result};

/// Sensor board connected over a serial port
pub struct SensorSerial {
    /// Line reader over the serial port handle
    reader: LineReader<tokio_serial::SerialStream>,
    /// Device path (e.g., /dev/ttyACM0 or COM5)
    device_path: String,
    baud_rate: u32,
}

impl std::fmt::Debug for SensorSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorSerial")
            .field("device_path", &self.device_path)
            .field("baud_rate", &self.baud_rate)
            .finish_non_exhaustive()
    }
}

impl SensorSerial {
    /// Open connection to the sensor board
    ///
    /// # Arguments
    ///
    /// * `path` - Device path (e.g., "/dev/ttyACM0")
    /// * `baud_rate` - Line speed the board prints at
    /// * `read_timeout` - Longest a single `read_line` call may wait
    ///
    /// # Errors
    ///
    /// Returns `LoggerError::Serial` if the port cannot be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::time::Duration;
    /// use voc_logger::serial::SensorSerial;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let serial = SensorSerial::open("/dev/ttyACM0", 9600, Duration::from_secs(1))?;
    ///     println!("Connected to: {}", serial.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(path: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self> {
        debug!("Trying to open serial port: {} @ {}", path, baud_rate);
        let port = Self::open_port(path, baud_rate)?;
        info!("Successfully opened serial port {} @ {}", path, baud_rate);

        Ok(Self {
            reader: LineReader::new(port, read_timeout),
            device_path: path.to_string(),
            baud_rate,
        })
    }

    /// Open a specific serial port with 8N1 settings
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        use tokio_serial::SerialPortBuilderExt;

        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| LoggerError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Close the port
    ///
    /// Dropping the handle closes it as well; this makes the point explicit
    /// in shutdown paths.
    pub fn close(self) {
        info!("Closed serial port {}", self.device_path);
    }
}

#[async_trait]
impl LineSource for SensorSerial {
    async fn read_line(&mut self) -> Result<RawLine> {
        self.reader.read_line().await
    }

    fn discard_buffered(&mut self) -> Result<()> {
        self.reader.clear();
        self.reader
            .get_ref()
            .clear(tokio_serial::ClearBuffer::Input)
            .map_err(|e| LoggerError::Serial(format!("Failed to clear input buffer: {}", e)))
    }
}
