//! # Serial Link
//!
//! Opens the sensor unit's USB serial port.
//!
//! The receiver board prints one reading per line at 115200 baud, 8N1, no
//! flow control. Lines are a mix of JSON records and free text debug output.

use std::time::Duration;

use async_trait::async_trait;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use super::reader::LineReader;
use super::source_trait::{LineSource, LinkOpener};
use crate::config::LinkConfig;
use crate::error::{GatewayError, Result};

/// Default baud rate of the sensor receiver board
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Serial port opener
#[derive(Debug, Clone)]
pub struct SerialOpener {
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
    baud_rate: u32,
    read_timeout: Duration,
}

impl SerialOpener {
    /// Create an opener for a specific device
    ///
    /// # Arguments
    ///
    /// * `device_path` - Device path (e.g., "/dev/ttyUSB0")
    /// * `baud_rate` - Line speed
    /// * `read_timeout` - Bounded wait for one line
    pub fn new(device_path: impl Into<String>, baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            device_path: device_path.into(),
            baud_rate,
            read_timeout,
        }
    }

    /// Create an opener from the `[link]` section
    pub fn from_config(config: &LinkConfig) -> Self {
        Self::new(config.port.clone(), config.baud_rate, config.read_timeout())
    }

    /// Open the serial port with 8N1 settings
    ///
    /// # Returns
    ///
    /// * `Result<SerialStream>` - Opened serial port
    fn open_port(&self) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(&self.device_path, self.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                GatewayError::Serial(format!("Failed to open {}: {}", self.device_path, e))
            })?;

        Ok(port)
    }
}

#[async_trait]
impl LinkOpener for SerialOpener {
    async fn open(&mut self) -> Result<Box<dyn LineSource>> {
        debug!("Trying to open serial port: {}", self.device_path);

        match self.open_port() {
            Ok(port) => {
                info!(
                    "Opened serial link at {} ({} baud)",
                    self.device_path, self.baud_rate
                );
                Ok(Box::new(LineReader::new(
                    port,
                    self.read_timeout,
                    self.device_path.clone(),
                )))
            }
            Err(e) => {
                warn!("{}", e);
                Err(GatewayError::LinkUnavailable(self.device_path.clone()))
            }
        }
    }

    fn describe(&self) -> String {
        format!("serial {}", self.device_path)
    }
}
