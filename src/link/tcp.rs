//! # TCP Link
//!
//! Reads telemetry lines from a network bridge (e.g. a serial-to-WiFi module
//! exposing the receiver's output on a TCP port).

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::{debug, info};

use super::reader::LineReader;
use super::source_trait::{LineSource, LinkOpener};
use crate::config::LinkConfig;
use crate::error::{GatewayError, Result};

/// TCP link opener
#[derive(Debug, Clone)]
pub struct TcpOpener {
    address: String,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl TcpOpener {
    pub fn new(address: impl Into<String>, connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            connect_timeout,
            read_timeout,
        }
    }

    /// Create an opener from the `[link]` section
    pub fn from_config(config: &LinkConfig) -> Self {
        Self::new(config.address.clone(), config.open_timeout(), config.read_timeout())
    }
}

#[async_trait]
impl LinkOpener for TcpOpener {
    async fn open(&mut self) -> Result<Box<dyn LineSource>> {
        debug!("Connecting to {}", self.address);

        let stream = match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(GatewayError::LinkUnavailable(format!("{}: {}", self.address, e)));
            }
            Err(_) => {
                return Err(GatewayError::LinkUnavailable(format!(
                    "{}: connect timed out after {:?}",
                    self.address, self.connect_timeout
                )));
            }
        };

        // Small telemetry lines; do not let Nagle hold them back
        let _ = stream.set_nodelay(true);
        info!("Connected to telemetry bridge at {}", self.address);

        Ok(Box::new(LineReader::new(
            stream,
            self.read_timeout,
            format!("tcp {}", self.address),
        )))
    }

    fn describe(&self) -> String {
        format!("tcp {}", self.address)
    }
}
