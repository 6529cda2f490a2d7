//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working gateway that reads `/dev/ttyUSB0` at 115200 baud.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{GatewayError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub substitute: SubstituteConfig,
    #[serde(default)]
    pub frames: FramesConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub uploader: UploaderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub status: StatusConfig,
}

/// Kind of hardware link carrying telemetry lines
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    #[default]
    Serial,
    Tcp,
}

/// Telemetry link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default)]
    pub kind: LinkKind,

    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_tcp_address")]
    pub address: String,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,
}

/// Substitute (synthetic) data configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SubstituteConfig {
    #[serde(default)]
    pub force: bool,

    #[serde(default = "default_substitute_line")]
    pub line: String,

    #[serde(default = "default_substitute_interval_ms")]
    pub interval_ms: u64,
}

/// Frame storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct FramesConfig {
    #[serde(default = "default_frames_dir")]
    pub dir: String,

    #[serde(default = "default_frame_extension")]
    pub extension: String,
}

/// Camera capture polling configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub capture_url: String,

    #[serde(default = "default_camera_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_camera_timeout_ms")]
    pub timeout_ms: u64,
}

/// Relay uploader configuration
#[derive(Debug, Deserialize, Clone)]
pub struct UploaderConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub url: String,

    #[serde(default = "default_upload_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_upload_timeout_ms")]
    pub timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default)]
    pub dir: Option<String>,
}

/// Periodic status line configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StatusConfig {
    #[serde(default = "default_status_log_interval_s")]
    pub log_interval_s: u64,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 115200 }
fn default_tcp_address() -> String { "127.0.0.1:7000".to_string() }
fn default_read_timeout_ms() -> u64 { 1000 }
fn default_retry_delay_ms() -> u64 { 100 }
fn default_reconnect_interval_ms() -> u64 { 1000 }
fn default_open_timeout_ms() -> u64 { 2000 }

fn default_substitute_line() -> String { "temp=25.4 hum=41.2 tilt=3.2".to_string() }
fn default_substitute_interval_ms() -> u64 { 1000 }

fn default_frames_dir() -> String { "./frames".to_string() }
fn default_frame_extension() -> String { "jpg".to_string() }

fn default_camera_interval_ms() -> u64 { 300 }
fn default_camera_timeout_ms() -> u64 { 5000 }

fn default_upload_interval_ms() -> u64 { 100 }
fn default_upload_timeout_ms() -> u64 { 500 }

fn default_log_level() -> String { "info".to_string() }

fn default_status_log_interval_s() -> u64 { 10 }

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            kind: LinkKind::default(),
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            address: default_tcp_address(),
            read_timeout_ms: default_read_timeout_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            open_timeout_ms: default_open_timeout_ms(),
        }
    }
}

impl Default for SubstituteConfig {
    fn default() -> Self {
        Self {
            force: false,
            line: default_substitute_line(),
            interval_ms: default_substitute_interval_ms(),
        }
    }
}

impl Default for FramesConfig {
    fn default() -> Self {
        Self {
            dir: default_frames_dir(),
            extension: default_frame_extension(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capture_url: String::new(),
            interval_ms: default_camera_interval_ms(),
            timeout_ms: default_camera_timeout_ms(),
        }
    }
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            interval_ms: default_upload_interval_ms(),
            timeout_ms: default_upload_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            log_interval_s: default_status_log_interval_s(),
        }
    }
}

impl LinkConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

/// Accepted serial baud rates
const VALID_BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600];

/// Accepted log levels
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn invalid(msg: impl std::fmt::Display) -> GatewayError {
    GatewayError::Config(toml::de::Error::custom(msg))
}

fn check_range(name: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(format!("{} must be between {} and {}", name, min, max)));
    }
    Ok(())
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
    /// use sensor_gateway::config::Config;
    ///
    /// let config = Config::load("config/gateway.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
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
        // Link
        if self.link.kind == LinkKind::Serial && self.link.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }
        if self.link.kind == LinkKind::Tcp && self.link.address.is_empty() {
            return Err(invalid("tcp address cannot be empty"));
        }
        if !VALID_BAUD_RATES.contains(&self.link.baud_rate) {
            return Err(invalid(format!(
                "baud_rate must be one of: {:?}",
                VALID_BAUD_RATES
            )));
        }
        check_range("read_timeout_ms", self.link.read_timeout_ms, 1, 10000)?;
        check_range("retry_delay_ms", self.link.retry_delay_ms, 1, 10000)?;
        check_range("reconnect_interval_ms", self.link.reconnect_interval_ms, 1, 60000)?;
        check_range("open_timeout_ms", self.link.open_timeout_ms, 1, 60000)?;

        // Substitute data
        if self.substitute.line.trim().is_empty() {
            return Err(invalid("substitute line cannot be empty"));
        }
        check_range("substitute interval_ms", self.substitute.interval_ms, 1, 60000)?;

        // Frames
        if self.frames.dir.is_empty() {
            return Err(invalid("frames dir cannot be empty"));
        }
        if self.frames.extension.is_empty()
            || !self.frames.extension.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(invalid("frames extension must be non-empty and alphanumeric"));
        }

        // Camera
        if self.camera.enabled && self.camera.capture_url.is_empty() {
            return Err(invalid("camera capture_url cannot be empty when enabled"));
        }
        check_range("camera interval_ms", self.camera.interval_ms, 1, 60000)?;
        check_range("camera timeout_ms", self.camera.timeout_ms, 1, 60000)?;

        // Uploader
        if self.uploader.enabled && self.uploader.url.is_empty() {
            return Err(invalid("uploader url cannot be empty when enabled"));
        }
        check_range("uploader interval_ms", self.uploader.interval_ms, 1, 60000)?;
        check_range("uploader timeout_ms", self.uploader.timeout_ms, 1, 60000)?;

        // Logging
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid("log level must be one of: trace, debug, info, warn, error"));
        }
        if matches!(&self.logging.dir, Some(dir) if dir.is_empty()) {
            return Err(invalid("logging dir cannot be empty when set"));
        }

        if self.status.log_interval_s == 0 {
            return Err(invalid("status log_interval_s must be greater than 0"));
        }

        Ok(())
    }
}
