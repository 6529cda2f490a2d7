//! # Error Types
//!
//! Custom error types for the sensor gateway using `thiserror`.
//!
//! Only [`GatewayError::EmptyPayload`] and [`GatewayError::FrameNotFound`] are
//! meant to reach a caller. Link and network failures are absorbed by the
//! component that hits them and turned into a degraded mode or a no-op.

use thiserror::Error;

/// Main error type for the sensor gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The telemetry link could not be opened
    #[error("Link unavailable: {0}")]
    LinkUnavailable(String),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// A read from an open link failed; the link stays open
    #[error("Transient read error: {0}")]
    TransientRead(#[source] std::io::Error),

    /// A frame upload carried no bytes
    #[error("Frame payload is empty")]
    EmptyPayload,

    /// No frame in memory and none persisted
    #[error("No frame available")]
    FrameNotFound,

    /// A camera capture request failed
    #[error("Camera error: {0}")]
    Camera(String),

    /// A best-effort push to the remote aggregator failed
    #[error("Upload delivery failed: {0}")]
    UploadDelivery(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the sensor gateway
pub type Result<T> = std::result::Result<T, GatewayError>;
