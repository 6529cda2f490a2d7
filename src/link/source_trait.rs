//! Trait abstractions for the telemetry link to enable testing

use async_trait::async_trait;

use crate::error::Result;

/// One step of reading from a line source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// A complete line, without its terminator
    Line(String),
    /// The bounded wait elapsed without a complete line
    Idle,
    /// The far end closed the stream
    Closed,
}

/// Trait for newline-terminated text sources
///
/// `Err` from [`LineSource::next_line`] is a transient read failure: the
/// source stays usable and the caller is expected to retry.
#[async_trait]
pub trait LineSource: Send {
    /// Wait (bounded) for the next line
    async fn next_line(&mut self) -> Result<LineEvent>;

    /// Human-readable name for logs
    fn describe(&self) -> String;
}

/// Trait for opening a fresh line source
#[async_trait]
pub trait LinkOpener: Send {
    /// Open the link; fails with `LinkUnavailable`
    async fn open(&mut self) -> Result<Box<dyn LineSource>>;

    /// Human-readable name for logs
    fn describe(&self) -> String;
}
