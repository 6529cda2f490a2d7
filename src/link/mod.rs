//! # Link Module
//!
//! Line-oriented byte sources feeding the ingestion loop.
//!
//! This module handles:
//! - Opening the sensor link over USB serial or TCP
//! - Bounded-wait line reads with partial-line buffering
//! - Deterministic substitute data when no hardware is present
//! - The link state reported by the ingestion loop

pub mod reader;
pub mod serial;
pub mod source_trait;
pub mod substitute;
pub mod tcp;

use std::fmt;

use serde::Serialize;

use crate::config::{LinkConfig, LinkKind};

pub use reader::LineReader;
pub use serial::SerialOpener;
pub use source_trait::{LineEvent, LineSource, LinkOpener};
pub use substitute::SubstituteSource;
pub use tcp::TcpOpener;

/// State of the telemetry link, owned by the ingestion loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Disconnected,
    Connected,
    SubstituteMode,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Connected => "connected",
            LinkState::SubstituteMode => "substitute",
        };
        f.write_str(name)
    }
}

/// Build the opener selected by `[link] kind`
pub fn opener_from_config(config: &LinkConfig) -> Box<dyn LinkOpener> {
    match config.kind {
        LinkKind::Serial => Box::new(SerialOpener::from_config(config)),
        LinkKind::Tcp => Box::new(TcpOpener::from_config(config)),
    }
}
