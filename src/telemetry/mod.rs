//! # Telemetry Module
//!
//! Latest-known sensor values.
//!
//! This module handles:
//! - The partial `Reading` produced from one line of link input
//! - The `TelemetryStore` holding the last accepted value per field
//! - Consistent snapshots for any number of concurrent readers

pub mod reading;
pub mod store;

pub use reading::{Field, Reading};
pub use store::{FieldValue, TelemetrySnapshot, TelemetryStore};
