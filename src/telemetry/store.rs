//! # Telemetry Store
//!
//! Last-value-wins cache of the three telemetry fields.
//!
//! The store is the only shared telemetry state in the process. It is owned
//! by whoever builds the gateway and handed out as `Arc<TelemetryStore>` to
//! the ingestion loop, the uploader and request handlers.
//!
//! Fields are never cleared. A sensor that goes silent keeps reporting its
//! last value; callers that care about staleness read `updated_at`.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::reading::{Field, Reading};

/// A stored field value with the time it was accepted
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldValue {
    pub value: f64,
    pub updated_at: DateTime<Utc>,
}

/// The store's belief at a single instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub temperature: Option<FieldValue>,
    pub humidity: Option<FieldValue>,
    pub tilt: Option<FieldValue>,
}

impl TelemetrySnapshot {
    fn slot_mut(&mut self, field: Field) -> &mut Option<FieldValue> {
        match field {
            Field::Temperature => &mut self.temperature,
            Field::Humidity => &mut self.humidity,
            Field::Tilt => &mut self.tilt,
        }
    }

    /// Get one stored field
    pub fn field(&self, field: Field) -> Option<FieldValue> {
        match field {
            Field::Temperature => self.temperature,
            Field::Humidity => self.humidity,
            Field::Tilt => self.tilt,
        }
    }

    /// Plain values, in the `{temperature, humidity, tilt}` wire shape
    pub fn values(&self) -> Reading {
        let mut reading = Reading::new();
        for field in Field::ALL {
            reading.set(field, self.field(field).map(|f| f.value));
        }
        reading
    }

    /// True when no field has ever been set
    pub fn is_empty(&self) -> bool {
        Field::ALL.iter().all(|f| self.field(*f).is_none())
    }

    /// Most recent update time across all fields
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        Field::ALL
            .iter()
            .filter_map(|f| self.field(*f))
            .map(|f| f.updated_at)
            .max()
    }
}

/// Thread-safe latest-value store
///
/// A single `RwLock` guards all three fields, so one `update` is applied
/// as a unit and a `snapshot` never sees half of it. Readers share the lock
/// and only wait for the few stores an update performs.
#[derive(Debug, Default)]
pub struct TelemetryStore {
    inner: RwLock<TelemetrySnapshot>,
}

impl TelemetryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a partial reading
    ///
    /// Every present field overwrites the stored value; absent fields are
    /// left untouched.
    ///
    /// # Arguments
    ///
    /// * `reading` - Fields to apply
    ///
    /// # Returns
    ///
    /// * `usize` - Number of fields overwritten
    pub fn update(&self, reading: &Reading) -> usize {
        if reading.is_empty() {
            return 0;
        }

        let updated_at = Utc::now();
        // Values are plain data, so a poisoned lock still holds a usable snapshot
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        let mut applied = 0;
        for field in Field::ALL {
            if let Some(value) = reading.get(field) {
                *guard.slot_mut(field) = Some(FieldValue { value, updated_at });
                applied += 1;
            }
        }
        applied
    }

    /// Copy of all fields at a single instant
    pub fn snapshot(&self) -> TelemetrySnapshot {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}
