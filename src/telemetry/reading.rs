//! # Reading
//!
//! One parsed telemetry observation with up to three optional fields.

use serde::{Deserialize, Serialize};

/// Telemetry field identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Temperature in °C
    Temperature,
    /// Relative humidity in %RH
    Humidity,
    /// Tilt angle in degrees
    Tilt,
}

impl Field {
    /// All fields, in wire order
    pub const ALL: [Field; 3] = [Field::Temperature, Field::Humidity, Field::Tilt];

    /// Name of the field on the wire
    pub fn name(self) -> &'static str {
        match self {
            Field::Temperature => "temperature",
            Field::Humidity => "humidity",
            Field::Tilt => "tilt",
        }
    }
}

/// A partial telemetry observation
///
/// Absent fields carry no information: they are neither "cleared" nor zero.
/// The serialized form is `{"temperature": number|null, "humidity": number|null,
/// "tilt": number|null}`, which is also the shape accepted by the push
/// endpoint of a remote gateway. Missing keys deserialize as absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reading {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub tilt: Option<f64>,
}

impl Reading {
    /// Create an empty reading
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value of one field
    pub fn get(&self, field: Field) -> Option<f64> {
        match field {
            Field::Temperature => self.temperature,
            Field::Humidity => self.humidity,
            Field::Tilt => self.tilt,
        }
    }

    /// Set the value of one field
    pub fn set(&mut self, field: Field, value: Option<f64>) {
        match field {
            Field::Temperature => self.temperature = value,
            Field::Humidity => self.humidity = value,
            Field::Tilt => self.tilt = value,
        }
    }

    /// Builder-style setter used by parsers and tests
    pub fn with(mut self, field: Field, value: f64) -> Self {
        self.set(field, Some(value));
        self
    }

    /// Number of fields present
    pub fn field_count(&self) -> usize {
        Field::ALL.iter().filter(|f| self.get(**f).is_some()).count()
    }

    /// True when no field is present
    pub fn is_empty(&self) -> bool {
        self.field_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_reading() {
        let reading = Reading::new();
        assert!(reading.is_empty());
        assert_eq!(reading.field_count(), 0);
    }

    #[test]
    fn test_builder_sets_fields() {
        let reading = Reading::new()
            .with(Field::Temperature, 25.4)
            .with(Field::Tilt, -3.0);

        assert_eq!(reading.temperature, Some(25.4));
        assert_eq!(reading.humidity, None);
        assert_eq!(reading.tilt, Some(-3.0));
        assert_eq!(reading.field_count(), 2);
    }

    #[test]
    fn test_serializes_absent_fields_as_null() {
        let reading = Reading::new().with(Field::Humidity, 41.2);
        let json = serde_json::to_value(reading).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"temperature": null, "humidity": 41.2, "tilt": null})
        );
    }

    #[test]
    fn test_deserializes_partial_payload() {
        let reading: Reading = serde_json::from_str(r#"{"tilt": 7.0}"#).unwrap();
        assert_eq!(reading, Reading::new().with(Field::Tilt, 7.0));
    }

    #[test]
    fn test_field_names() {
        let names: Vec<_> = Field::ALL.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["temperature", "humidity", "tilt"]);
    }
}
