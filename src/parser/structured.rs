//! # Structured Record Decoder
//!
//! Decodes brace-delimited JSON records emitted by the sensor firmware.

use serde_json::{Map, Value};

use crate::telemetry::{Field, Reading};

/// Record key for each field, in lookup order
const FIELD_KEYS: [(Field, &[&str]); 3] = [
    (Field::Temperature, &["temp"]),
    (Field::Humidity, &["humid"]),
    // Some firmware builds report the IMU roll axis instead of tilt
    (Field::Tilt, &["tilt", "roll"]),
];

/// Cheap format check: the line is a self-delimited record
pub fn looks_structured(line: &str) -> bool {
    line.starts_with('{') && line.ends_with('}')
}

/// Decode a record into a reading
///
/// # Arguments
///
/// * `line` - Trimmed, brace-delimited text
///
/// # Returns
///
/// * `Option<Reading>` - `None` when the text is not a JSON object; otherwise
///   the recognized numeric keys (unknown or non-numeric keys are absent)
pub fn decode(line: &str) -> Option<Reading> {
    let record: Map<String, Value> = serde_json::from_str(line).ok()?;

    let mut reading = Reading::new();
    for (field, keys) in FIELD_KEYS {
        let value = keys.iter().find_map(|key| record.get(*key).and_then(coerce_number));
        reading.set(field, value);
    }
    Some(reading)
}

/// Numeric coercion: JSON numbers and numeric strings, finite only
fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}
