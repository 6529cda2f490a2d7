//! # Pattern Extractor
//!
//! Pulls fields out of loosely formatted text (`temp=25.4 hum=41.2`,
//! `[MPU] Roll: -3.1`, ...). Each field has an ordered alias set followed by a
//! separator (`:`, `=` or whitespace) and a signed decimal number.

use std::sync::OnceLock;

use regex::Regex;

use crate::telemetry::{Field, Reading};

/// Alias alternations; longer aliases come first so they win over prefixes
const FIELD_PATTERNS: [(Field, &str); 3] = [
    (Field::Temperature, r"(?i)(?:temperature|temp)[:=\s]+([-+]?\d+(?:\.\d*)?)"),
    (Field::Humidity, r"(?i)(?:humidity|humid|hum)[:=\s]+([-+]?\d+(?:\.\d*)?)"),
    (Field::Tilt, r"(?i)(?:tilt|angle|roll|pitch)[:=\s]+([-+]?\d+(?:\.\d*)?)"),
];

fn compiled() -> &'static [(Field, Regex)] {
    static PATTERNS: OnceLock<Vec<(Field, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        FIELD_PATTERNS
            .iter()
            .map(|(field, pattern)| {
                (*field, Regex::new(pattern).expect("field pattern is a valid regex"))
            })
            .collect()
    })
}

/// Extract every field whose pattern matches
///
/// The first match of each field wins; its first capture group is the value.
/// Digit runs too long for an `f64` are dropped rather than stored as infinity.
pub fn extract(text: &str) -> Reading {
    let mut reading = Reading::new();
    for (field, regex) in compiled() {
        let value = regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .filter(|v| v.is_finite());
        reading.set(*field, value);
    }
    reading
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_key_value_line() {
        let reading = extract("temp=25.4 hum=41.2 tilt=3.2");
        assert_eq!(reading.temperature, Some(25.4));
        assert_eq!(reading.humidity, Some(41.2));
        assert_eq!(reading.tilt, Some(3.2));
    }

    #[test]
    fn test_long_aliases() {
        let reading = extract("temperature: 19.0, humidity: 55.5");
        assert_eq!(reading.temperature, Some(19.0));
        assert_eq!(reading.humidity, Some(55.5));
    }

    #[test]
    fn test_tilt_aliases() {
        for (line, expected) in [
            ("tilt 4", 4.0),
            ("angle=-12.25", -12.25),
            ("Roll: 3.5", 3.5),
            ("PITCH=+8", 8.0),
        ] {
            assert_eq!(extract(line).tilt, Some(expected), "failed on {:?}", line);
        }
    }

    #[test]
    fn test_first_alias_in_text_wins() {
        let reading = extract("roll=1.0 pitch=2.0");
        assert_eq!(reading.tilt, Some(1.0));
    }

    #[test]
    fn test_signed_and_trailing_dot_numbers() {
        let reading = extract("temp=-5 hum=+40. tilt=0.0");
        assert_eq!(reading.temperature, Some(-5.0));
        assert_eq!(reading.humidity, Some(40.0));
        assert_eq!(reading.tilt, Some(0.0));
    }

    #[test]
    fn test_overflowing_number_is_absent() {
        let huge = "9".repeat(400);
        let reading = extract(&format!("temp={} hum=41.2", huge));
        assert_eq!(reading.temperature, None);
        assert_eq!(reading.humidity, Some(41.2));

        let reading = extract(&format!("tilt=-{}", huge));
        assert!(reading.is_empty());
    }

    #[test]
    fn test_missing_separator_does_not_match() {
        assert!(extract("temp25 hum41").is_empty());
    }

    #[test]
    fn test_missing_number_does_not_match() {
        assert!(extract("temp=abc humidity: n/a").is_empty());
    }

    #[test]
    fn test_units_after_number_are_ignored() {
        let reading = extract("[DHT] Temp: 23.1C Humidity: 48%");
        assert_eq!(reading.temperature, Some(23.1));
        assert_eq!(reading.humidity, Some(48.0));
    }
}
