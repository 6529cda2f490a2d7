//! # Line Parser Module
//!
//! Converts one line of link text into a partial [`Reading`].
//!
//! Two formats arrive on the same link:
//! - Structured records such as `{"temp": 25.4, "humid": 41.2, "tilt": 3.2}`
//! - Loosely formatted text such as `[DHT] Temp: 25.4 Hum: 41.2` or `tilt=7`
//!
//! Parsing runs in two stages. A brace-delimited line is first decoded as a
//! structured record; when that decode fails the line still goes through
//! pattern extraction. A line that decodes as a record is never re-scanned
//! with patterns. Parsing never fails: unusable input is [`ParseOutcome::NoMatch`].

pub mod pattern;
pub mod structured;

use crate::telemetry::Reading;

/// Result of parsing one line, tagged with the stage that produced it
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParseOutcome {
    /// The line decoded as a structured record (possibly with no known keys)
    Structured(Reading),
    /// Pattern extraction found at least one field
    Pattern(Reading),
    /// Nothing usable in the line
    NoMatch,
}

impl ParseOutcome {
    /// The parsed reading; empty for `NoMatch`
    pub fn reading(&self) -> Reading {
        match self {
            ParseOutcome::Structured(reading) | ParseOutcome::Pattern(reading) => *reading,
            ParseOutcome::NoMatch => Reading::new(),
        }
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ParseOutcome::Structured(_) => "structured",
            ParseOutcome::Pattern(_) => "pattern",
            ParseOutcome::NoMatch => "no-match",
        }
    }
}

/// Parse one line of link input
///
/// # Arguments
///
/// * `line` - Raw line, with or without the trailing newline
///
/// # Returns
///
/// * `ParseOutcome` - Reading tagged with the stage that produced it
///
/// # Examples
///
/// ```
/// use sensor_gateway::parser::{parse_line, ParseOutcome};
///
/// let outcome = parse_line("temp=25.4 hum=41.2 tilt=3.2");
/// assert!(matches!(outcome, ParseOutcome::Pattern(_)));
/// assert_eq!(outcome.reading().humidity, Some(41.2));
/// ```
pub fn parse_line(line: &str) -> ParseOutcome {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ParseOutcome::NoMatch;
    }

    if structured::looks_structured(trimmed) {
        if let Some(reading) = structured::decode(trimmed) {
            return ParseOutcome::Structured(reading);
        }
    }

    let reading = pattern::extract(trimmed);
    if reading.is_empty() {
        ParseOutcome::NoMatch
    } else {
        ParseOutcome::Pattern(reading)
    }
}
