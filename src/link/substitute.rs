//! # Substitute Source
//!
//! Deterministic synthetic telemetry used when no hardware link is available.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Interval, MissedTickBehavior};

use super::source_trait::{LineEvent, LineSource};
use crate::config::SubstituteConfig;
use crate::error::Result;

/// Emits one fixed line per interval, the first one immediately
pub struct SubstituteSource {
    line: String,
    period: Duration,
    ticker: Option<Interval>,
}

impl SubstituteSource {
    pub fn new(line: impl Into<String>, period: Duration) -> Self {
        Self {
            line: line.into(),
            period,
            ticker: None,
        }
    }

    /// Create a source from the `[substitute]` section
    pub fn from_config(config: &SubstituteConfig) -> Self {
        Self::new(config.line.clone(), Duration::from_millis(config.interval_ms))
    }
}

#[async_trait]
impl LineSource for SubstituteSource {
    async fn next_line(&mut self) -> Result<LineEvent> {
        // Created on first use so the source can be built outside a runtime
        let period = self.period;
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        ticker.tick().await;
        Ok(LineEvent::Line(self.line.clone()))
    }

    fn describe(&self) -> String {
        format!("substitute data every {:?}", self.period)
    }
}
