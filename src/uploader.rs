//! # Relay Uploader
//!
//! Pushes store snapshots to a remote gateway's update endpoint.
//!
//! Used when this process sits next to the hardware and the public gateway
//! does not. Delivery is at-most-once and latest-value-wins: a failed push is
//! dropped, never retried, and the next cycle sends whatever the store holds
//! by then. The cadence is fixed and independent of how fast lines arrive.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::UploaderConfig;
use crate::error::{GatewayError, Result};
use crate::shutdown::ShutdownSignal;
use crate::telemetry::{Reading, TelemetryStore};

/// Number of cycles between summary log lines
const LOG_INTERVAL_CYCLES: u64 = 600;

/// Remote endpoint accepting `{temperature, humidity, tilt}` payloads
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushTarget: Send + Sync {
    async fn push(&self, reading: &Reading) -> Result<()>;
}

/// Posts readings as JSON over HTTP
pub struct HttpPushTarget {
    agent: ureq::Agent,
    url: String,
}

impl HttpPushTarget {
    /// Create a target with a per-request timeout
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl PushTarget for HttpPushTarget {
    async fn push(&self, reading: &Reading) -> Result<()> {
        let body = serde_json::to_string(reading)
            .map_err(|e| GatewayError::UploadDelivery(e.to_string()))?;
        let agent = self.agent.clone();
        let url = self.url.clone();

        let response = tokio::task::spawn_blocking(move || {
            agent
                .post(&url)
                .set("Content-Type", "application/json")
                .send_string(&body)
        })
        .await
        .map_err(|e| GatewayError::UploadDelivery(format!("push task failed: {}", e)))?;

        match response {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, _)) => Err(GatewayError::UploadDelivery(format!(
                "{} returned status {}",
                self.url, code
            ))),
            Err(e) => Err(GatewayError::UploadDelivery(format!("{}: {}", self.url, e))),
        }
    }
}

/// What one upload cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Store was empty; nothing to send
    Skipped,
    Sent,
    Failed,
}

/// Periodic best-effort pusher
pub struct Uploader<T> {
    store: Arc<TelemetryStore>,
    target: T,
    period: Duration,
    sent: u64,
    failed: u64,
    skipped: u64,
}

impl Uploader<HttpPushTarget> {
    /// Create an HTTP uploader for the `[uploader]` section
    pub fn from_config(config: &UploaderConfig, store: Arc<TelemetryStore>) -> Self {
        Self::new(
            store,
            HttpPushTarget::new(config.url.clone(), Duration::from_millis(config.timeout_ms)),
            Duration::from_millis(config.interval_ms),
        )
    }
}

impl<T: PushTarget> Uploader<T> {
    /// Create an uploader
    ///
    /// # Arguments
    ///
    /// * `store` - Store to snapshot each cycle
    /// * `target` - Where snapshots go
    /// * `period` - Minimum time between cycles
    pub fn new(store: Arc<TelemetryStore>, target: T, period: Duration) -> Self {
        Self {
            store,
            target,
            period,
            sent: 0,
            failed: 0,
            skipped: 0,
        }
    }

    /// Snapshot the store and push it once
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let reading = self.store.snapshot().values();
        if reading.is_empty() {
            self.skipped += 1;
            return CycleOutcome::Skipped;
        }

        match self.target.push(&reading).await {
            Ok(()) => {
                self.sent += 1;
                CycleOutcome::Sent
            }
            Err(e) => {
                self.failed += 1;
                debug!("Dropped telemetry push: {}", e);
                CycleOutcome::Failed
            }
        }
    }

    /// Run until the shutdown signal fires
    pub async fn run(mut self, mut shutdown: ShutdownSignal) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles: u64 = 0;

        info!("Uploader started ({:?} cadence)", self.period);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.run_cycle().await;
            cycles += 1;

            if cycles % LOG_INTERVAL_CYCLES == 0 {
                info!(
                    "Uploader: {} sent, {} failed, {} skipped",
                    self.sent, self.failed, self.skipped
                );
            }
        }

        info!(
            "Uploader stopped ({} sent, {} failed, {} skipped)",
            self.sent, self.failed, self.skipped
        );
    }
}
