//! # Camera Poller
//!
//! Pulls JPEG snapshots from the camera module's capture endpoint and feeds
//! them to the frame cache.
//!
//! Used when the camera cannot push uploads itself. Every failure (timeout,
//! non-200 response, empty body) is logged and the next tick tries again.

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::CameraConfig;
use crate::error::{GatewayError, Result};
use crate::frames::FrameCache;
use crate::shutdown::ShutdownSignal;

/// Largest snapshot accepted from the camera
pub const MAX_FRAME_BYTES: u64 = 5 * 1024 * 1024;

/// Number of failed fetches between warnings
const WARN_EVERY_FAILURES: u64 = 50;

/// Source of single camera snapshots
#[async_trait]
pub trait FrameFetcher: Send + Sync {
    async fn fetch(&self) -> Result<Bytes>;
}

/// Fetches snapshots over HTTP
pub struct HttpFrameFetcher {
    agent: ureq::Agent,
    url: String,
}

impl HttpFrameFetcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            url: url.into(),
        }
    }
}

fn fetch_snapshot(agent: &ureq::Agent, url: &str) -> Result<Bytes> {
    let response = agent
        .get(url)
        .call()
        .map_err(|e| GatewayError::Camera(format!("fetch snapshot from {}: {}", url, e)))?;

    read_capped(response.into_reader(), MAX_FRAME_BYTES)
}

/// Read a whole body, rejecting (not truncating) anything over `limit`
fn read_capped(reader: impl Read, limit: u64) -> Result<Bytes> {
    let mut bytes = Vec::new();
    reader
        .take(limit + 1)
        .read_to_end(&mut bytes)
        .map_err(|e| GatewayError::Camera(format!("read snapshot: {}", e)))?;

    if bytes.len() as u64 > limit {
        return Err(GatewayError::Camera(format!(
            "snapshot exceeds {} bytes",
            limit
        )));
    }
    Ok(Bytes::from(bytes))
}

#[async_trait]
impl FrameFetcher for HttpFrameFetcher {
    async fn fetch(&self) -> Result<Bytes> {
        let agent = self.agent.clone();
        let url = self.url.clone();
        tokio::task::spawn_blocking(move || fetch_snapshot(&agent, &url))
            .await
            .map_err(|e| GatewayError::Camera(format!("capture task failed: {}", e)))?
    }
}

/// Periodic snapshot puller
pub struct CameraPoller {
    fetcher: Box<dyn FrameFetcher>,
    frames: Arc<FrameCache>,
    period: Duration,
}

impl CameraPoller {
    pub fn new(fetcher: Box<dyn FrameFetcher>, frames: Arc<FrameCache>, period: Duration) -> Self {
        Self {
            fetcher,
            frames,
            period,
        }
    }

    /// Create a poller for the `[camera]` section
    pub fn from_config(config: &CameraConfig, frames: Arc<FrameCache>) -> Self {
        Self::new(
            Box::new(HttpFrameFetcher::new(
                config.capture_url.clone(),
                Duration::from_millis(config.timeout_ms),
            )),
            frames,
            Duration::from_millis(config.interval_ms),
        )
    }

    /// Run until the shutdown signal fires
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures: u64 = 0;

        info!("Camera poller started ({:?} cadence)", self.period);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let fetched = tokio::select! {
                _ = shutdown.cancelled() => break,
                fetched = self.fetcher.fetch() => fetched,
            };

            let result = match fetched {
                Ok(data) => self.frames.accept(data).await.map(|_| ()),
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => failures = 0,
                Err(e) => {
                    failures += 1;
                    if failures % WARN_EVERY_FAILURES == 1 {
                        warn!("Camera capture failed ({} in a row): {}", failures, e);
                    } else {
                        debug!("Camera capture failed: {}", e);
                    }
                }
            }
        }

        info!("Camera poller stopped");
    }
}
