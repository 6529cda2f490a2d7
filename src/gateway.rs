//! # Gateway Facade
//!
//! The operations an outer request layer builds its endpoints on:
//!
//! | Operation | Backs |
//! |---|---|
//! | [`Gateway::read_snapshot`] | sensor status query |
//! | [`Gateway::apply_reading`] | push endpoint used by a relay uploader |
//! | [`Gateway::accept_frame`] | camera upload |
//! | [`Gateway::current_frame`] | latest frame for polling clients |
//!
//! Cheap to clone; every clone shares the same store and frame cache.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::watch;
use tracing::debug;

use crate::error::Result;
use crate::frames::{Frame, FrameCache, FrameId};
use crate::link::LinkState;
use crate::telemetry::{Reading, TelemetrySnapshot, TelemetryStore};

#[derive(Clone)]
pub struct Gateway {
    store: Arc<TelemetryStore>,
    frames: Arc<FrameCache>,
    link_state: watch::Receiver<LinkState>,
}

impl Gateway {
    pub fn new(
        store: Arc<TelemetryStore>,
        frames: Arc<FrameCache>,
        link_state: watch::Receiver<LinkState>,
    ) -> Self {
        Self {
            store,
            frames,
            link_state,
        }
    }

    /// Latest value per field, `None` where nothing was ever received
    pub fn read_snapshot(&self) -> Reading {
        self.store.snapshot().values()
    }

    /// Latest values with their update times
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.store.snapshot()
    }

    /// Inject values directly, bypassing the link
    ///
    /// # Returns
    ///
    /// * `usize` - Number of fields overwritten
    pub fn apply_reading(&self, reading: &Reading) -> usize {
        let applied = self.store.update(reading);
        debug!("Applied {} pushed field(s): {:?}", applied, reading);
        applied
    }

    /// Store an uploaded camera frame
    ///
    /// # Errors
    ///
    /// Returns `EmptyPayload` for a zero-length body
    pub async fn accept_frame(&self, data: impl Into<Bytes>) -> Result<FrameId> {
        self.frames.accept(data.into()).await
    }

    /// Most recent frame
    ///
    /// # Errors
    ///
    /// Returns `FrameNotFound` when no frame was ever accepted
    pub async fn current_frame(&self) -> Result<Frame> {
        self.frames.current().await
    }

    /// Current state of the telemetry link
    pub fn link_state(&self) -> LinkState {
        *self.link_state.borrow()
    }
}
