//! # Frame Cache
//!
//! Holds the most recent camera frame in memory and mirrors every accepted
//! frame to disk.
//!
//! Live-view clients poll the current frame every few hundred milliseconds,
//! so the memory slot serves repeated reads without touching the disk. The
//! disk copy is what survives a restart: with an empty slot, `current()`
//! loads the newest persisted frame.
//!
//! Writers are serialized by an async mutex that also owns the last assigned
//! id. The memory slot is swapped in a single assignment under its own lock,
//! so readers always get one complete frame. Files are written to a `.tmp`
//! sibling and renamed into place; past files are never rewritten.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use bytes::Bytes;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{Frame, FrameId};
use crate::error::{GatewayError, Result};

/// Latest-frame cache with disk fallback
#[derive(Debug)]
pub struct FrameCache {
    dir: PathBuf,
    extension: String,
    current: RwLock<Option<Frame>>,
    /// Last assigned id; held for the whole of `accept`
    writer: Mutex<u64>,
}

impl FrameCache {
    /// Open (creating if needed) a frame directory
    ///
    /// The id counter is seeded from the newest file already on disk so ids
    /// keep increasing across restarts.
    ///
    /// # Arguments
    ///
    /// * `dir` - Directory for persisted frames
    /// * `extension` - File extension of persisted frames (e.g. "jpg")
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or listed
    pub async fn open(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Result<Self> {
        let dir = dir.into();
        let extension = extension.into();

        tokio::fs::create_dir_all(&dir).await?;
        let last_id = latest_on_disk(&dir, &extension)
            .await?
            .map(|(id, _)| id.as_u64())
            .unwrap_or(0);

        info!("Frame storage at {} (last id {})", dir.display(), last_id);

        Ok(Self {
            dir,
            extension,
            current: RwLock::new(None),
            writer: Mutex::new(last_id),
        })
    }

    /// Directory holding persisted frames
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store a new current frame
    ///
    /// # Arguments
    ///
    /// * `data` - Raw image bytes
    ///
    /// # Returns
    ///
    /// * `Result<FrameId>` - Id assigned to the frame
    ///
    /// # Errors
    ///
    /// Returns `EmptyPayload` for zero-length input; the current frame is
    /// left untouched. A failed disk write is logged and the frame still
    /// becomes current.
    pub async fn accept(&self, data: Bytes) -> Result<FrameId> {
        if data.is_empty() {
            return Err(GatewayError::EmptyPayload);
        }

        let mut last_id = self.writer.lock().await;
        let id = FrameId::new(next_id(*last_id, now_millis()));
        *last_id = id.as_u64();

        let path = self.dir.join(id.file_name(&self.extension));
        if let Err(e) = persist(&path, &data).await {
            warn!("Failed to persist frame {} to {}: {}", id, path.display(), e);
        }

        let size = data.len();
        let frame = Frame { id, data, path };
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(frame);

        info!("Accepted frame {} ({} bytes)", id, size);
        Ok(id)
    }

    /// Current frame from memory, if any
    pub fn current_in_memory(&self) -> Option<Frame> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current frame, falling back to the newest persisted one
    ///
    /// # Errors
    ///
    /// Returns `FrameNotFound` when no frame is in memory and none can be
    /// loaded from disk.
    pub async fn current(&self) -> Result<Frame> {
        if let Some(frame) = self.current_in_memory() {
            return Ok(frame);
        }

        let (id, path) = match latest_on_disk(&self.dir, &self.extension).await {
            Ok(Some(latest)) => latest,
            Ok(None) => return Err(GatewayError::FrameNotFound),
            Err(e) => {
                warn!("Failed to list frames in {}: {}", self.dir.display(), e);
                return Err(GatewayError::FrameNotFound);
            }
        };

        let data = match tokio::fs::read(&path).await {
            Ok(data) if !data.is_empty() => Bytes::from(data),
            Ok(_) => return Err(GatewayError::FrameNotFound),
            Err(e) => {
                warn!("Failed to load frame {}: {}", path.display(), e);
                return Err(GatewayError::FrameNotFound);
            }
        };
        debug!("Loaded frame {} from disk", id);

        let frame = Frame { id, data, path };
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        // An upload may have landed while we were reading; it is newer
        match slot.as_ref() {
            Some(newer) => Ok(newer.clone()),
            None => {
                *slot = Some(frame.clone());
                Ok(frame)
            }
        }
    }
}

fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Strictly increasing id even when the clock stalls or steps back
fn next_id(last: u64, now: u64) -> u64 {
    now.max(last.saturating_add(1))
}

async fn persist(path: &Path, data: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{}.tmp", file_name));

    let written = match write_synced(&tmp, data).await {
        Ok(()) => tokio::fs::rename(&tmp, path).await,
        Err(e) => Err(e),
    };
    if written.is_err() {
        // Never leave a half-written sibling behind
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    written
}

async fn write_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}

async fn latest_on_disk(dir: &Path, extension: &str) -> io::Result<Option<(FrameId, PathBuf)>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut latest: Option<(FrameId, PathBuf)> = None;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(id) = FrameId::from_file_name(&name.to_string_lossy(), extension) else {
            continue;
        };
        if latest.as_ref().map_or(true, |(best, _)| id > *best) {
            latest = Some((id, entry.path()));
        }
    }
    Ok(latest)
}
