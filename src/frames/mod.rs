//! # Frames Module
//!
//! Latest camera frame, in memory with an on-disk fallback.
//!
//! This module handles:
//! - Assigning strictly increasing, timestamp-derived frame ids
//! - Persisting every accepted frame under its id
//! - Serving the current frame from memory, or from disk after a restart

pub mod cache;

use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use serde::Serialize;

pub use cache::FrameCache;

/// File name prefix of persisted frames
const FILE_PREFIX: &str = "frame-";

/// Frame identifier: milliseconds since the Unix epoch, made strictly
/// increasing by the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FrameId(u64);

impl FrameId {
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Storage file name; zero padding keeps lexical and numeric order equal
    pub fn file_name(self, extension: &str) -> String {
        format!("{}{:020}.{}", FILE_PREFIX, self.0, extension)
    }

    /// Recover the id from a storage file name
    pub fn from_file_name(name: &str, extension: &str) -> Option<Self> {
        let digits = name
            .strip_prefix(FILE_PREFIX)?
            .strip_suffix(extension)?
            .strip_suffix('.')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(Self)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One camera image
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub id: FrameId,
    pub data: Bytes,
    /// Where the frame is (or was meant to be) persisted
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_is_zero_padded() {
        let id = FrameId::new(1_760_000_000_123);
        assert_eq!(id.file_name("jpg"), "frame-00000001760000000123.jpg");
    }

    #[test]
    fn test_file_name_order_matches_id_order() {
        let older = FrameId::new(999).file_name("jpg");
        let newer = FrameId::new(1000).file_name("jpg");
        assert!(older < newer);
    }

    #[test]
    fn test_from_file_name() {
        let id = FrameId::new(42);
        assert_eq!(FrameId::from_file_name(&id.file_name("jpg"), "jpg"), Some(id));
    }

    #[test]
    fn test_from_file_name_rejects_foreign_files() {
        assert_eq!(FrameId::from_file_name("frame-123.png", "jpg"), None);
        assert_eq!(FrameId::from_file_name("frame-00000000000000000123.jpg.tmp", "jpg"), None);
        assert_eq!(FrameId::from_file_name("image-123.jpg", "jpg"), None);
        assert_eq!(FrameId::from_file_name("frame-.jpg", "jpg"), None);
        assert_eq!(FrameId::from_file_name("frame-12a.jpg", "jpg"), None);
    }
}
