//! Remote entries: the files a host reports after a selection change.
//!
//! The host sends a JSON array of plain descriptors. The blob itself never
//! crosses the boundary; it stays on the host side and is read by id.

use serde::{Deserialize, Serialize};

/// One remote payload as described by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    /// Stable for the lifetime of the selection.
    pub id: u32,
    pub name: String,
    /// Total size in bytes.
    pub size: u64,
    /// Declared content type. Empty when the host could not tell.
    #[serde(rename = "type", default)]
    pub content_type: String,
    /// ISO-8601 timestamp as reported by the host.
    #[serde(default)]
    pub last_modified: Option<String>,
}

impl RemoteEntry {
    /// Parse a host change notification (a JSON array of descriptors).
    pub fn list_from_json(json: &str) -> Result<Vec<RemoteEntry>, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Number of chunks of at most `chunk_size` bytes covering the payload.
    pub fn chunk_count(&self, chunk_size: usize) -> u64 {
        chunk_count(self.size, chunk_size)
    }

    /// Source offset and length of chunk `index`.
    pub fn chunk_span(&self, index: u64, chunk_size: usize) -> (u64, usize) {
        chunk_span(self.size, index, chunk_size)
    }
}

/// `ceil(size / chunk_size)`.
pub fn chunk_count(size: u64, chunk_size: usize) -> u64 {
    assert!(chunk_size > 0, "chunk size must be non-zero");
    size.div_ceil(chunk_size as u64)
}

/// Offset and length of chunk `index`. Only the last chunk may be short.
pub fn chunk_span(size: u64, index: u64, chunk_size: usize) -> (u64, usize) {
    let offset = index * chunk_size as u64;
    let remaining = size.saturating_sub(offset);
    (offset, remaining.min(chunk_size as u64) as usize)
}
