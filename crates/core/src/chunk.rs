//! Snapshot chunks
//!
//! A chunk is one named file of a snapshot plus the metadata a receiver
//! needs to validate it in isolation: the total number of chunks, the
//! checksum of this chunk's content and the aggregate checksum of the whole
//! snapshot. Chunks are immutable values.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::checksum::chunk_checksum;

/// One named blob of a snapshot, as moved between replicas
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotChunk {
    snapshot_id: String,
    chunk_name: String,
    total_count: u32,
    content: Vec<u8>,
    checksum: u64,
    snapshot_checksum: u64,
}

impl SnapshotChunk {
    /// Create a chunk, computing its checksum from `content`
    pub fn new(
        snapshot_id: impl Into<String>,
        chunk_name: impl Into<String>,
        total_count: u32,
        snapshot_checksum: u64,
        content: Vec<u8>,
    ) -> Self {
        let checksum = chunk_checksum(&content);
        SnapshotChunk {
            snapshot_id: snapshot_id.into(),
            chunk_name: chunk_name.into(),
            total_count,
            content,
            checksum,
            snapshot_checksum,
        }
    }

    /// Wire identity of the snapshot this chunk belongs to
    pub fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }

    /// File name of the chunk within the snapshot
    pub fn chunk_name(&self) -> &str {
        &self.chunk_name
    }

    /// Number of chunks in the snapshot
    pub fn total_count(&self) -> u32 {
        self.total_count
    }

    /// Chunk content
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Announced checksum of `content`
    pub fn checksum(&self) -> u64 {
        self.checksum
    }

    /// Announced aggregate checksum of the whole snapshot
    pub fn snapshot_checksum(&self) -> u64 {
        self.snapshot_checksum
    }

    /// Whether the announced checksum matches the content
    pub fn is_content_valid(&self) -> bool {
        chunk_checksum(&self.content) == self.checksum
    }

    /// Copy this chunk into a builder, to derive a variant with one field
    /// changed
    pub fn to_builder(&self) -> SnapshotChunkBuilder {
        SnapshotChunkBuilder {
            chunk: self.clone(),
        }
    }

    /// Consume the chunk, returning its content
    pub fn into_content(self) -> Vec<u8> {
        self.content
    }
}

impl fmt::Debug for SnapshotChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotChunk")
            .field("snapshot_id", &self.snapshot_id)
            .field("chunk_name", &self.chunk_name)
            .field("total_count", &self.total_count)
            .field("content_len", &self.content.len())
            .field("checksum", &format_args!("{:#x}", self.checksum))
            .field("snapshot_checksum", &format_args!("{:#x}", self.snapshot_checksum))
            .finish()
    }
}

/// Copy-with builder over an existing chunk
///
/// Setting a field never recomputes the chunk checksum, so a builder can
/// produce chunks whose announced metadata disagrees with their content.
#[derive(Debug, Clone)]
pub struct SnapshotChunkBuilder {
    chunk: SnapshotChunk,
}

impl SnapshotChunkBuilder {
    /// Override the snapshot id
    pub fn snapshot_id(mut self, snapshot_id: impl Into<String>) -> Self {
        self.chunk.snapshot_id = snapshot_id.into();
        self
    }

    /// Override the chunk name
    pub fn chunk_name(mut self, chunk_name: impl Into<String>) -> Self {
        self.chunk.chunk_name = chunk_name.into();
        self
    }

    /// Override the total chunk count
    pub fn total_count(mut self, total_count: u32) -> Self {
        self.chunk.total_count = total_count;
        self
    }

    /// Override the content (checksum is left untouched)
    pub fn content(mut self, content: Vec<u8>) -> Self {
        self.chunk.content = content;
        self
    }

    /// Override the chunk checksum
    pub fn checksum(mut self, checksum: u64) -> Self {
        self.chunk.checksum = checksum;
        self
    }

    /// Override the snapshot checksum
    pub fn snapshot_checksum(mut self, snapshot_checksum: u64) -> Self {
        self.chunk.snapshot_checksum = snapshot_checksum;
        self
    }

    /// Finish building
    pub fn build(self) -> SnapshotChunk {
        self.chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SnapshotChunk {
        SnapshotChunk::new("1-0-1-0", "file1", 2, 0xabc, b"file1 contents".to_vec())
    }

    #[test]
    fn test_new_computes_checksum() {
        let chunk = sample();
        assert_eq!(chunk.checksum(), chunk_checksum(b"file1 contents"));
        assert!(chunk.is_content_valid());
    }

    #[test]
    fn test_builder_overrides_single_field() {
        let chunk = sample();
        let corrupted = chunk.to_builder().checksum(0xCAFEBABE).build();

        assert_eq!(corrupted.checksum(), 0xCAFEBABE);
        assert!(!corrupted.is_content_valid());
        assert_eq!(corrupted.snapshot_id(), chunk.snapshot_id());
        assert_eq!(corrupted.chunk_name(), chunk.chunk_name());
        assert_eq!(corrupted.total_count(), chunk.total_count());
        assert_eq!(corrupted.content(), chunk.content());
        assert_eq!(corrupted.snapshot_checksum(), chunk.snapshot_checksum());
    }

    #[test]
    fn test_builder_content_keeps_old_checksum() {
        let chunk = sample();
        let tampered = chunk.to_builder().content(b"other".to_vec()).build();
        assert_eq!(tampered.checksum(), chunk.checksum());
        assert!(!tampered.is_content_valid());
    }

    #[test]
    fn test_debug_omits_content() {
        let debug = format!("{:?}", sample());
        assert!(debug.contains("content_len: 14"));
        assert!(!debug.contains("file1 contents"));
    }

    #[test]
    fn test_json_roundtrip() {
        let chunk = sample();
        let json = serde_json::to_string(&chunk).unwrap();
        let back: SnapshotChunk = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chunk);
    }
}
