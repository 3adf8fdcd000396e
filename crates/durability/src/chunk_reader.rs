//! Chunk reader over a committed snapshot
//!
//! A reader enumerates the files of a persisted snapshot as
//! [`SnapshotChunk`]s in lexical order of their names. The file list is
//! captured when the reader is created; content is read lazily, one chunk
//! at a time, and no file handle outlives a single `next_chunk` call.
//!
//! Readers are independent: any number may be open on the same snapshot,
//! and each can be repositioned with [`SnapshotChunkReader::seek`].

use std::path::{Path, PathBuf};

use replisnap_core::{Result, SnapshotChunk, SnapshotError};
use tracing::trace;

use crate::io::sorted_file_names;

/// Restartable, ordered iteration over the chunks of a snapshot
pub trait SnapshotChunkReader: Iterator<Item = Result<SnapshotChunk>> + Send {
    /// Reposition before the first chunk whose name is `>= chunk_name`;
    /// `None` rewinds to the beginning
    fn seek(&mut self, chunk_name: Option<&str>);

    /// Name of the chunk the next call to `next_chunk` returns, without
    /// consuming it; `None` once exhausted
    fn next_id(&self) -> Option<&str>;

    /// Whether another chunk is available
    fn has_next(&self) -> bool {
        self.next_id().is_some()
    }

    /// Read the next chunk; fails with `ChunkNotFound` when exhausted
    fn next_chunk(&mut self) -> Result<SnapshotChunk>;

    /// Rewind to the first chunk
    fn reset(&mut self) {
        self.seek(None);
    }
}

/// Chunk reader backed by a snapshot directory
#[derive(Debug)]
pub struct FileBasedSnapshotChunkReader {
    directory: PathBuf,
    snapshot_id: String,
    snapshot_checksum: u64,
    chunk_names: Vec<String>,
    total_count: u32,
    position: usize,
}

impl FileBasedSnapshotChunkReader {
    /// Create a reader over `directory`, capturing its current file list
    pub fn new(directory: &Path, snapshot_id: String, snapshot_checksum: u64) -> Result<Self> {
        let chunk_names = sorted_file_names(directory)?;
        let total_count = u32::try_from(chunk_names.len()).map_err(|_| {
            SnapshotError::IllegalState(format!(
                "snapshot {} has too many files ({})",
                snapshot_id,
                chunk_names.len()
            ))
        })?;

        Ok(FileBasedSnapshotChunkReader {
            directory: directory.to_path_buf(),
            snapshot_id,
            snapshot_checksum,
            chunk_names,
            total_count,
            position: 0,
        })
    }

    /// Number of chunks in the snapshot
    pub fn total_count(&self) -> u32 {
        self.total_count
    }

    /// Names of all chunks, in iteration order
    pub fn chunk_names(&self) -> &[String] {
        &self.chunk_names
    }
}

impl SnapshotChunkReader for FileBasedSnapshotChunkReader {
    fn seek(&mut self, chunk_name: Option<&str>) {
        self.position = match chunk_name {
            Some(name) => self
                .chunk_names
                .partition_point(|candidate| candidate.as_str() < name),
            None => 0,
        };
    }

    fn next_id(&self) -> Option<&str> {
        self.chunk_names.get(self.position).map(String::as_str)
    }

    fn next_chunk(&mut self) -> Result<SnapshotChunk> {
        let name = self.chunk_names.get(self.position).ok_or_else(|| {
            SnapshotError::ChunkNotFound(format!(
                "no chunk left in snapshot {} ({} chunks read)",
                self.snapshot_id, self.position
            ))
        })?;

        let content = std::fs::read(self.directory.join(name))?;
        trace!(
            snapshot_id = %self.snapshot_id,
            chunk = %name,
            bytes = content.len(),
            "Read snapshot chunk"
        );

        let chunk = SnapshotChunk::new(
            self.snapshot_id.clone(),
            name.clone(),
            self.total_count,
            self.snapshot_checksum,
            content,
        );
        self.position += 1;
        Ok(chunk)
    }
}

impl Iterator for FileBasedSnapshotChunkReader {
    type Item = Result<SnapshotChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.has_next() {
            Some(self.next_chunk())
        } else {
            None
        }
    }
}
