//! Chunk and snapshot checksums
//!
//! These functions are part of the replication wire contract: sender and
//! receiver must compute them identically.
//!
//! - A chunk checksum is `xxh3_64` over the chunk content alone.
//! - A snapshot checksum is the wrapping sum of the chunk checksums of every
//!   distinct file in the snapshot. The sum is commutative, so the result
//!   does not depend on the order in which chunks arrive.

use xxhash_rust::xxh3::{xxh3_64, Xxh3};

/// Checksum of one chunk's content
pub fn chunk_checksum(content: &[u8]) -> u64 {
    xxh3_64(content)
}

/// Incremental checksum over a chunk being streamed from disk
pub struct ChunkHasher {
    inner: Xxh3,
}

impl Default for ChunkHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkHasher {
    /// Create an empty hasher
    pub fn new() -> Self {
        ChunkHasher { inner: Xxh3::new() }
    }

    /// Feed more content
    pub fn update(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    /// Checksum of everything fed so far
    pub fn finish(&self) -> u64 {
        self.inner.digest()
    }
}

/// Order-independent aggregate of chunk checksums
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotChecksum {
    value: u64,
    chunks: u32,
}

impl SnapshotChecksum {
    /// Create an empty aggregate
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one chunk checksum
    pub fn add(&mut self, chunk_checksum: u64) {
        self.value = self.value.wrapping_add(chunk_checksum);
        self.chunks += 1;
    }

    /// Aggregate value
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Number of chunks folded in
    pub fn chunk_count(&self) -> u32 {
        self.chunks
    }
}

impl FromIterator<u64> for SnapshotChecksum {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        let mut aggregate = SnapshotChecksum::new();
        for checksum in iter {
            aggregate.add(checksum);
        }
        aggregate
    }
}
