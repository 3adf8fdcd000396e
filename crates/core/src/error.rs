//! Error types for the snapshot engine
//!
//! Every failure is scoped to a single snapshot attempt. None of these
//! errors leaves the store's latest persisted snapshot in a changed state.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use thiserror::Error;

use crate::id::SnapshotId;

/// Boxed error returned by producer callbacks
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for snapshot operations
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Error types for snapshot persistence and replication
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A transient snapshot with this identity is already being produced,
    /// or the identity is already committed
    #[error("Snapshot {0} already exists")]
    AlreadyExists(SnapshotId),

    /// The working directory backing a pending snapshot is gone
    #[error("Snapshot not found: {0}")]
    NotFound(String),

    /// Aggregate checksum recomputed at commit time does not match
    #[error("Invalid checksum for snapshot {id}: expected {expected:#x}, got {actual:#x}")]
    InvalidChecksum {
        /// Snapshot being committed
        id: SnapshotId,
        /// Checksum announced by the sender
        expected: u64,
        /// Checksum computed over the files on disk
        actual: u64,
    },

    /// Malformed snapshot identity string
    #[error("Invalid snapshot id: {0:?}")]
    InvalidId(String),

    /// Operation not valid in the current lifecycle state
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Chunk reader has no chunk to return
    #[error("Chunk not found: {0}")]
    ChunkNotFound(String),

    /// Producer callback failed while writing a transient snapshot
    #[error("Snapshot writer failed: {0}")]
    Writer(#[source] BoxError),

    /// Invalid store configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Persisted snapshot metadata is damaged
    #[error("Data corruption: {0}")]
    Corrupted(String),

    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SnapshotError {
    /// Whether the caller may retry the same operation later without
    /// discarding the snapshot attempt
    ///
    /// Only I/O failures qualify. `IllegalState` is a lifecycle violation
    /// (take twice, apply after persist, persist before take) and retrying
    /// the same call cannot succeed; a partial received snapshot is
    /// completed by applying its missing chunks, after which `persist` is a
    /// new attempt rather than a retry.
    pub fn is_retriable(&self) -> bool {
        matches!(self, SnapshotError::Io(_))
    }
}
