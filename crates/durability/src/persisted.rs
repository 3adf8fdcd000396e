//! Committed snapshot handle
//!
//! A [`PersistedSnapshot`] names a fully committed snapshot directory and
//! its aggregate checksum. The files are never modified after commit; they
//! are only removed wholesale, either by [`PersistedSnapshot::delete`] or
//! when the store replaces the snapshot with a newer one.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use replisnap_core::{Result, SnapshotId};
use tracing::debug;

use crate::chunk_reader::FileBasedSnapshotChunkReader;
use crate::io::{remove_dir_if_exists, remove_file_if_exists};

/// Immutable handle to a committed snapshot
///
/// Cloning is cheap; all clones refer to the same snapshot.
#[derive(Clone)]
pub struct PersistedSnapshot {
    inner: Arc<PersistedInner>,
}

struct PersistedInner {
    id: SnapshotId,
    path: PathBuf,
    checksum_path: PathBuf,
    checksum: u64,
}

impl PersistedSnapshot {
    pub(crate) fn new(id: SnapshotId, path: PathBuf, checksum_path: PathBuf, checksum: u64) -> Self {
        PersistedSnapshot {
            inner: Arc::new(PersistedInner {
                id,
                path,
                checksum_path,
                checksum,
            }),
        }
    }

    /// Snapshot identity
    pub fn snapshot_id(&self) -> &SnapshotId {
        &self.inner.id
    }

    /// Wire form of the identity, e.g. `"1-0-1-0"`
    pub fn id(&self) -> String {
        self.inner.id.to_string()
    }

    /// Log index covered by the snapshot
    pub fn index(&self) -> u64 {
        self.inner.id.index()
    }

    /// Term of the entry at `index`
    pub fn term(&self) -> u64 {
        self.inner.id.term()
    }

    /// Aggregate checksum over the snapshot files
    pub fn checksum(&self) -> u64 {
        self.inner.checksum
    }

    /// Snapshot directory
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Checksum file written next to the directory
    pub fn checksum_path(&self) -> &Path {
        &self.inner.checksum_path
    }

    /// Whether the snapshot directory is still on disk
    pub fn exists(&self) -> bool {
        self.inner.path.is_dir()
    }

    /// Open a new, independent chunk reader positioned at the first chunk
    pub fn new_chunk_reader(&self) -> Result<FileBasedSnapshotChunkReader> {
        FileBasedSnapshotChunkReader::new(&self.inner.path, self.id(), self.inner.checksum)
    }

    /// Remove the snapshot from disk
    ///
    /// The checksum file goes first, so an interrupted delete never leaves a
    /// directory that looks committed. Deleting an already removed snapshot
    /// is a no-op.
    pub fn delete(&self) -> Result<()> {
        let checksum_removed = remove_file_if_exists(&self.inner.checksum_path)?;
        let dir_removed = remove_dir_if_exists(&self.inner.path)?;
        debug!(
            snapshot_id = %self.inner.id,
            checksum_removed,
            dir_removed,
            "Deleted persisted snapshot"
        );
        Ok(())
    }
}

impl PartialEq for PersistedSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
            && self.inner.checksum == other.inner.checksum
            && self.inner.path == other.inner.path
    }
}

impl Eq for PersistedSnapshot {}

impl fmt::Debug for PersistedSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistedSnapshot")
            .field("id", &self.inner.id.to_string())
            .field("path", &self.inner.path)
            .field("checksum", &format_args!("{:#x}", self.inner.checksum))
            .finish()
    }
}

impl fmt::Display for PersistedSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PersistedSnapshot({})", self.inner.id)
    }
}
