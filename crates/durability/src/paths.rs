//! Snapshot store directory structure
//!
//! Each partition owns one root directory:
//!
//! ```text
//! <root>/
//! ├── snapshots/                  # Committed snapshots (at most one after open)
//! │   ├── 5-1-20-18/              # Snapshot files, named by chunk
//! │   ├── 5-1-20-18.checksum      # Aggregate checksum of the directory
//! │   └── .5-1-20-18.checksum.tmp # Only present after a crash mid-commit
//! └── pending/                    # Snapshots being produced or received
//!     ├── 6-1-25-20-<token>/
//!     └── 6-1-25-20-<token>/
//! ```
//!
//! Pending working directories carry a random token so that concurrent
//! receivers of the same snapshot never share a directory.

use std::path::{Path, PathBuf};

use replisnap_core::SnapshotId;
use uuid::Uuid;

/// Directory holding committed snapshots
const SNAPSHOTS_DIR: &str = "snapshots";
/// Directory holding working directories of pending snapshots
const PENDING_DIR: &str = "pending";
/// Extension of the checksum file written next to a committed snapshot
pub const CHECKSUM_EXTENSION: &str = "checksum";
/// Prefix of temporary files in the snapshots directory
const TEMP_PREFIX: &str = ".";

/// Snapshot store paths
///
/// Provides access to all paths within a partition's snapshot root.
#[derive(Debug, Clone)]
pub struct StorePaths {
    /// Root directory of the partition
    root: PathBuf,
}

impl StorePaths {
    /// Create paths from root directory
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        StorePaths {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Get the root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the committed snapshots directory
    pub fn snapshots_dir(&self) -> PathBuf {
        self.root.join(SNAPSHOTS_DIR)
    }

    /// Get the pending snapshots directory
    pub fn pending_dir(&self) -> PathBuf {
        self.root.join(PENDING_DIR)
    }

    /// Directory of a committed snapshot
    pub fn snapshot_dir(&self, id: &SnapshotId) -> PathBuf {
        self.snapshots_dir().join(id.to_string())
    }

    /// Checksum file of a committed snapshot
    pub fn checksum_file(&self, id: &SnapshotId) -> PathBuf {
        self.snapshots_dir()
            .join(format!("{}.{}", id, CHECKSUM_EXTENSION))
    }

    /// Temporary checksum file used while committing
    pub fn checksum_temp_file(&self, id: &SnapshotId) -> PathBuf {
        self.snapshots_dir()
            .join(format!("{}{}.{}.tmp", TEMP_PREFIX, id, CHECKSUM_EXTENSION))
    }

    /// Allocate a fresh, unique working directory path for a pending snapshot
    pub fn new_working_dir(&self, id: &SnapshotId) -> PathBuf {
        self.pending_dir()
            .join(format!("{}-{}", id, Uuid::new_v4().simple()))
    }

    /// Check if the store layout exists at this path
    pub fn exists(&self) -> bool {
        self.snapshots_dir().is_dir() && self.pending_dir().is_dir()
    }

    /// Create the full directory structure
    pub fn create_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.snapshots_dir())?;
        std::fs::create_dir_all(self.pending_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_paths_from_root() {
        let paths = StorePaths::from_root("/tmp/partition-1");
        let id = SnapshotId::new(5, 1, 20, 18);

        assert_eq!(paths.root(), Path::new("/tmp/partition-1"));
        assert_eq!(
            paths.snapshots_dir(),
            PathBuf::from("/tmp/partition-1/snapshots")
        );
        assert_eq!(paths.pending_dir(), PathBuf::from("/tmp/partition-1/pending"));
        assert_eq!(
            paths.snapshot_dir(&id),
            PathBuf::from("/tmp/partition-1/snapshots/5-1-20-18")
        );
        assert_eq!(
            paths.checksum_file(&id),
            PathBuf::from("/tmp/partition-1/snapshots/5-1-20-18.checksum")
        );
    }

    #[test]
    fn test_working_dirs_are_unique() {
        let paths = StorePaths::from_root("/tmp/partition-1");
        let id = SnapshotId::new(1, 0, 1, 0);

        let a = paths.new_working_dir(&id);
        let b = paths.new_working_dir(&id);

        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(paths.pending_dir().as_path()));
        let name = a.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("1-0-1-0-"));
    }

    #[test]
    fn test_exists_false() {
        let paths = StorePaths::from_root("/nonexistent/path");
        assert!(!paths.exists());
    }

    #[test]
    fn test_create_directories() {
        let dir = tempdir().unwrap();
        let paths = StorePaths::from_root(dir.path().join("partition-1"));

        paths.create_directories().unwrap();

        assert!(paths.exists());
        assert!(paths.snapshots_dir().is_dir());
        assert!(paths.pending_dir().is_dir());
    }
}
