//! Store recovery at open
//!
//! A restarted process rediscovers its committed snapshot by scanning the
//! `snapshots/` directory:
//!
//! 1. Every directory whose name parses as a snapshot id is a candidate
//! 2. Candidates are tried from greatest to lowest id
//! 3. The first one with a readable checksum file (and, when verification
//!    is enabled, a matching recomputed checksum) becomes the latest snapshot
//! 4. Everything else in `snapshots/` is deleted
//!
//! Working directories under `pending/` never survive a restart.

use std::fs;
use std::io;
use std::path::Path;

use replisnap_core::{Result, SnapshotId};
use tracing::{debug, info, warn};

use crate::checksum_file::read_checksum_file;
use crate::io::{directory_checksum, remove_dir_if_exists, remove_file_if_exists};
use crate::paths::StorePaths;
use crate::persisted::PersistedSnapshot;

/// Delete every entry under `pending/`; returns how many were removed
pub fn clear_pending_dir(paths: &StorePaths) -> io::Result<usize> {
    let pending = paths.pending_dir();
    if !pending.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in fs::read_dir(&pending)? {
        let entry = entry?;
        remove_entry(&entry.path())?;
        count += 1;
    }
    Ok(count)
}

fn remove_entry(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        remove_dir_if_exists(path)?;
    } else {
        remove_file_if_exists(path)?;
    }
    Ok(())
}

/// Find the latest valid committed snapshot and delete everything else
pub fn recover_latest(paths: &StorePaths, verify: bool) -> Result<Option<PersistedSnapshot>> {
    let snapshots_dir = paths.snapshots_dir();
    let mut candidates = Vec::new();

    for entry in fs::read_dir(&snapshots_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(id) = entry
            .file_name()
            .to_str()
            .and_then(|name| SnapshotId::parse(name).ok())
        {
            candidates.push(id);
        }
    }
    candidates.sort_unstable_by(|a, b| b.cmp(a));

    let mut latest = None;
    for id in candidates {
        match load_candidate(paths, &id, verify) {
            Ok(snapshot) => {
                latest = Some(snapshot);
                break;
            }
            Err(e) => {
                warn!(
                    snapshot_id = %id,
                    error = %e,
                    "Discarding snapshot that failed validation at open"
                );
            }
        }
    }

    // Keep only the chosen snapshot and its checksum file
    let keep: Vec<_> = latest
        .iter()
        .flat_map(|s: &PersistedSnapshot| [s.path().to_path_buf(), s.checksum_path().to_path_buf()])
        .collect();
    for entry in fs::read_dir(&snapshots_dir)? {
        let path = entry?.path();
        if keep.contains(&path) {
            continue;
        }
        debug!(path = %path.display(), "Removing stale entry from snapshots directory");
        remove_entry(&path)?;
    }

    if let Some(snapshot) = &latest {
        info!(
            snapshot_id = %snapshot.snapshot_id(),
            checksum = snapshot.checksum(),
            "Recovered persisted snapshot"
        );
    }
    Ok(latest)
}

fn load_candidate(paths: &StorePaths, id: &SnapshotId, verify: bool) -> Result<PersistedSnapshot> {
    let dir = paths.snapshot_dir(id);
    let checksum_path = paths.checksum_file(id);
    let stored = read_checksum_file(&checksum_path)?;

    if verify {
        let actual = directory_checksum(&dir)?.value();
        if actual != stored {
            return Err(replisnap_core::SnapshotError::InvalidChecksum {
                id: *id,
                expected: stored,
                actual,
            });
        }
    }

    Ok(PersistedSnapshot::new(*id, dir, checksum_path, stored))
}
