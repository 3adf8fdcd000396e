//! Crash-safe checksum file
//!
//! Every committed snapshot directory has a sibling `<id>.checksum` file
//! recording its aggregate checksum. The file is what makes a committed
//! snapshot discoverable after a restart: a snapshot directory without a
//! valid checksum file is treated as an interrupted commit.
//!
//! ## File Layout
//!
//! ```text
//! +------------------+
//! | Magic (8 bytes)  |  "RSNAPCHK"
//! +------------------+
//! | Checksum (8)     |  Aggregate snapshot checksum (LE)
//! +------------------+
//! | CRC32 (4)        |  Checksum of everything above
//! +------------------+
//! ```
//!
//! ## Crash Safety
//!
//! 1. Write to temporary file (`.<id>.checksum.tmp`)
//! 2. fsync the temporary file
//! 3. Atomic rename to final path (`<id>.checksum`)
//! 4. fsync the parent directory

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use replisnap_core::{Result, SnapshotError, SnapshotId};

use crate::io::sync_dir;
use crate::paths::StorePaths;

/// Checksum file magic bytes
pub const CHECKSUM_MAGIC: &[u8; 8] = b"RSNAPCHK";

/// Total checksum file size: Magic(8) + Checksum(8) + CRC32(4)
pub const CHECKSUM_FILE_SIZE: usize = 20;

fn encode(checksum: u64) -> [u8; CHECKSUM_FILE_SIZE] {
    let mut bytes = [0u8; CHECKSUM_FILE_SIZE];
    bytes[0..8].copy_from_slice(CHECKSUM_MAGIC);
    bytes[8..16].copy_from_slice(&checksum.to_le_bytes());

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&bytes[0..16]);
    bytes[16..20].copy_from_slice(&hasher.finalize().to_le_bytes());
    bytes
}

/// Write the checksum file of snapshot `id` using the crash-safe pattern
pub fn write_checksum_file(
    paths: &StorePaths,
    id: &SnapshotId,
    checksum: u64,
    sync: bool,
) -> io::Result<()> {
    let final_path = paths.checksum_file(id);
    let temp_path = paths.checksum_temp_file(id);

    // Stale temp file from an earlier interrupted commit
    let _ = fs::remove_file(&temp_path);

    let result = (|| {
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)?;
        file.write_all(&encode(checksum))?;
        if sync {
            file.sync_all()?;
        }
        drop(file);
        fs::rename(&temp_path, &final_path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    if sync {
        sync_dir(&paths.snapshots_dir())?;
    }
    Ok(())
}

/// Read and validate a checksum file
pub fn read_checksum_file(path: &Path) -> Result<u64> {
    let data = fs::read(path)?;
    if data.len() != CHECKSUM_FILE_SIZE {
        return Err(SnapshotError::Corrupted(format!(
            "checksum file {} has {} bytes, expected {}",
            path.display(),
            data.len(),
            CHECKSUM_FILE_SIZE
        )));
    }

    if &data[0..8] != CHECKSUM_MAGIC {
        return Err(SnapshotError::Corrupted(format!(
            "checksum file {} has invalid magic",
            path.display()
        )));
    }

    let mut stored_crc = [0u8; 4];
    stored_crc.copy_from_slice(&data[16..20]);
    let stored_crc = u32::from_le_bytes(stored_crc);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&data[0..16]);
    let computed_crc = hasher.finalize();

    if stored_crc != computed_crc {
        return Err(SnapshotError::Corrupted(format!(
            "checksum file {} CRC mismatch: stored {:#x}, computed {:#x}",
            path.display(),
            stored_crc,
            computed_crc
        )));
    }

    let mut checksum = [0u8; 8];
    checksum.copy_from_slice(&data[8..16]);
    Ok(u64::from_le_bytes(checksum))
}

/// Whether a checksum file exists for `id`
pub fn checksum_file_exists(paths: &StorePaths, id: &SnapshotId) -> bool {
    paths.checksum_file(id).is_file()
}
