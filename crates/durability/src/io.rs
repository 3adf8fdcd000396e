//! Filesystem helpers and the bounded blocking pool
//!
//! Everything that blocks on the filesystem runs through [`BlockingPool`],
//! which hands work to tokio's blocking threads while capping how many jobs
//! a single store has in flight.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

use replisnap_core::{ChunkHasher, Result, SnapshotChecksum, SnapshotError};
use tokio::sync::Semaphore;

/// Read buffer size used when hashing files
const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Bounded executor for blocking filesystem work
#[derive(Debug, Clone)]
pub struct BlockingPool {
    permits: Arc<Semaphore>,
}

impl BlockingPool {
    /// Create a pool allowing `parallelism` concurrent jobs
    pub fn new(parallelism: usize) -> Self {
        BlockingPool {
            permits: Arc::new(Semaphore::new(parallelism.max(1))),
        }
    }

    /// Run `job` on a blocking thread once a permit is available
    pub async fn run<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SnapshotError::IllegalState("blocking pool closed".to_string()))?;

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        });

        match handle.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(SnapshotError::Io(io::Error::new(
                io::ErrorKind::Interrupted,
                format!("blocking job cancelled: {}", e),
            ))),
        }
    }
}

/// fsync a directory so that renames and unlinks inside it are durable
pub fn sync_dir(path: &Path) -> io::Result<()> {
    let dir = File::open(path)?;
    dir.sync_all()
}

/// Remove a directory tree; returns whether anything was removed
pub fn remove_dir_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Remove a file; returns whether it existed
pub fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Names of the regular files directly inside `dir`, in lexical order
pub fn sorted_file_names(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().into_string().map_err(|raw| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("non UTF-8 file name {:?} in {}", raw, dir.display()),
            )
        })?;
        names.push(name);
    }
    names.sort();
    Ok(names)
}

/// Checksum of one file's content, streamed from disk
pub fn file_checksum(path: &Path) -> io::Result<u64> {
    let mut file = File::open(path)?;
    let mut hasher = ChunkHasher::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finish())
}

/// Aggregate checksum over every file in `dir`
pub fn directory_checksum(dir: &Path) -> io::Result<SnapshotChecksum> {
    let mut aggregate = SnapshotChecksum::new();
    for name in sorted_file_names(dir)? {
        aggregate.add(file_checksum(&dir.join(name))?);
    }
    Ok(aggregate)
}

/// Write one received chunk to `path`
///
/// Any leftover of an earlier failed attempt at the same path is replaced,
/// and a failed write removes what it created, so a chunk can always be
/// written again.
pub fn write_chunk_file(path: &Path, content: &[u8], sync: bool) -> io::Result<()> {
    write_file_with(path, |file| {
        file.write_all(content)?;
        if sync {
            file.sync_all()?;
        }
        Ok(())
    })
}

fn write_file_with<F>(path: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    if let Err(e) = write(&mut file) {
        drop(file);
        let _ = remove_file_if_exists(path);
        return Err(e);
    }
    Ok(())
}

/// Names of the entries directly inside `dir` that are not regular files
///
/// A snapshot is a flat set of files; directories, symlinks and other
/// special entries cannot be streamed as chunks.
pub fn non_file_entries(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
