//! Shared helpers for the durability integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::sync::Once;

use replisnap_core::{chunk_checksum, BoxError, SnapshotChunk};
use replisnap_durability::{
    ConstructableSnapshotStore, FileBasedSnapshotStore, PersistedSnapshot, SnapshotStoreConfig,
};
use tempfile::TempDir;

static INIT_TRACING: Once = Once::new();

/// Install a test subscriber once per binary; output is captured by libtest.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Store in a fresh temp directory
pub struct TestStore {
    pub store: FileBasedSnapshotStore,
    pub dir: TempDir,
}

impl TestStore {
    pub fn new() -> Self {
        Self::with_partition(1)
    }

    pub fn with_partition(partition_id: u32) -> Self {
        init_tracing();
        let dir = TempDir::new().unwrap();
        let store =
            FileBasedSnapshotStore::open(dir.path(), partition_id, SnapshotStoreConfig::for_testing())
                .unwrap();
        TestStore { store, dir }
    }

    /// Reopen the store on the same directory, simulating a restart
    pub fn reopen(&mut self) {
        self.store = FileBasedSnapshotStore::open(
            self.dir.path(),
            self.store.partition_id(),
            SnapshotStoreConfig::for_testing(),
        )
        .unwrap();
    }

    /// Entries under `pending/`
    pub fn pending_entries(&self) -> usize {
        fs::read_dir(self.store.paths().pending_dir())
            .unwrap()
            .count()
    }

    /// Entries under `snapshots/` (directories and checksum files)
    pub fn snapshot_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.store.paths().snapshots_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

/// The two-file content used by most scenarios
pub fn two_files() -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    files.insert("file1".to_string(), b"file1 contents".to_vec());
    files.insert("file2".to_string(), b"file2 contents".to_vec());
    files
}

/// Writer callback producing `files`
pub fn writer_for(
    files: BTreeMap<String, Vec<u8>>,
) -> impl FnOnce(&std::path::Path) -> Result<(), BoxError> + Send + 'static {
    move |dir: &std::path::Path| {
        for (name, content) in files {
            fs::write(dir.join(name), content)?;
        }
        Ok(())
    }
}

/// Take and persist a transient snapshot with the given files
pub async fn persist_files(
    store: &FileBasedSnapshotStore,
    id: (u64, u64, u64, u64),
    files: BTreeMap<String, Vec<u8>>,
) -> PersistedSnapshot {
    let mut transient = store
        .new_transient_snapshot(id.0, id.1, id.2, id.3)
        .await
        .unwrap();
    transient.take(writer_for(files)).await.unwrap();
    transient.persist().await.unwrap()
}

/// All chunks of a persisted snapshot, in reader order
pub fn read_chunks(snapshot: &PersistedSnapshot) -> Vec<SnapshotChunk> {
    snapshot
        .new_chunk_reader()
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

/// Chunks for an arbitrary snapshot without a sender store
pub fn make_chunks(snapshot_id: &str, files: &[(&str, &[u8])]) -> Vec<SnapshotChunk> {
    let snapshot_checksum = files
        .iter()
        .fold(0u64, |acc, (_, content)| acc.wrapping_add(chunk_checksum(content)));
    files
        .iter()
        .map(|(name, content)| {
            SnapshotChunk::new(
                snapshot_id,
                *name,
                files.len() as u32,
                snapshot_checksum,
                content.to_vec(),
            )
        })
        .collect()
}

/// Wait for a directory released in the background to disappear
pub async fn wait_until_removed(path: &std::path::Path) {
    for _ in 0..200 {
        if !path.exists() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("{} was never removed", path.display());
}
