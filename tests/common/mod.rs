//! Shared test utilities for the end-to-end suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's
//! main.rs.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Once;

pub use replisnap::{
    ConstructableSnapshotStore, FileBasedSnapshotStore, PersistedSnapshot,
    ReceivableSnapshotStore, ReceivedSnapshot, SnapshotChunk, SnapshotChunkReader,
    SnapshotError, SnapshotStoreConfig,
};
use tempfile::TempDir;

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

// ============================================================================
// Nodes
// ============================================================================

/// One replica of a partition, with its own store directory
pub struct Node {
    pub store: FileBasedSnapshotStore,
    dir: TempDir,
    partition_id: u32,
}

impl Node {
    pub fn new(partition_id: u32) -> Self {
        init_tracing();
        let dir = TempDir::new().unwrap();
        let store = FileBasedSnapshotStore::open(
            dir.path(),
            partition_id,
            SnapshotStoreConfig::for_testing(),
        )
        .unwrap();
        Node {
            store,
            dir,
            partition_id,
        }
    }

    /// Simulate a process restart
    pub fn restart(&mut self) {
        self.store = FileBasedSnapshotStore::open(
            self.dir.path(),
            self.partition_id,
            SnapshotStoreConfig::for_testing(),
        )
        .unwrap();
    }

    /// Take and persist a snapshot of `files` at `index`
    pub async fn snapshot(&self, index: u64, files: &[(&str, &str)]) -> PersistedSnapshot {
        let files: BTreeMap<String, String> = files
            .iter()
            .map(|(n, c)| (n.to_string(), c.to_string()))
            .collect();
        let mut transient = self
            .store
            .new_transient_snapshot(index, 1, index * 10, index * 10)
            .await
            .unwrap();
        transient
            .take(move |dir: &Path| {
                for (name, content) in files {
                    fs::write(dir.join(name), content)?;
                }
                Ok(())
            })
            .await
            .unwrap();
        transient.persist().await.unwrap()
    }

    pub fn pending_entries(&self) -> usize {
        fs::read_dir(self.store.paths().pending_dir())
            .unwrap()
            .count()
    }
}

// ============================================================================
// Transfer helpers
// ============================================================================

/// Stream every chunk of `snapshot` into `received`, asserting acceptance
pub async fn transfer(snapshot: &PersistedSnapshot, received: &mut ReceivedSnapshot) {
    for chunk in snapshot.new_chunk_reader().unwrap() {
        assert!(received.apply(chunk.unwrap()).await.unwrap());
    }
}

/// Replicate `snapshot` from a leader into `follower` and persist it
pub async fn replicate(snapshot: &PersistedSnapshot, follower: &Node) -> PersistedSnapshot {
    let mut received = follower
        .store
        .new_received_snapshot(&snapshot.id())
        .await
        .unwrap();
    transfer(snapshot, &mut received).await;
    received.persist().await.unwrap()
}

/// File contents of a snapshot directory, by name
pub fn contents(snapshot: &PersistedSnapshot) -> BTreeMap<String, Vec<u8>> {
    fs::read_dir(snapshot.path())
        .unwrap()
        .map(|e| {
            let e = e.unwrap();
            (
                e.file_name().to_string_lossy().to_string(),
                fs::read(e.path()).unwrap(),
            )
        })
        .collect()
}
