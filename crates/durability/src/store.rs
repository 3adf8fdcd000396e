//! File-based snapshot store
//!
//! One store per partition. It owns at most one persisted snapshot, hands
//! out transient snapshots (produced locally) and received snapshots
//! (assembled from remote chunks), and decides atomically which snapshot is
//! the latest.
//!
//! # Concurrency
//!
//! - Every mutation is serialized through the store's execution context, an
//!   async mutex held across each decision and its filesystem work
//! - The pending-snapshot registry sits behind a short synchronous lock, so
//!   a snapshot dropped without `persist` or `abort` can unregister itself
//! - Filesystem work runs on the bounded [`BlockingPool`]
//! - The latest pointer sits behind its own `RwLock`, so readers never wait
//!   for a commit in progress and observe either the old or the new snapshot
//!
//! # Commit rules
//!
//! - A snapshot is only committed if its id is strictly greater than the
//!   latest one; otherwise the caller receives the existing latest snapshot
//! - After a commit the previous latest snapshot is deleted, as are the
//!   working directories of pending snapshots with a strictly smaller id

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use replisnap_core::{Result, SnapshotError, SnapshotId};
use tokio::sync::MutexGuard;
use tracing::{debug, info, warn};

use crate::checksum_file::write_checksum_file;
use crate::config::SnapshotStoreConfig;
use crate::io::{
    directory_checksum, non_file_entries, remove_dir_if_exists, sorted_file_names, sync_dir,
    BlockingPool,
};
use crate::listener::{ListenerRef, ListenerRegistry};
use crate::paths::StorePaths;
use crate::persisted::PersistedSnapshot;
use crate::received::ReceivedSnapshot;
use crate::recovery::{clear_pending_dir, recover_latest};
use crate::traits::{ConstructableSnapshotStore, ReceivableSnapshotStore};
use crate::transient::TransientSnapshot;

/// Kind of pending snapshot owning a working directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PendingKind {
    /// Produced locally
    Transient,
    /// Assembled from chunks
    Received,
}

#[derive(Debug)]
struct PendingEntry {
    id: SnapshotId,
    kind: PendingKind,
}

/// Working directories of the pending snapshots a store knows about
///
/// Kept behind a synchronous lock so that a snapshot dropped without
/// `persist` or `abort` can release its registration from `Drop`.
#[derive(Debug, Default)]
struct PendingSet {
    entries: HashMap<PathBuf, PendingEntry>,
}

impl PendingSet {
    fn has_transient(&self, id: &SnapshotId) -> bool {
        self.entries
            .values()
            .any(|e| e.kind == PendingKind::Transient && &e.id == id)
    }

    fn older_than(&self, id: &SnapshotId) -> Vec<PathBuf> {
        self.entries
            .iter()
            .filter(|(_, entry)| &entry.id < id)
            .map(|(dir, _)| dir.clone())
            .collect()
    }
}

pub(crate) struct StoreInner {
    partition_id: u32,
    config: SnapshotStoreConfig,
    paths: StorePaths,
    pool: BlockingPool,
    latest: RwLock<Option<PersistedSnapshot>>,
    pending: Mutex<PendingSet>,
    context: tokio::sync::Mutex<()>,
    listeners: Mutex<ListenerRegistry>,
}

impl StoreInner {
    pub(crate) fn pool(&self) -> &BlockingPool {
        &self.pool
    }

    pub(crate) fn config(&self) -> &SnapshotStoreConfig {
        &self.config
    }

    pub(crate) fn latest(&self) -> Option<PersistedSnapshot> {
        self.latest.read().clone()
    }

    /// The latest snapshot, if its id is greater than or equal to `id`
    pub(crate) fn latest_covering(&self, id: &SnapshotId) -> Option<PersistedSnapshot> {
        self.latest
            .read()
            .as_ref()
            .filter(|latest| latest.snapshot_id() >= id)
            .cloned()
    }

    /// Enter the store's execution context
    ///
    /// Every decision about pending snapshots and the latest pointer is
    /// taken while holding the returned guard.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, ()> {
        self.context.lock().await
    }

    /// Whether `dir` is still a live working directory
    pub(crate) fn is_pending(&self, dir: &Path) -> bool {
        self.pending.lock().entries.contains_key(dir)
    }

    async fn create_working_dir(&self, id: SnapshotId, kind: PendingKind) -> Result<PathBuf> {
        let dir = self.paths.new_working_dir(&id);
        let target = dir.clone();
        self.pool
            .run(move || fs::create_dir_all(&target).map_err(SnapshotError::from))
            .await?;

        debug!(
            partition = self.partition_id,
            snapshot_id = %id,
            kind = ?kind,
            path = %dir.display(),
            "Created pending snapshot directory"
        );
        self.pending
            .lock()
            .entries
            .insert(dir.clone(), PendingEntry { id, kind });
        Ok(dir)
    }

    /// Forget a working directory and delete it; never fails
    pub(crate) async fn discard_working_dir(&self, dir: &Path) {
        self.pending.lock().entries.remove(dir);
        let target = dir.to_path_buf();
        let result = self
            .pool
            .run(move || remove_dir_if_exists(&target).map_err(SnapshotError::from))
            .await;

        match result {
            Ok(removed) => debug!(
                partition = self.partition_id,
                path = %dir.display(),
                removed,
                "Discarded pending snapshot directory"
            ),
            Err(e) => warn!(
                partition = self.partition_id,
                path = %dir.display(),
                error = %e,
                "Failed to delete pending snapshot directory"
            ),
        }
    }

    /// Release the working directory of a pending snapshot dropped without
    /// `persist` or `abort`
    ///
    /// The registration goes away immediately; the directory is deleted on
    /// a blocking thread when a runtime is available, inline otherwise.
    pub(crate) fn release_working_dir(&self, dir: &Path) {
        if self.pending.lock().entries.remove(dir).is_none() {
            return;
        }

        let partition = self.partition_id;
        let target = dir.to_path_buf();
        let delete = move || match remove_dir_if_exists(&target) {
            Ok(_) => debug!(
                partition,
                path = %target.display(),
                "Released dropped pending snapshot"
            ),
            Err(e) => warn!(
                partition,
                path = %target.display(),
                error = %e,
                "Failed to delete dropped pending snapshot"
            ),
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(delete);
            }
            Err(_) => delete(),
        }
    }

    /// Publish `dir` as the committed snapshot `id`
    ///
    /// The caller holds the execution context and has already checked that
    /// no snapshot covering `id` is committed. When `expected_checksum` is
    /// given, the checksum recomputed from disk must match it.
    ///
    /// Only a non-empty directory of regular files can be committed, since
    /// that is exactly what a chunk reader can stream to a peer.
    pub(crate) async fn commit(
        &self,
        dir: &Path,
        id: SnapshotId,
        expected_checksum: Option<u64>,
    ) -> Result<PersistedSnapshot> {
        let paths = self.paths.clone();
        let sync = self.config.sync_on_commit;
        let source = dir.to_path_buf();

        let checksum = self
            .pool
            .run(move || {
                if !source.is_dir() {
                    return Err(SnapshotError::NotFound(format!(
                        "working directory {} of snapshot {} no longer exists",
                        source.display(),
                        id
                    )));
                }

                let unsupported = non_file_entries(&source)?;
                if !unsupported.is_empty() {
                    return Err(SnapshotError::IllegalState(format!(
                        "snapshot {} contains entries that are not regular files: {:?}",
                        id, unsupported
                    )));
                }
                let files = sorted_file_names(&source)?;
                if files.is_empty() {
                    return Err(SnapshotError::IllegalState(format!(
                        "snapshot {} has no files",
                        id
                    )));
                }

                let actual = directory_checksum(&source)?.value();
                if let Some(expected) = expected_checksum {
                    if expected != actual {
                        return Err(SnapshotError::InvalidChecksum {
                            id,
                            expected,
                            actual,
                        });
                    }
                }

                if sync {
                    for name in files {
                        File::open(source.join(name))?.sync_all()?;
                    }
                    sync_dir(&source)?;
                }

                // Leftover of an interrupted commit with the same id
                let target = paths.snapshot_dir(&id);
                remove_dir_if_exists(&target)?;
                fs::rename(&source, &target)?;
                if sync {
                    sync_dir(&paths.snapshots_dir())?;
                }

                // The checksum file is the commit point
                write_checksum_file(&paths, &id, actual, sync)?;
                Ok(actual)
            })
            .await?;

        self.pending.lock().entries.remove(dir);
        let snapshot = PersistedSnapshot::new(
            id,
            self.paths.snapshot_dir(&id),
            self.paths.checksum_file(&id),
            checksum,
        );

        let previous = self.latest.write().replace(snapshot.clone());
        info!(
            partition = self.partition_id,
            snapshot_id = %id,
            checksum,
            previous = ?previous.as_ref().map(|p| p.id()),
            "Committed new snapshot"
        );

        if let Some(previous) = previous.filter(|p| p.snapshot_id() != &id) {
            let superseded = previous.clone();
            if let Err(e) = self.pool.run(move || superseded.delete()).await {
                warn!(
                    partition = self.partition_id,
                    snapshot_id = %previous.snapshot_id(),
                    error = %e,
                    "Failed to delete superseded snapshot"
                );
            }
        }

        self.discard_older_pending(&id).await;
        self.notify(&snapshot);
        Ok(snapshot)
    }

    async fn discard_older_pending(&self, id: &SnapshotId) {
        let older = self.pending.lock().older_than(id);
        for dir in older {
            debug!(
                partition = self.partition_id,
                path = %dir.display(),
                "Removing pending snapshot older than the committed one"
            );
            self.discard_working_dir(&dir).await;
        }
    }

    fn notify(&self, snapshot: &PersistedSnapshot) {
        let listeners = self.listeners.lock().registered();
        for listener in listeners {
            listener.on_new_snapshot(snapshot);
        }
    }
}

/// Snapshot store for one partition, backed by a directory tree
///
/// Cloning is cheap; clones share the same store.
#[derive(Clone)]
pub struct FileBasedSnapshotStore {
    inner: Arc<StoreInner>,
}

impl FileBasedSnapshotStore {
    /// Open the store rooted at `root`, recovering its persisted snapshot
    ///
    /// Pending working directories left by a previous process are deleted.
    pub fn open(
        root: impl AsRef<Path>,
        partition_id: u32,
        config: SnapshotStoreConfig,
    ) -> Result<Self> {
        config.validate()?;

        let paths = StorePaths::from_root(root);
        paths.create_directories()?;

        let orphans = clear_pending_dir(&paths)?;
        if orphans > 0 {
            info!(partition = partition_id, orphans, "Removed orphaned pending snapshots");
        }
        let latest = recover_latest(&paths, config.verify_on_open)?;

        info!(
            partition = partition_id,
            root = %paths.root().display(),
            latest = ?latest.as_ref().map(|s| s.id()),
            "Opened snapshot store"
        );

        Ok(FileBasedSnapshotStore {
            inner: Arc::new(StoreInner {
                partition_id,
                pool: BlockingPool::new(config.io_parallelism),
                config,
                paths,
                latest: RwLock::new(latest),
                pending: Mutex::new(PendingSet::default()),
                context: tokio::sync::Mutex::new(()),
                listeners: Mutex::new(ListenerRegistry::new()),
            }),
        })
    }

    /// Partition this store belongs to
    pub fn partition_id(&self) -> u32 {
        self.inner.partition_id
    }

    /// Directory layout of this store
    pub fn paths(&self) -> &StorePaths {
        &self.inner.paths
    }

    /// Log index up to which entries may be compacted
    pub fn compaction_bound(&self) -> u64 {
        self.current_snapshot_index()
    }

    /// All committed snapshots (zero or one)
    pub fn available_snapshots(&self) -> Vec<PersistedSnapshot> {
        self.inner.latest().into_iter().collect()
    }

    /// Number of pending snapshots currently tracked
    pub async fn pending_count(&self) -> usize {
        let _context = self.inner.lock().await;
        self.inner.pending.lock().entries.len()
    }
}

impl std::fmt::Debug for FileBasedSnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBasedSnapshotStore")
            .field("partition_id", &self.inner.partition_id)
            .field("root", &self.inner.paths.root())
            .field("latest", &self.inner.latest().map(|s| s.id()))
            .finish()
    }
}

#[async_trait]
impl ConstructableSnapshotStore for FileBasedSnapshotStore {
    fn latest_snapshot(&self) -> Option<PersistedSnapshot> {
        self.inner.latest()
    }

    fn current_snapshot_index(&self) -> u64 {
        self.inner.latest().map(|s| s.index()).unwrap_or(0)
    }

    fn has_snapshot_id(&self, id: &str) -> bool {
        self.inner
            .latest()
            .map(|s| s.id() == id)
            .unwrap_or(false)
    }

    async fn new_transient_snapshot(
        &self,
        index: u64,
        term: u64,
        processed_position: u64,
        exported_position: u64,
    ) -> Result<TransientSnapshot> {
        let id = SnapshotId::new(index, term, processed_position, exported_position);
        let _context = self.inner.lock().await;

        let committed = self
            .inner
            .latest()
            .map(|s| s.snapshot_id() == &id)
            .unwrap_or(false);
        let duplicate = committed || self.inner.pending.lock().has_transient(&id);
        if duplicate {
            debug!(
                partition = self.inner.partition_id,
                snapshot_id = %id,
                committed,
                "Refusing duplicate transient snapshot"
            );
            return Err(SnapshotError::AlreadyExists(id));
        }

        let dir = self
            .inner
            .create_working_dir(id, PendingKind::Transient)
            .await?;
        Ok(TransientSnapshot::new(self.inner.clone(), id, dir))
    }

    fn add_snapshot_listener(&self, listener: ListenerRef) -> bool {
        self.inner.listeners.lock().add(listener)
    }

    fn remove_snapshot_listener(&self, listener: &ListenerRef) -> bool {
        self.inner.listeners.lock().remove(listener)
    }

    async fn purge_pending_snapshots(&self) -> Result<()> {
        let _context = self.inner.lock().await;
        let known = std::mem::take(&mut self.inner.pending.lock().entries).len();

        let paths = self.inner.paths.clone();
        let removed = self
            .inner
            .pool
            .run(move || clear_pending_dir(&paths).map_err(SnapshotError::from))
            .await?;

        info!(
            partition = self.inner.partition_id,
            known,
            removed,
            "Purged pending snapshots"
        );
        Ok(())
    }
}

#[async_trait]
impl ReceivableSnapshotStore for FileBasedSnapshotStore {
    async fn new_received_snapshot(&self, snapshot_id: &str) -> Result<ReceivedSnapshot> {
        let id = SnapshotId::parse(snapshot_id)?;
        let _context = self.inner.lock().await;
        let dir = self
            .inner
            .create_working_dir(id, PendingKind::Received)
            .await?;
        Ok(ReceivedSnapshot::new(self.inner.clone(), id, dir))
    }
}
