//! Snapshots assembled from remote chunks
//!
//! A [`ReceivedSnapshot`] is created for an identity learned from a peer
//! and fed chunks one at a time. Validation failures are not errors:
//! `apply` answers `false` and leaves the snapshot untouched, so a corrupt
//! or misdirected chunk never tears down an otherwise healthy transfer.
//!
//! The first accepted chunk fixes the expected chunk count and snapshot
//! checksum; every later chunk must agree with them.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use replisnap_core::{Result, SnapshotChunk, SnapshotError, SnapshotId};
use tracing::{debug, warn};

use crate::io::write_chunk_file;
use crate::persisted::PersistedSnapshot;
use crate::store::StoreInner;

/// Expectations adopted from the first accepted chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Expectation {
    total_count: u32,
    snapshot_checksum: u64,
}

#[derive(Debug, Clone)]
enum ReceiveState {
    Receiving,
    Persisted(PersistedSnapshot),
    Aborted,
}

/// Snapshot being received from a peer, not yet committed
pub struct ReceivedSnapshot {
    store: Arc<StoreInner>,
    id: SnapshotId,
    directory: PathBuf,
    expectation: Option<Expectation>,
    applied: BTreeMap<String, u64>,
    state: ReceiveState,
}

/// Whether a peer-supplied chunk name is a plain file name
fn is_valid_chunk_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

impl ReceivedSnapshot {
    pub(crate) fn new(store: Arc<StoreInner>, id: SnapshotId, directory: PathBuf) -> Self {
        ReceivedSnapshot {
            store,
            id,
            directory,
            expectation: None,
            applied: BTreeMap::new(),
            state: ReceiveState::Receiving,
        }
    }

    /// Log index of the snapshot, known before any chunk arrives
    pub fn index(&self) -> u64 {
        self.id.index()
    }

    /// Identity of the snapshot being received
    pub fn snapshot_id(&self) -> &SnapshotId {
        &self.id
    }

    /// Working directory the chunks are written to
    pub fn path(&self) -> &Path {
        &self.directory
    }

    /// Number of distinct chunks accepted so far
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    /// Whether every announced chunk has been accepted
    pub fn is_complete(&self) -> bool {
        match self.expectation {
            Some(expected) => self.applied.len() == expected.total_count as usize,
            None => false,
        }
    }

    fn reject(&self, chunk: &SnapshotChunk, reason: &str) -> Result<bool> {
        warn!(
            snapshot_id = %self.id,
            chunk = %chunk.chunk_name(),
            reason,
            "Rejected snapshot chunk"
        );
        Ok(false)
    }

    /// Write one chunk into the working directory
    ///
    /// Returns `Ok(false)` without changing any state when the chunk belongs
    /// to another snapshot, disagrees with the expected chunk count or
    /// snapshot checksum, or its content does not match its checksum.
    /// Re-applying an already accepted chunk returns `Ok(true)`.
    pub async fn apply(&mut self, chunk: SnapshotChunk) -> Result<bool> {
        match &self.state {
            ReceiveState::Receiving => {}
            other => {
                return Err(SnapshotError::IllegalState(format!(
                    "cannot apply chunk to received snapshot {} in state {:?}",
                    self.id, other
                )))
            }
        }

        if chunk.snapshot_id() != self.id.to_string() {
            return self.reject(&chunk, "snapshot id mismatch");
        }
        if !is_valid_chunk_name(chunk.chunk_name()) {
            return self.reject(&chunk, "invalid chunk name");
        }
        if !chunk.is_content_valid() {
            return self.reject(&chunk, "chunk checksum mismatch");
        }

        let incoming = Expectation {
            total_count: chunk.total_count(),
            snapshot_checksum: chunk.snapshot_checksum(),
        };
        match self.expectation {
            Some(expected) if expected.total_count != incoming.total_count => {
                return self.reject(&chunk, "total chunk count mismatch");
            }
            Some(expected) if expected.snapshot_checksum != incoming.snapshot_checksum => {
                return self.reject(&chunk, "snapshot checksum mismatch");
            }
            None if incoming.total_count == 0 => {
                return self.reject(&chunk, "zero total chunk count");
            }
            _ => {}
        }

        if let Some(existing) = self.applied.get(chunk.chunk_name()) {
            if *existing == chunk.checksum() {
                debug!(
                    snapshot_id = %self.id,
                    chunk = %chunk.chunk_name(),
                    "Ignoring duplicate snapshot chunk"
                );
                return Ok(true);
            }
            return self.reject(&chunk, "conflicting content for applied chunk");
        }
        if self.applied.len() >= incoming.total_count as usize {
            return self.reject(&chunk, "more chunks than announced");
        }

        let context = self.store.lock().await;
        if !self.store.is_pending(&self.directory) {
            return Err(SnapshotError::NotFound(format!(
                "received snapshot {} was purged or superseded",
                self.id
            )));
        }

        let name = chunk.chunk_name().to_string();
        let checksum = chunk.checksum();
        let path = self.directory.join(&name);
        let sync = self.store.config().sync_on_commit;
        let content = chunk.into_content();
        let bytes = content.len();

        self.store
            .pool()
            .run(move || match write_chunk_file(&path, &content, sync) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Err(SnapshotError::NotFound(
                    format!("working directory of {} is gone", path.display()),
                )),
                Err(e) => Err(SnapshotError::Io(e)),
            })
            .await?;
        drop(context);

        debug!(snapshot_id = %self.id, chunk = %name, bytes, "Applied snapshot chunk");
        self.expectation.get_or_insert(incoming);
        self.applied.insert(name, checksum);
        Ok(true)
    }

    /// Commit the received snapshot as the store's latest
    ///
    /// If a snapshot with an equal or greater id is already committed, for
    /// example because a concurrent transfer of the same snapshot finished
    /// first, the working directory is discarded and that snapshot returned.
    ///
    /// Fails with [`SnapshotError::IllegalState`] while chunks are missing
    /// and with [`SnapshotError::InvalidChecksum`] when the files on disk do
    /// not add up to the announced snapshot checksum. In both cases the
    /// working directory is kept until `abort`.
    pub async fn persist(&mut self) -> Result<PersistedSnapshot> {
        let _context = self.store.lock().await;

        if let Some(latest) = self.store.latest_covering(&self.id) {
            if self.store.is_pending(&self.directory) {
                debug!(
                    snapshot_id = %self.id,
                    latest = %latest.snapshot_id(),
                    "Skipping commit, a newer or equal snapshot exists"
                );
                self.store
                    .discard_working_dir(&self.directory).await;
            }
            self.state = ReceiveState::Persisted(latest.clone());
            return Ok(latest);
        }

        match &self.state {
            ReceiveState::Receiving => {}
            ReceiveState::Persisted(snapshot) => return Ok(snapshot.clone()),
            ReceiveState::Aborted => {
                return Err(SnapshotError::NotFound(format!(
                    "received snapshot {} was aborted",
                    self.id
                )))
            }
        }

        if !self.store.is_pending(&self.directory) {
            return Err(SnapshotError::NotFound(format!(
                "received snapshot {} was purged",
                self.id
            )));
        }

        let expected = match self.expectation {
            Some(expected) if self.is_complete() => expected,
            Some(expected) => {
                return Err(SnapshotError::IllegalState(format!(
                    "received snapshot {} is partial: {} of {} chunks applied",
                    self.id,
                    self.applied.len(),
                    expected.total_count
                )))
            }
            None => {
                return Err(SnapshotError::IllegalState(format!(
                    "received snapshot {} is partial: no chunk applied",
                    self.id
                )))
            }
        };

        let snapshot = self
            .store
            .commit(
                &self.directory,
                self.id,
                Some(expected.snapshot_checksum),
            )
            .await?;
        self.state = ReceiveState::Persisted(snapshot.clone());
        Ok(snapshot)
    }

    /// Delete the working directory; idempotent and safe in every state
    pub async fn abort(&mut self) {
        if matches!(self.state, ReceiveState::Persisted(_)) {
            return;
        }
        let _context = self.store.lock().await;
        self.store
            .discard_working_dir(&self.directory).await;
        self.state = ReceiveState::Aborted;
    }
}

impl fmt::Debug for ReceivedSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceivedSnapshot")
            .field("id", &self.id.to_string())
            .field("directory", &self.directory)
            .field("applied", &self.applied.len())
            .field("expectation", &self.expectation)
            .field("state", &self.state)
            .finish()
    }
}

impl fmt::Display for ReceivedSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReceivedSnapshot({})", self.id)
    }
}

impl Drop for ReceivedSnapshot {
    fn drop(&mut self) {
        if matches!(self.state, ReceiveState::Receiving) {
            self.store.release_working_dir(&self.directory);
        }
    }
}
