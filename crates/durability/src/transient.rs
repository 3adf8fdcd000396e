//! Locally produced snapshots
//!
//! A [`TransientSnapshot`] wraps a working directory into which the state
//! machine writes its files. Lifecycle:
//!
//! ```text
//! Created --take(ok)--> Taken --persist--> Persisted
//!    |         \
//!    |          take(err)--> Failed
//!    +--abort (from any state)--> Aborted
//! ```
//!
//! Only a taken snapshot can be persisted. Persisting again returns the
//! same [`PersistedSnapshot`]. Dropping a snapshot that was neither
//! persisted nor aborted releases its identity and working directory.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use replisnap_core::{BoxError, Result, SnapshotError, SnapshotId};
use tracing::{debug, warn};

use crate::persisted::PersistedSnapshot;
use crate::store::StoreInner;

#[derive(Debug, Clone)]
enum TransientState {
    Created,
    Taken,
    Failed,
    Persisted(PersistedSnapshot),
    Aborted,
}

/// Snapshot being produced locally, not yet committed
pub struct TransientSnapshot {
    store: Arc<StoreInner>,
    id: SnapshotId,
    directory: PathBuf,
    state: TransientState,
}

impl TransientSnapshot {
    pub(crate) fn new(store: Arc<StoreInner>, id: SnapshotId, directory: PathBuf) -> Self {
        TransientSnapshot {
            store,
            id,
            directory,
            state: TransientState::Created,
        }
    }

    /// Identity of the snapshot being produced
    pub fn snapshot_id(&self) -> &SnapshotId {
        &self.id
    }

    /// Working directory handed to the writer
    pub fn path(&self) -> &Path {
        &self.directory
    }

    /// Run `writer` once against the working directory
    ///
    /// The writer runs on a blocking thread and must write a complete,
    /// self-consistent set of files before returning. Its error is returned
    /// as [`SnapshotError::Writer`] and leaves the snapshot unpersistable.
    pub async fn take<F>(&mut self, writer: F) -> Result<()>
    where
        F: FnOnce(&Path) -> std::result::Result<(), BoxError> + Send + 'static,
    {
        match self.state {
            TransientState::Created => {}
            ref other => {
                return Err(SnapshotError::IllegalState(format!(
                    "cannot take transient snapshot {} in state {:?}",
                    self.id, other
                )))
            }
        }

        let dir = self.directory.clone();
        let result = self
            .store
            .pool()
            .run(move || writer(&dir).map_err(SnapshotError::Writer))
            .await;

        match result {
            Ok(()) => {
                debug!(snapshot_id = %self.id, "Transient snapshot taken");
                self.state = TransientState::Taken;
                Ok(())
            }
            Err(e) => {
                warn!(snapshot_id = %self.id, error = %e, "Failed to take transient snapshot");
                self.state = TransientState::Failed;
                Err(e)
            }
        }
    }

    /// Commit the snapshot as the store's latest
    ///
    /// If a snapshot with an equal or greater id is already committed, the
    /// working directory is discarded and that snapshot is returned. Fails
    /// with [`SnapshotError::NotFound`] if the working directory was purged.
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
            self.state = TransientState::Persisted(latest.clone());
            return Ok(latest);
        }

        if let TransientState::Persisted(snapshot) = &self.state {
            return Ok(snapshot.clone());
        }

        if !self.store.is_pending(&self.directory) {
            return Err(SnapshotError::NotFound(format!(
                "transient snapshot {} was purged or aborted",
                self.id
            )));
        }

        match self.state {
            TransientState::Taken => {}
            ref other => {
                return Err(SnapshotError::IllegalState(format!(
                    "cannot persist transient snapshot {} in state {:?}",
                    self.id, other
                )))
            }
        }

        let snapshot = self
            .store
            .commit(&self.directory, self.id, None)
            .await?;
        self.state = TransientState::Persisted(snapshot.clone());
        Ok(snapshot)
    }

    /// Delete the working directory; safe in every state
    pub async fn abort(&mut self) {
        if matches!(self.state, TransientState::Persisted(_)) {
            return;
        }
        let _context = self.store.lock().await;
        self.store
            .discard_working_dir(&self.directory).await;
        self.state = TransientState::Aborted;
    }
}

impl fmt::Debug for TransientSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransientSnapshot")
            .field("id", &self.id.to_string())
            .field("directory", &self.directory)
            .field("state", &self.state)
            .finish()
    }
}

impl Drop for TransientSnapshot {
    fn drop(&mut self) {
        if !matches!(
            self.state,
            TransientState::Persisted(_) | TransientState::Aborted
        ) {
            self.store.release_working_dir(&self.directory);
        }
    }
}
