//! Store capability traits
//!
//! Two capability sets over one concrete store:
//!
//! - [`ConstructableSnapshotStore`]: query the latest snapshot, produce
//!   snapshots locally, observe commits
//! - [`ReceivableSnapshotStore`]: everything above, plus assembling
//!   snapshots sent by peers
//!
//! The state machine side only needs the first; the replication side needs
//! the second.

use async_trait::async_trait;
use replisnap_core::Result;

use crate::listener::ListenerRef;
use crate::persisted::PersistedSnapshot;
use crate::received::ReceivedSnapshot;
use crate::transient::TransientSnapshot;

/// Store that produces snapshots locally
#[async_trait]
pub trait ConstructableSnapshotStore: Send + Sync {
    /// The current persisted snapshot, if any; never blocks
    fn latest_snapshot(&self) -> Option<PersistedSnapshot>;

    /// Index of the latest snapshot, or 0 when there is none
    fn current_snapshot_index(&self) -> u64;

    /// Whether the latest snapshot has the given wire id
    fn has_snapshot_id(&self, id: &str) -> bool;

    /// Start producing a snapshot with the given identity
    ///
    /// Fails with `AlreadyExists` if a transient snapshot with this identity
    /// is still open, or if it is the identity of the latest snapshot.
    async fn new_transient_snapshot(
        &self,
        index: u64,
        term: u64,
        processed_position: u64,
        exported_position: u64,
    ) -> Result<TransientSnapshot>;

    /// Register a listener for new snapshots; returns false if already registered
    fn add_snapshot_listener(&self, listener: ListenerRef) -> bool;

    /// Unregister a listener; returns false if it was not registered
    fn remove_snapshot_listener(&self, listener: &ListenerRef) -> bool;

    /// Delete the working directories of every pending snapshot
    ///
    /// The persisted snapshot is never touched. Pending snapshots whose
    /// directory was purged fail their next `persist` with `NotFound`.
    async fn purge_pending_snapshots(&self) -> Result<()>;
}

/// Store that additionally accepts snapshots from peers
#[async_trait]
pub trait ReceivableSnapshotStore: ConstructableSnapshotStore {
    /// Start receiving the snapshot with wire id `snapshot_id`
    ///
    /// Fails with `InvalidId` if the id does not parse. Several received
    /// snapshots for the same id may be open at once.
    async fn new_received_snapshot(&self, snapshot_id: &str) -> Result<ReceivedSnapshot>;
}
