//! Store factory
//!
//! Opens one store per partition and hands the same instance out for both
//! capability sets.

use std::path::Path;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use replisnap_core::Result;
use tracing::debug;

use crate::config::SnapshotStoreConfig;
use crate::store::FileBasedSnapshotStore;

/// Creates and caches snapshot stores by partition id
#[derive(Debug, Default)]
pub struct FileBasedSnapshotStoreFactory {
    config: SnapshotStoreConfig,
    stores: DashMap<u32, FileBasedSnapshotStore>,
}

impl FileBasedSnapshotStoreFactory {
    /// Create a factory opening every store with `config`
    pub fn new(config: SnapshotStoreConfig) -> Self {
        FileBasedSnapshotStoreFactory {
            config,
            stores: DashMap::new(),
        }
    }

    /// Open the store of `partition_id` rooted at `root`
    ///
    /// Returns the already open store if this partition has one.
    pub fn create_receivable_store(
        &self,
        root: impl AsRef<Path>,
        partition_id: u32,
    ) -> Result<FileBasedSnapshotStore> {
        match self.stores.entry(partition_id) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let store = FileBasedSnapshotStore::open(root, partition_id, self.config.clone())?;
                debug!(partition = partition_id, "Registered snapshot store");
                Ok(entry.insert(store).value().clone())
            }
        }
    }

    /// The open store of `partition_id`, for producing snapshots
    pub fn constructable_store(&self, partition_id: u32) -> Option<FileBasedSnapshotStore> {
        self.stores.get(&partition_id).map(|s| s.value().clone())
    }

    /// The open store of `partition_id`, for receiving snapshots
    pub fn receivable_store(&self, partition_id: u32) -> Option<FileBasedSnapshotStore> {
        self.constructable_store(partition_id)
    }

    /// Forget the store of `partition_id`; returns whether one was open
    pub fn close_store(&self, partition_id: u32) -> bool {
        self.stores.remove(&partition_id).is_some()
    }

    /// Number of open stores
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Whether no store is open
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}
