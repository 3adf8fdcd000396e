//! Durability layer for replisnap
//!
//! This crate handles everything that touches disk:
//!
//! - Store layout: committed snapshots and pending working directories
//! - Transient snapshots: produced locally by the state machine
//! - Received snapshots: assembled from chunks sent by a peer
//! - Persisted snapshots: committed, checksummed, readable as chunks
//! - Commit: atomic publish with a crash-safe checksum file
//! - Recovery: rediscovering the latest snapshot after a restart
//! - Factory: one store per partition

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checksum_file; // Crash-safe checksum file next to each committed snapshot
pub mod chunk_reader; // Ordered, restartable chunk iteration
pub mod config; // Store configuration
pub mod factory; // Per-partition store factory
pub mod io; // Bounded blocking pool and filesystem helpers
pub mod listener; // New-snapshot listeners
pub mod paths; // Directory layout
pub mod persisted; // Committed snapshot handle
pub mod received; // Snapshots assembled from chunks
pub mod recovery; // Open-time discovery and cleanup
pub mod store; // File-based store
pub mod traits; // Capability traits
pub mod transient; // Locally produced snapshots

pub use chunk_reader::{FileBasedSnapshotChunkReader, SnapshotChunkReader};
pub use config::{ConfigError, SnapshotStoreConfig};
pub use factory::FileBasedSnapshotStoreFactory;
pub use listener::{ListenerRef, ListenerRegistry, PersistedSnapshotListener};
pub use paths::StorePaths;
pub use persisted::PersistedSnapshot;
pub use received::ReceivedSnapshot;
pub use store::FileBasedSnapshotStore;
pub use traits::{ConstructableSnapshotStore, ReceivableSnapshotStore};
pub use transient::TransientSnapshot;
