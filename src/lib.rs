//! Replisnap - snapshot persistence and replication for replicated logs
//!
//! Each partition of a replicated log keeps at most one committed snapshot
//! on disk. Snapshots are either produced locally by the state machine
//! ([`TransientSnapshot`]) or assembled from chunks streamed by a peer
//! ([`ReceivedSnapshot`]). Committing either kind atomically replaces the
//! previous snapshot, and the store never moves back to an older one.
//!
//! # Quick Start
//!
//! ```ignore
//! use replisnap::{
//!     ConstructableSnapshotStore, FileBasedSnapshotStore, SnapshotStoreConfig,
//! };
//!
//! let store = FileBasedSnapshotStore::open("/var/lib/node/partition-1", 1, SnapshotStoreConfig::default())?;
//!
//! let mut transient = store.new_transient_snapshot(42, 3, 100, 90).await?;
//! transient
//!     .take(|dir| {
//!         std::fs::write(dir.join("state"), b"...")?;
//!         Ok(())
//!     })
//!     .await?;
//! let persisted = transient.persist().await?;
//!
//! // Stream it to a follower
//! for chunk in persisted.new_chunk_reader()? {
//!     send(chunk?);
//! }
//! ```
//!
//! # Crates
//!
//! - `replisnap-core`: identities, chunks, checksums and the error type
//! - `replisnap-durability`: the file-based store and everything on disk

pub use replisnap_core::*;
pub use replisnap_durability::*;
