//! Core types for the replisnap snapshot engine
//!
//! This crate defines the value types shared by every layer:
//! - SnapshotId: Totally ordered four-part snapshot identity
//! - SnapshotChunk: One named blob plus its transfer metadata
//! - Checksums: Chunk checksum and order-independent snapshot aggregate
//! - SnapshotError: Error taxonomy for snapshot operations

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checksum;
pub mod chunk;
pub mod error;
pub mod id;

pub use checksum::{chunk_checksum, ChunkHasher, SnapshotChecksum};
pub use chunk::{SnapshotChunk, SnapshotChunkBuilder};
pub use error::{BoxError, Result, SnapshotError};
pub use id::SnapshotId;
