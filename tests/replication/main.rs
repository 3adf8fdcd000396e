//! End-to-end replication tests.
//!
//! A leader node produces snapshots locally and followers rebuild them
//! from chunks, through the public facade only.

#[path = "../common/mod.rs"]
mod common;

mod chunk_transfer;
mod leader_follower;
mod restart;
