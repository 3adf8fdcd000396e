//! Snapshot identity
//!
//! A snapshot is named by the four-tuple
//! `(index, term, processed_position, exported_position)`.
//!
//! The canonical string form `"{index}-{term}-{processed}-{exported}"` is both
//! the on-disk directory name of a committed snapshot and the identifier used
//! across the network when chunks are transferred.
//!
//! ## Ordering
//!
//! Identities are totally ordered: by `index` first, then `term`, then
//! `processed_position`, then `exported_position`. A store never replaces its
//! latest snapshot with one that does not compare strictly greater.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::SnapshotError;

/// Number of dash-separated fields in the wire form of an identity
const ID_FIELD_COUNT: usize = 4;

/// Identity of one snapshot generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId {
    index: u64,
    term: u64,
    processed_position: u64,
    exported_position: u64,
}

impl SnapshotId {
    /// Create a new identity
    pub fn new(index: u64, term: u64, processed_position: u64, exported_position: u64) -> Self {
        SnapshotId {
            index,
            term,
            processed_position,
            exported_position,
        }
    }

    /// Log index covered by the snapshot
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Term of the entry at `index`
    pub fn term(&self) -> u64 {
        self.term
    }

    /// Last position processed by the state machine
    pub fn processed_position(&self) -> u64 {
        self.processed_position
    }

    /// Last position acknowledged by exporters
    pub fn exported_position(&self) -> u64 {
        self.exported_position
    }

    /// Parse an identity from its wire form.
    ///
    /// Only four non-negative decimal integers separated by single dashes are
    /// accepted. Signs, whitespace and empty fields are rejected.
    pub fn parse(value: &str) -> Result<Self, SnapshotError> {
        let invalid = || SnapshotError::InvalidId(value.to_string());

        let mut fields = [0u64; ID_FIELD_COUNT];
        let mut parts = value.split('-');
        for field in fields.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            *field = part.parse().map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(SnapshotId::new(fields[0], fields[1], fields[2], fields[3]))
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.index, self.term, self.processed_position, self.exported_position
        )
    }
}

impl FromStr for SnapshotId {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SnapshotId::parse(s)
    }
}

// Orders by: index → term → processed_position → exported_position
impl Ord for SnapshotId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index
            .cmp(&other.index)
            .then(self.term.cmp(&other.term))
            .then(self.processed_position.cmp(&other.processed_position))
            .then(self.exported_position.cmp(&other.exported_position))
    }
}

impl PartialOrd for SnapshotId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
