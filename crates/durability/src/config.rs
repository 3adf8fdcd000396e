//! Snapshot store configuration.
//!
//! Controls durability of commits, the amount of filesystem work a single
//! store may have in flight and how much checking happens at open.

/// Snapshot store configuration parameters.
#[derive(Debug, Clone)]
pub struct SnapshotStoreConfig {
    /// fsync chunk files, checksum files and directories on commit
    /// (default: true).
    pub sync_on_commit: bool,

    /// Maximum number of blocking filesystem jobs a store runs at once
    /// (default: 4).
    pub io_parallelism: usize,

    /// Recompute and check the checksum of the persisted snapshot found
    /// when the store is opened (default: true).
    pub verify_on_open: bool,
}

impl Default for SnapshotStoreConfig {
    fn default() -> Self {
        SnapshotStoreConfig {
            sync_on_commit: true,
            io_parallelism: 4,
            verify_on_open: true,
        }
    }
}

impl SnapshotStoreConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration optimized for testing (no fsync).
    pub fn for_testing() -> Self {
        SnapshotStoreConfig {
            sync_on_commit: false,
            io_parallelism: 2,
            verify_on_open: true,
        }
    }

    /// Set fsync behavior (builder pattern).
    pub fn with_sync_on_commit(mut self, sync: bool) -> Self {
        self.sync_on_commit = sync;
        self
    }

    /// Set blocking I/O parallelism (builder pattern).
    pub fn with_io_parallelism(mut self, parallelism: usize) -> Self {
        self.io_parallelism = parallelism;
        self
    }

    /// Set checksum verification on open (builder pattern).
    pub fn with_verify_on_open(mut self, verify: bool) -> Self {
        self.verify_on_open = verify;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.io_parallelism == 0 {
            return Err(ConfigError::ZeroParallelism);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// I/O parallelism of zero would stall every operation.
    #[error("I/O parallelism must be at least 1")]
    ZeroParallelism,
}

impl From<ConfigError> for replisnap_core::SnapshotError {
    fn from(e: ConfigError) -> Self {
        replisnap_core::SnapshotError::Config(e.to_string())
    }
}
