//! Store configuration.

use docweave_engine::SERVER_MAX_BATCH;

/// Configuration for the in-memory store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum descendants accepted by one write.
    pub max_descendants: usize,
    /// Writes answered "not found" after a document is created.
    pub visibility_lag: u32,
    /// Whether tables carrying `merge_info` are rejected.
    pub reject_read_only: bool,
}

impl StoreConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            max_descendants: SERVER_MAX_BATCH,
            visibility_lag: 0,
            reject_read_only: true,
        }
    }

    /// Sets the per-write descendant limit.
    pub fn with_max_descendants(mut self, max: usize) -> Self {
        self.max_descendants = max;
        self
    }

    /// Sets the visibility lag for newly created documents.
    pub fn with_visibility_lag(mut self, writes: u32) -> Self {
        self.visibility_lag = writes;
        self
    }

    /// Accepts tables carrying read-only metadata.
    pub fn allow_read_only(mut self) -> Self {
        self.reject_read_only = false;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}
