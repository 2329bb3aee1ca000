//! Configuration for synchronization.

use crate::error::{SyncError, SyncResult};
use std::time::Duration;

/// Hard maximum of blocks the store accepts in one write.
pub const SERVER_MAX_BATCH: usize = 1000;

/// Notice appended to content cut at the character ceiling.
pub const DEFAULT_TRUNCATION_NOTICE: &str = "\n\n(Content truncated: length exceeded the limit)";

/// What to do with a block whose parent is out of reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParentRepairPolicy {
    /// Re-parent the block to the container and make it top-level.
    #[default]
    Repair,
    /// Reject the batch.
    Strict,
}

/// Configuration for synchronization runs.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Character ceiling for the markdown input.
    pub max_chars: usize,
    /// Maximum blocks per write batch.
    pub max_batch_size: usize,
    /// Maximum converted blocks before degrading to plain text.
    pub max_total_blocks: usize,
    /// Retry configuration for batch writes.
    pub retry: RetryConfig,
    /// Handling of unreachable parents.
    pub parent_repair: ParentRepairPolicy,
    /// Notice appended after truncation.
    pub truncation_notice: String,
}

impl SyncOptions {
    /// Creates options with default limits.
    pub fn new() -> Self {
        Self {
            max_chars: 60_000,
            max_batch_size: 500,
            max_total_blocks: 1000,
            retry: RetryConfig::default(),
            parent_repair: ParentRepairPolicy::default(),
            truncation_notice: DEFAULT_TRUNCATION_NOTICE.to_string(),
        }
    }

    /// Sets the character ceiling.
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Sets the batch size.
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    /// Sets the converted block ceiling.
    pub fn with_max_total_blocks(mut self, limit: usize) -> Self {
        self.max_total_blocks = limit;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the parent repair policy.
    pub fn with_parent_repair(mut self, policy: ParentRepairPolicy) -> Self {
        self.parent_repair = policy;
        self
    }

    /// Sets the truncation notice.
    pub fn with_truncation_notice(mut self, notice: impl Into<String>) -> Self {
        self.truncation_notice = notice.into();
        self
    }

    /// Checks that the options are usable.
    pub fn validate(&self) -> SyncResult<()> {
        if self.max_chars == 0 {
            return Err(SyncError::InvalidOptions("max_chars must be positive".into()));
        }
        if self.max_batch_size == 0 || self.max_batch_size > SERVER_MAX_BATCH {
            return Err(SyncError::InvalidOptions(format!(
                "max_batch_size must be within 1..={SERVER_MAX_BATCH}, got {}",
                self.max_batch_size
            )));
        }
        if self.max_total_blocks == 0 {
            return Err(SyncError::InvalidOptions(
                "max_total_blocks must be positive".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(SyncError::InvalidOptions(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry behavior.
///
/// The delay is fixed: the dominant transient cause is propagation lag after
/// a document is created, which a constant wait handles best.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before each retry.
    pub delay: Duration,
}

impl RetryConfig {
    /// Creates a retry configuration with the default 5s delay.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::from_secs(5),
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Sets the delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the delay before a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            Duration::ZERO
        } else {
            self.delay
        }
    }

    /// Upper bound on total wait time across all retries.
    pub fn worst_case_delay(&self) -> Duration {
        self.delay * self.max_attempts.saturating_sub(1)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}
