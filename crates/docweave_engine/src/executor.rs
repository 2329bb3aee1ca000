//! Remote write execution with bounded retry.

use crate::config::RetryConfig;
use crate::error::StoreError;
use crate::sleep::Sleeper;
use crate::transport::DocumentStore;
use docweave_model::{Block, BlockId};
use thiserror::Error;
use tracing::{debug, warn};

/// Attempt bookkeeping for one logical write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    attempt: u32,
    remaining: u32,
}

impl RetryState {
    /// Creates a state allowing `max_attempts` attempts (at least one).
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            remaining: max_attempts.max(1),
        }
    }

    /// Starts the next attempt and returns its 1-based number.
    pub fn advance(&mut self) -> u32 {
        self.attempt += 1;
        self.remaining = self.remaining.saturating_sub(1);
        self.attempt
    }

    /// Attempts started so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Attempts left in the budget.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Returns true if no attempts are left.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

/// How a write failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFailureKind {
    /// Every attempt hit a transient error.
    TransientExhausted,
    /// The store rejected the write; it was not retried.
    NonRetryable,
}

/// A failed logical write.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("write failed after {attempts} attempt(s): {last_error}")]
pub struct WriteFailure {
    /// Failure classification.
    pub kind: WriteFailureKind,
    /// Attempts made.
    pub attempts: u32,
    /// The error of the final attempt.
    pub last_error: StoreError,
}

/// A successful logical write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    /// Attempts made, including the successful one.
    pub attempts: u32,
}

impl WriteReport {
    /// Attempts beyond the first.
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Issues one logical batch write, retrying transient failures.
pub struct BatchWriter<'a, S: ?Sized, Z: ?Sized> {
    store: &'a S,
    sleeper: &'a Z,
    retry: &'a RetryConfig,
}

impl<'a, S, Z> BatchWriter<'a, S, Z>
where
    S: DocumentStore + ?Sized,
    Z: Sleeper + ?Sized,
{
    /// Creates a writer.
    pub fn new(store: &'a S, sleeper: &'a Z, retry: &'a RetryConfig) -> Self {
        Self {
            store,
            sleeper,
            retry,
        }
    }

    /// Writes `blocks` under `container_id`.
    pub async fn write(
        &self,
        document_id: &str,
        container_id: &BlockId,
        top_level_ids: &[BlockId],
        blocks: &[Block],
    ) -> Result<WriteReport, WriteFailure> {
        let mut state = RetryState::new(self.retry.max_attempts);
        loop {
            let attempt = state.advance();
            debug!(
                document_id,
                attempt,
                blocks = blocks.len(),
                top_level = top_level_ids.len(),
                "writing batch"
            );
            let error = match self
                .store
                .write_batch(document_id, container_id, top_level_ids, blocks)
                .await
            {
                Ok(()) => return Ok(WriteReport { attempts: attempt }),
                Err(error) => error,
            };

            if !error.is_retryable() {
                return Err(WriteFailure {
                    kind: WriteFailureKind::NonRetryable,
                    attempts: attempt,
                    last_error: error,
                });
            }
            if state.is_exhausted() {
                return Err(WriteFailure {
                    kind: WriteFailureKind::TransientExhausted,
                    attempts: attempt,
                    last_error: error,
                });
            }

            let delay = self.retry.delay_for_attempt(attempt);
            warn!(
                document_id,
                attempt,
                max_attempts = self.retry.max_attempts,
                kind = ?error.kind,
                delay_ms = delay.as_millis() as u64,
                "transient write failure, retrying"
            );
            self.sleeper.sleep(delay).await;
        }
    }
}
