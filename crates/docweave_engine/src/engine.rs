//! Synchronization orchestrator.

use crate::config::SyncOptions;
use crate::error::{SyncError, SyncResult};
use crate::executor::{BatchWriter, WriteFailure, WriteFailureKind};
use crate::fallback::{
    fallback_block, truncate_content, DegradeReason, FallbackController, SyncPhase,
};
use crate::partition::partition;
use crate::sleep::{Sleeper, TokioSleeper};
use crate::transport::DocumentStore;
use crate::validate::{validate_collection, BatchValidator, ValidationReport};
use docweave_model::{Batch, BlockId, ConvertedDocument};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Cooperative cancellation flag, checked between store calls.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates an untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Category of a terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Options or block structure were rejected before any write.
    Validation,
    /// The fallback write kept hitting transient errors.
    TransientExhausted,
    /// The fallback write was rejected.
    NonRetryable,
    /// The caller cancelled the run.
    Cancelled,
}

impl From<WriteFailureKind> for FailureKind {
    fn from(kind: WriteFailureKind) -> Self {
        match kind {
            WriteFailureKind::TransientExhausted => FailureKind::TransientExhausted,
            WriteFailureKind::NonRetryable => FailureKind::NonRetryable,
        }
    }
}

/// A terminal failure.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncFailure {
    /// Category.
    pub kind: FailureKind,
    /// Underlying error.
    pub error: SyncError,
}

impl SyncFailure {
    fn validation(error: impl Into<SyncError>) -> Self {
        Self {
            kind: FailureKind::Validation,
            error: error.into(),
        }
    }

    fn cancelled() -> Self {
        Self {
            kind: FailureKind::Cancelled,
            error: SyncError::Cancelled,
        }
    }
}

impl From<WriteFailure> for SyncFailure {
    fn from(failure: WriteFailure) -> Self {
        Self {
            kind: failure.kind.into(),
            error: SyncError::Store(failure.last_error),
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Write requests issued, retries included.
    pub write_calls: u32,
    /// Write requests beyond the first attempt of each batch.
    pub retries: u32,
    /// Blocks re-parented to the container during validation.
    pub repaired_blocks: usize,
    /// True if the input hit the character ceiling.
    pub truncated: bool,
}

/// Outcome of one synchronization run.
#[derive(Debug, Clone)]
pub struct WriteResult {
    /// True if content reached the store, structured or as fallback.
    pub success: bool,
    /// Blocks acknowledged by the store, across both phases.
    pub blocks_written: usize,
    /// Batches acknowledged by the store, across both phases.
    pub batches_written: usize,
    /// Final phase.
    pub phase: SyncPhase,
    /// Why the run degraded, if it did.
    pub degraded: Option<DegradeReason>,
    /// The terminal failure, if the run failed.
    pub failure: Option<SyncFailure>,
    /// Counters.
    pub stats: WriteStats,
    /// Wall-clock duration.
    pub duration: Duration,
}

impl WriteResult {
    /// Returns true if the plain-text fallback was used.
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Validated batches ready to be written.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    /// Container every batch is written under.
    pub container_id: BlockId,
    /// Batches in write order.
    pub batches: Vec<Batch>,
    /// One validation report per batch.
    pub reports: Vec<ValidationReport>,
}

impl SyncPlan {
    /// Total blocks across all batches.
    pub fn total_blocks(&self) -> usize {
        self.batches.iter().map(Batch::len).sum()
    }

    /// Blocks re-parented during validation.
    pub fn repaired_blocks(&self) -> usize {
        self.reports.iter().map(|r| r.repaired.len()).sum()
    }
}

/// Checks, partitions and validates a conversion output without writing.
///
/// Every batch is validated here, so a structural defect anywhere is found
/// before the first write.
pub fn plan(
    converted: ConvertedDocument,
    container_id: &BlockId,
    options: &SyncOptions,
) -> SyncResult<SyncPlan> {
    options.validate()?;
    validate_collection(&converted.blocks, &converted.top_level_order)?;
    let mut batches = partition(
        converted.blocks,
        &converted.top_level_order,
        options.max_batch_size,
    )?;

    let mut validator = BatchValidator::new(container_id.clone(), options.parent_repair);
    let mut reports = Vec::with_capacity(batches.len());
    for batch in &mut batches {
        reports.push(validator.validate(batch)?);
        // Later batches may hang off blocks this one writes.
        validator.mark_written(batch);
    }

    Ok(SyncPlan {
        container_id: container_id.clone(),
        batches,
        reports,
    })
}

struct Run {
    controller: FallbackController,
    stats: WriteStats,
    blocks_written: usize,
    batches_written: usize,
    started: Instant,
}

impl Run {
    fn new() -> Self {
        Self {
            controller: FallbackController::new(),
            stats: WriteStats::default(),
            blocks_written: 0,
            batches_written: 0,
            started: Instant::now(),
        }
    }

    fn record_attempts(&mut self, attempts: u32) {
        self.stats.write_calls += attempts;
        self.stats.retries += attempts.saturating_sub(1);
    }

    fn record_batch(&mut self, blocks: usize) {
        self.blocks_written += blocks;
        self.batches_written += 1;
    }

    fn finish(mut self, outcome: Result<(), SyncFailure>) -> WriteResult {
        let failure = outcome.err();
        if let Some(failure) = &failure {
            if let Err(e) = self.controller.transition(SyncPhase::Failed) {
                error!(error = %e, "could not record failure phase");
            }
            error!(
                kind = ?failure.kind,
                error = %failure.error,
                blocks_written = self.blocks_written,
                "synchronization failed"
            );
        }
        let (phase, degraded) = self.controller.into_parts();
        WriteResult {
            success: failure.is_none(),
            blocks_written: self.blocks_written,
            batches_written: self.batches_written,
            phase,
            degraded,
            failure,
            stats: self.stats,
            duration: self.started.elapsed(),
        }
    }
}

fn check_cancel(cancel: &CancelToken) -> Result<(), SyncFailure> {
    if cancel.is_cancelled() {
        Err(SyncFailure::cancelled())
    } else {
        Ok(())
    }
}

/// Writes markdown content into a document container.
///
/// Converts through the store, writes the result in validated batches and
/// degrades to a single plain-text block when the structured path fails.
/// Runs for different documents may proceed concurrently on one instance.
pub struct Synchronizer<S, Z = TokioSleeper> {
    store: S,
    sleeper: Z,
}

impl<S: DocumentStore> Synchronizer<S, TokioSleeper> {
    /// Creates a synchronizer that waits on the tokio timer.
    pub fn new(store: S) -> Self {
        Self::with_sleeper(store, TokioSleeper)
    }
}

impl<S: DocumentStore, Z: Sleeper> Synchronizer<S, Z> {
    /// Creates a synchronizer with a custom sleeper.
    pub fn with_sleeper(store: S, sleeper: Z) -> Self {
        Self { store, sleeper }
    }

    /// Returns the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the sleeper.
    pub fn sleeper(&self) -> &Z {
        &self.sleeper
    }

    /// Synchronizes `markdown` into `container_id` of `document_id`.
    pub async fn synchronize(
        &self,
        document_id: &str,
        container_id: &BlockId,
        markdown: &str,
        options: &SyncOptions,
    ) -> WriteResult {
        self.synchronize_with_cancel(
            document_id,
            container_id,
            markdown,
            options,
            &CancelToken::new(),
        )
        .await
    }

    /// Like [`synchronize`](Self::synchronize), stopping before the next
    /// store call once `cancel` is triggered. A cancelled run does not fall
    /// back.
    pub async fn synchronize_with_cancel(
        &self,
        document_id: &str,
        container_id: &BlockId,
        markdown: &str,
        options: &SyncOptions,
        cancel: &CancelToken,
    ) -> WriteResult {
        info!(
            document_id,
            container = %container_id,
            bytes = markdown.len(),
            "synchronization started"
        );
        let mut run = Run::new();
        let outcome = self
            .execute(&mut run, document_id, container_id, markdown, options, cancel)
            .await;
        let result = run.finish(outcome);
        if result.success {
            info!(
                document_id,
                phase = %result.phase,
                blocks = result.blocks_written,
                batches = result.batches_written,
                retries = result.stats.retries,
                elapsed_ms = result.duration.as_millis() as u64,
                "synchronization finished"
            );
        }
        result
    }

    /// Appends a `[title](url)` reference to the end of a document.
    pub async fn append_link(
        &self,
        document_id: &str,
        title: &str,
        url: &str,
        options: &SyncOptions,
    ) -> WriteResult {
        let markdown = format!("[{title}]({url})");
        self.synchronize(document_id, &BlockId::new(document_id), &markdown, options)
            .await
    }

    async fn execute(
        &self,
        run: &mut Run,
        document_id: &str,
        container_id: &BlockId,
        markdown: &str,
        options: &SyncOptions,
        cancel: &CancelToken,
    ) -> Result<(), SyncFailure> {
        options.validate().map_err(SyncFailure::validation)?;

        let input = truncate_content(markdown, options.max_chars, &options.truncation_notice);
        if input.truncated {
            run.stats.truncated = true;
            warn!(
                document_id,
                original_chars = input.original_chars,
                max_chars = options.max_chars,
                "content truncated"
            );
        }

        check_cancel(cancel)?;
        let reason = match self.store.convert(&input.content).await {
            Err(error) => Some(DegradeReason::ConversionFailed(error)),
            Ok(converted) if converted.is_empty() => Some(DegradeReason::EmptyConversion),
            Ok(converted) if converted.len() > options.max_total_blocks => {
                Some(DegradeReason::TooManyBlocks {
                    count: converted.len(),
                    limit: options.max_total_blocks,
                })
            }
            Ok(converted) => {
                let plan = plan(converted, container_id, options).map_err(SyncFailure::validation)?;
                run.stats.repaired_blocks = plan.repaired_blocks();
                info!(
                    document_id,
                    blocks = plan.total_blocks(),
                    batches = plan.batches.len(),
                    "conversion planned"
                );
                self.write_primary(run, document_id, &plan, options, cancel)
                    .await?
            }
        };

        if let Some(reason) = reason {
            run.controller
                .degrade(reason)
                .map_err(SyncFailure::validation)?;
            self.write_fallback(run, document_id, container_id, &input.content, options, cancel)
                .await?;
        }

        run.controller
            .transition(SyncPhase::Completed)
            .map_err(SyncFailure::validation)
    }

    async fn write_primary(
        &self,
        run: &mut Run,
        document_id: &str,
        plan: &SyncPlan,
        options: &SyncOptions,
        cancel: &CancelToken,
    ) -> Result<Option<DegradeReason>, SyncFailure> {
        let writer = BatchWriter::new(&self.store, &self.sleeper, &options.retry);
        for batch in &plan.batches {
            check_cancel(cancel)?;
            match writer
                .write(
                    document_id,
                    &plan.container_id,
                    &batch.top_level_ids,
                    &batch.blocks,
                )
                .await
            {
                Ok(report) => {
                    run.record_attempts(report.attempts);
                    run.record_batch(batch.len());
                    info!(
                        document_id,
                        batch = batch.index,
                        of = plan.batches.len(),
                        blocks = batch.len(),
                        attempts = report.attempts,
                        "batch written"
                    );
                }
                Err(failure) => {
                    run.record_attempts(failure.attempts);
                    return Ok(Some(DegradeReason::WriteFailed {
                        batch: batch.index,
                        failure,
                    }));
                }
            }
        }
        Ok(None)
    }

    async fn write_fallback(
        &self,
        run: &mut Run,
        document_id: &str,
        container_id: &BlockId,
        content: &str,
        options: &SyncOptions,
        cancel: &CancelToken,
    ) -> Result<(), SyncFailure> {
        check_cancel(cancel)?;
        let block = fallback_block(content, container_id);
        let top_level = [block.id.clone()];
        let writer = BatchWriter::new(&self.store, &self.sleeper, &options.retry);
        match writer
            .write(
                document_id,
                container_id,
                &top_level,
                std::slice::from_ref(&block),
            )
            .await
        {
            Ok(report) => {
                run.record_attempts(report.attempts);
                run.record_batch(1);
                info!(document_id, attempts = report.attempts, "fallback block written");
                Ok(())
            }
            Err(failure) => {
                run.record_attempts(failure.attempts);
                Err(failure.into())
            }
        }
    }
}
