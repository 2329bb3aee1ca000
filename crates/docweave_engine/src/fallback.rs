//! Degradation to plain text.
//!
//! When rich conversion or the structured write cannot succeed, the content
//! is written as one plain-text block instead, so the caller never ends up
//! with nothing.

use crate::error::{StoreError, SyncError, SyncResult};
use crate::executor::WriteFailure;
use docweave_model::{Block, BlockId};
use std::fmt;
use tracing::{info, warn};

/// ID of the single block written in degraded mode.
pub const FALLBACK_BLOCK_ID: &str = "plain_text_1";

/// Phase of one synchronization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Writing the converted block structure.
    Primary,
    /// Writing the plain-text fallback.
    Degraded,
    /// Terminal: nothing more will be written.
    Failed,
    /// Terminal: content was written.
    Completed,
}

impl SyncPhase {
    /// Returns true for `Failed` and `Completed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncPhase::Failed | SyncPhase::Completed)
    }

    /// Returns true if moving to `next` is allowed.
    pub fn can_transition_to(&self, next: SyncPhase) -> bool {
        matches!(
            (self, next),
            (SyncPhase::Primary, SyncPhase::Degraded)
                | (SyncPhase::Primary, SyncPhase::Completed)
                | (SyncPhase::Primary, SyncPhase::Failed)
                | (SyncPhase::Degraded, SyncPhase::Completed)
                | (SyncPhase::Degraded, SyncPhase::Failed)
        )
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Primary => "primary",
            SyncPhase::Degraded => "degraded",
            SyncPhase::Failed => "failed",
            SyncPhase::Completed => "completed",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run left the primary path.
#[derive(Debug, Clone, PartialEq)]
pub enum DegradeReason {
    /// The store could not convert the markdown.
    ConversionFailed(StoreError),
    /// Conversion succeeded but produced no blocks.
    EmptyConversion,
    /// Conversion produced more blocks than allowed.
    TooManyBlocks {
        /// Produced block count.
        count: usize,
        /// Configured ceiling.
        limit: usize,
    },
    /// A primary batch write failed.
    WriteFailed {
        /// Index of the failed batch.
        batch: usize,
        /// The failure.
        failure: WriteFailure,
    },
}

impl DegradeReason {
    /// The reason as an engine error.
    pub fn to_error(&self) -> SyncError {
        match self {
            DegradeReason::ConversionFailed(error) => SyncError::Conversion(error.clone()),
            DegradeReason::EmptyConversion => {
                SyncError::Conversion(StoreError::invalid("conversion produced no blocks"))
            }
            DegradeReason::TooManyBlocks { count, limit } => SyncError::TooManyBlocks {
                count: *count,
                limit: *limit,
            },
            DegradeReason::WriteFailed { failure, .. } => {
                SyncError::Store(failure.last_error.clone())
            }
        }
    }
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradeReason::WriteFailed { batch, failure } => {
                write!(f, "batch {batch}: {failure}")
            }
            other => write!(f, "{}", other.to_error()),
        }
    }
}

/// Tracks the phase of one run and enforces legal transitions.
#[derive(Debug)]
pub struct FallbackController {
    phase: SyncPhase,
    reason: Option<DegradeReason>,
}

impl FallbackController {
    /// Creates a controller in the primary phase.
    pub fn new() -> Self {
        Self {
            phase: SyncPhase::Primary,
            reason: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Why the run degraded, if it did.
    pub fn reason(&self) -> Option<&DegradeReason> {
        self.reason.as_ref()
    }

    /// Consumes the controller.
    pub fn into_parts(self) -> (SyncPhase, Option<DegradeReason>) {
        (self.phase, self.reason)
    }

    /// Moves to `next`.
    pub fn transition(&mut self, next: SyncPhase) -> SyncResult<()> {
        if !self.phase.can_transition_to(next) {
            return Err(SyncError::InvalidStateTransition {
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }
        info!(from = %self.phase, to = %next, "sync phase transition");
        self.phase = next;
        Ok(())
    }

    /// Leaves the primary path for `reason`.
    pub fn degrade(&mut self, reason: DegradeReason) -> SyncResult<()> {
        self.transition(SyncPhase::Degraded)?;
        warn!(reason = %reason, "degrading to plain-text fallback");
        self.reason = Some(reason);
        Ok(())
    }
}

impl Default for FallbackController {
    fn default() -> Self {
        Self::new()
    }
}

/// Content after applying the character ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Truncated {
    /// Content to convert or write.
    pub content: String,
    /// True if the input was cut.
    pub truncated: bool,
    /// Character count of the input.
    pub original_chars: usize,
}

/// Cuts `content` to `max_chars` characters and appends `notice` if it was
/// longer. Never splits a character.
pub fn truncate_content(content: &str, max_chars: usize, notice: &str) -> Truncated {
    let original_chars = content.chars().count();
    if original_chars <= max_chars {
        return Truncated {
            content: content.to_string(),
            truncated: false,
            original_chars,
        };
    }

    let cut = content
        .char_indices()
        .nth(max_chars)
        .map_or(content.len(), |(offset, _)| offset);
    let mut out = String::with_capacity(cut + notice.len());
    out.push_str(&content[..cut]);
    out.push_str(notice);
    Truncated {
        content: out,
        truncated: true,
        original_chars,
    }
}

/// The single plain-text block written in degraded mode.
pub fn fallback_block(content: &str, container_id: &BlockId) -> Block {
    Block::text(FALLBACK_BLOCK_ID, content).with_parent(container_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::WriteFailureKind;
    use docweave_model::{BlockPayload, TextKind};

    #[test]
    fn phase_transitions() {
        use SyncPhase::*;
        assert!(Primary.can_transition_to(Degraded));
        assert!(Primary.can_transition_to(Completed));
        assert!(Primary.can_transition_to(Failed));
        assert!(Degraded.can_transition_to(Completed));
        assert!(Degraded.can_transition_to(Failed));

        assert!(!Degraded.can_transition_to(Primary));
        assert!(!Degraded.can_transition_to(Degraded));
        assert!(!Completed.can_transition_to(Degraded));
        assert!(!Failed.can_transition_to(Completed));
        assert!(Completed.is_terminal() && Failed.is_terminal());
    }

    #[test]
    fn controller_rejects_illegal_transition() {
        let mut controller = FallbackController::new();
        controller.degrade(DegradeReason::EmptyConversion).unwrap();
        assert_eq!(controller.phase(), SyncPhase::Degraded);
        assert_eq!(controller.reason(), Some(&DegradeReason::EmptyConversion));

        let err = controller.transition(SyncPhase::Primary).unwrap_err();
        assert_eq!(
            err,
            SyncError::InvalidStateTransition {
                from: "degraded".into(),
                to: "primary".into(),
            }
        );

        controller.transition(SyncPhase::Completed).unwrap();
        assert!(controller.degrade(DegradeReason::EmptyConversion).is_err());
    }

    #[test]
    fn reason_display() {
        let reason = DegradeReason::TooManyBlocks {
            count: 1500,
            limit: 1000,
        };
        assert_eq!(
            reason.to_string(),
            "conversion produced 1500 blocks, limit is 1000"
        );

        let reason = DegradeReason::WriteFailed {
            batch: 1,
            failure: WriteFailure {
                kind: WriteFailureKind::TransientExhausted,
                attempts: 3,
                last_error: StoreError::rate_limited("slow down"),
            },
        };
        assert!(reason.to_string().starts_with("batch 1: write failed after 3"));
        assert!(matches!(reason.to_error(), SyncError::Store(_)));
    }

    #[test]
    fn short_content_untouched() {
        let out = truncate_content("hello", 5, "[cut]");
        assert_eq!(out.content, "hello");
        assert!(!out.truncated);
        assert_eq!(out.original_chars, 5);
    }

    #[test]
    fn truncation_appends_notice() {
        let input = "a".repeat(60_001);
        let out = truncate_content(&input, 60_000, "\n\n(cut)");
        assert!(out.truncated);
        assert_eq!(out.original_chars, 60_001);
        assert_eq!(out.content.chars().count(), 60_000 + "\n\n(cut)".len());
        assert!(out.content.ends_with("\n\n(cut)"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let out = truncate_content("日本語のテキスト", 3, "…");
        assert_eq!(out.content, "日本語…");
    }

    #[test]
    fn fallback_block_shape() {
        let block = fallback_block("# raw markdown", &BlockId::new("doc"));
        assert_eq!(block.id.as_str(), FALLBACK_BLOCK_ID);
        assert_eq!(block.parent_id, Some(BlockId::new("doc")));
        assert!(block.children.is_empty());
        match &block.payload {
            BlockPayload::Text { kind, content } => {
                assert_eq!(*kind, TextKind::Text);
                assert_eq!(content.plain_text(), "# raw markdown");
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
