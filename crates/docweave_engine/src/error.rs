//! Error types for the synchronization engine.

use docweave_model::BlockId;
use thiserror::Error;

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// HTTP status the store answers with when rate limiting.
pub const STATUS_RATE_LIMITED: u16 = 429;

/// HTTP status the store answers with while a fresh document is not yet visible.
pub const STATUS_NOT_YET_VISIBLE: u16 = 404;

/// Body-level error code the store uses for frequency limiting.
pub const CODE_RATE_LIMITED: i64 = 99_991_400;

/// Classification of a collaborator failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The store asked us to slow down.
    RateLimited,
    /// The target is not visible yet (propagation lag after creation).
    NotYetVisible,
    /// No response was received (timeout, connection failure).
    Network,
    /// Validation, permission, or any other final rejection.
    Permanent,
}

/// A failure reported by the document store or its transport.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("store error ({kind:?}, status={status:?}, code={code:?}): {message}")]
pub struct StoreError {
    /// Classification.
    pub kind: StoreErrorKind,
    /// HTTP status, if a response was received.
    pub status: Option<u16>,
    /// Body-level error code, if any.
    pub code: Option<i64>,
    /// Error message.
    pub message: String,
}

impl StoreError {
    /// Creates an error from a store response, classifying it.
    pub fn from_response(status: u16, code: Option<i64>, message: impl Into<String>) -> Self {
        let kind = if status == STATUS_RATE_LIMITED || code == Some(CODE_RATE_LIMITED) {
            StoreErrorKind::RateLimited
        } else if status == STATUS_NOT_YET_VISIBLE {
            StoreErrorKind::NotYetVisible
        } else {
            StoreErrorKind::Permanent
        };
        Self {
            kind,
            status: Some(status),
            code,
            message: message.into(),
        }
    }

    /// Creates a rate-limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::from_response(STATUS_RATE_LIMITED, None, message)
    }

    /// Creates a not-yet-visible error.
    pub fn not_yet_visible(message: impl Into<String>) -> Self {
        Self::from_response(STATUS_NOT_YET_VISIBLE, None, message)
    }

    /// Creates a permanent rejection with the given status.
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::from_response(status, None, message)
    }

    /// Creates an error for a call that produced no response.
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: StoreErrorKind::Network,
            status: None,
            code: None,
            message: message.into(),
        }
    }

    /// Creates a permanent error for a malformed or unusable response.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            kind: StoreErrorKind::Permanent,
            status: None,
            code: None,
            message: message.into(),
        }
    }

    /// Returns true if the call may succeed when retried after a delay.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            StoreErrorKind::RateLimited | StoreErrorKind::NotYetVisible | StoreErrorKind::Network
        )
    }
}

/// Structural defects in a block collection or batch. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    /// Nothing to write.
    #[error("block collection is empty")]
    EmptyCollection,

    /// A block has an empty ID.
    #[error("block at position {position} has no id")]
    MissingId {
        /// Position in the collection (or batch).
        position: usize,
    },

    /// Two blocks share an ID.
    #[error("duplicate block id {0}")]
    DuplicateId(BlockId),

    /// The top-level order lists an ID twice.
    #[error("top-level order lists {0} more than once")]
    DuplicateTopLevel(BlockId),

    /// The top-level order references a block not in the collection.
    #[error("top-level order references unknown block {0}")]
    UnknownTopLevel(BlockId),

    /// A batch contains no top-level block to anchor it.
    #[error("batch {batch} ({size} blocks) has no top-level block")]
    NoTopLevelAnchor {
        /// Batch index.
        batch: usize,
        /// Number of blocks in the batch.
        size: usize,
    },

    /// A batch lists top-level IDs it does not contain.
    #[error("batch {batch} lists top-level ids not in the batch: {missing:?}")]
    TopLevelNotInBatch {
        /// Batch index.
        batch: usize,
        /// The offending IDs.
        missing: Vec<BlockId>,
    },

    /// A block sits under the container but is not in the top-level order.
    #[error("block {block} in batch {batch} is under the container but not top-level")]
    NotAttached {
        /// Batch index.
        batch: usize,
        /// The block.
        block: BlockId,
    },

    /// A block's parent is neither in reach nor the container.
    #[error("block {block} in batch {batch} references unreachable parent {parent}")]
    UnreachableParent {
        /// Batch index.
        batch: usize,
        /// The block.
        block: BlockId,
        /// Its parent.
        parent: BlockId,
    },
}

/// Errors that can occur during synchronization.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Structural defect in the converted blocks.
    #[error("structural error: {0}")]
    Structural(#[from] StructuralError),

    /// A store call failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Markdown conversion failed.
    #[error("conversion failed: {0}")]
    Conversion(StoreError),

    /// Conversion produced more blocks than allowed.
    #[error("conversion produced {count} blocks, limit is {limit}")]
    TooManyBlocks {
        /// Produced block count.
        count: usize,
        /// Configured ceiling.
        limit: usize,
    },

    /// Invalid options.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// The operation was cancelled.
    #[error("synchronization cancelled")]
    Cancelled,

    /// Invalid phase transition.
    #[error("invalid phase transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current phase.
        from: String,
        /// Attempted target phase.
        to: String,
    },
}
