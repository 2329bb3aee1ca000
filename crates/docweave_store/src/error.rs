//! Error types for the reference store.

use docweave_engine::StoreError;
use docweave_model::BlockId;
use thiserror::Error;

/// Body-level code answered with every rejected write.
pub const CODE_INVALID_PARAM: i64 = 1_770_001;

/// Why a descendant write was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteRejection {
    /// The container is neither the document root nor a stored block.
    #[error("container block {0} not found")]
    UnknownContainer(BlockId),

    /// More descendants than allowed.
    #[error("{count} descendants exceed the limit of {limit}")]
    TooManyDescendants {
        /// Blocks sent.
        count: usize,
        /// Limit.
        limit: usize,
    },

    /// `children_id` is empty.
    #[error("children_id is empty")]
    NoChildren,

    /// `children_id` references a block not among the descendants.
    #[error("children_id references {0}, which is not a descendant")]
    ChildNotInDescendants(BlockId),

    /// A descendant has an empty ID.
    #[error("descendant without block_id")]
    MissingId,

    /// A block ID is repeated within one write.
    #[error("block id {0} is repeated")]
    DuplicateId(BlockId),

    /// A descendant's parent is not reachable.
    #[error("parent {parent} of {block} not found")]
    UnknownParent {
        /// The block.
        block: BlockId,
        /// Its parent.
        parent: BlockId,
    },

    /// A table carries read-only metadata.
    #[error("block {0} sets read-only field merge_info")]
    ReadOnlyField(BlockId),
}

impl From<WriteRejection> for StoreError {
    fn from(rejection: WriteRejection) -> Self {
        StoreError::from_response(400, Some(CODE_INVALID_PARAM), rejection.to_string())
    }
}

/// Markdown conversion failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// Conversion produced more blocks than the converter allows.
    #[error("conversion produced {count} blocks, limit is {limit}")]
    TooManyBlocks {
        /// Produced count.
        count: usize,
        /// Limit.
        limit: usize,
    },
}

impl From<ConvertError> for StoreError {
    fn from(error: ConvertError) -> Self {
        StoreError::from_response(400, Some(CODE_INVALID_PARAM), error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docweave_engine::StoreErrorKind;

    #[test]
    fn rejections_are_permanent() {
        let err: StoreError = WriteRejection::NoChildren.into();
        assert_eq!(err.kind, StoreErrorKind::Permanent);
        assert_eq!(err.status, Some(400));
        assert_eq!(err.code, Some(CODE_INVALID_PARAM));
        assert_eq!(err.message, "children_id is empty");
    }
}
