//! Write batches.

use crate::block::{Block, BlockId};
use std::collections::HashSet;

/// A contiguous slice of a block collection, written in one remote call.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Position of this batch in the write sequence (0-indexed).
    pub index: usize,
    /// Blocks in original order.
    pub blocks: Vec<Block>,
    /// Top-level IDs included in this batch, in original relative order.
    pub top_level_ids: Vec<BlockId>,
}

impl Batch {
    /// Creates a batch.
    pub fn new(index: usize, blocks: Vec<Block>, top_level_ids: Vec<BlockId>) -> Self {
        Self {
            index,
            blocks,
            top_level_ids,
        }
    }

    /// Returns the number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns true if the batch holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns the set of block IDs in this batch.
    pub fn block_ids(&self) -> HashSet<&BlockId> {
        self.blocks.iter().map(|b| &b.id).collect()
    }
}
