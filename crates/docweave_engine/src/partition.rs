//! Batch partitioning.
//!
//! Splits a flat block collection into contiguous, size-bounded slices.
//! Blocks are never reordered; each batch carries the part of the global
//! top-level order that falls inside it.

use crate::error::StructuralError;
use docweave_model::{Batch, Block, BlockId};
use std::collections::HashSet;

/// Partitions `blocks` into batches of at most `max_batch_size` blocks.
///
/// Fails if the collection is empty or if any slice would contain no
/// top-level block, since such a batch cannot be anchored under the
/// container.
pub fn partition(
    blocks: Vec<Block>,
    top_level_order: &[BlockId],
    max_batch_size: usize,
) -> Result<Vec<Batch>, StructuralError> {
    if blocks.is_empty() {
        return Err(StructuralError::EmptyCollection);
    }
    let size = max_batch_size.max(1);

    let mut batches = Vec::with_capacity(blocks.len().div_ceil(size));
    let mut remaining = blocks.into_iter().peekable();

    while remaining.peek().is_some() {
        let index = batches.len();
        let slice: Vec<Block> = remaining.by_ref().take(size).collect();

        let ids: HashSet<&BlockId> = slice.iter().map(|b| &b.id).collect();
        let top_level_ids: Vec<BlockId> = top_level_order
            .iter()
            .filter(|id| ids.contains(id))
            .cloned()
            .collect();

        if top_level_ids.is_empty() {
            return Err(StructuralError::NoTopLevelAnchor {
                batch: index,
                size: slice.len(),
            });
        }

        batches.push(Batch::new(index, slice, top_level_ids));
    }

    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docweave_testkit::{flat_document, forest_strategy, PropTestConfig};
    use proptest::prelude::*;

    #[test]
    fn twelve_hundred_blocks_split_500_500_200() {
        let doc = flat_document(1200);
        let order = doc.top_level_order.clone();
        let batches = partition(doc.blocks, &order, 500).unwrap();

        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![500, 500, 200]);

        let all_top: Vec<BlockId> = batches
            .iter()
            .flat_map(|b| b.top_level_ids.iter().cloned())
            .collect();
        assert_eq!(all_top, order);
    }

    #[test]
    fn empty_collection_rejected() {
        assert_eq!(
            partition(Vec::new(), &[], 10),
            Err(StructuralError::EmptyCollection)
        );
    }

    #[test]
    fn unanchored_slice_rejected() {
        // One root followed by four descendants; the second slice has no root.
        let blocks = vec![
            Block::text("r", "root"),
            Block::text("a", "a").with_parent("r"),
            Block::text("b", "b").with_parent("r"),
            Block::text("c", "c").with_parent("r"),
            Block::text("d", "d").with_parent("r"),
        ];
        let err = partition(blocks, &[BlockId::new("r")], 3).unwrap_err();
        assert_eq!(err, StructuralError::NoTopLevelAnchor { batch: 1, size: 2 });
    }

    #[test]
    fn top_level_ids_follow_global_order() {
        // Global order lists "b" before "a", which differs from slice order.
        let blocks = vec![Block::text("a", "a"), Block::text("b", "b")];
        let order = vec![BlockId::new("b"), BlockId::new("a")];
        let batches = partition(blocks, &order, 10).unwrap();
        assert_eq!(batches[0].top_level_ids, order);
    }

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn concatenation_reproduces_collection(
            doc in forest_strategy(1..40, 0..4),
            size in 1usize..50,
        ) {
            let original = doc.blocks.clone();
            match partition(doc.blocks, &doc.top_level_order, size) {
                Ok(batches) => {
                    let rejoined: Vec<Block> =
                        batches.iter().flat_map(|b| b.blocks.iter().cloned()).collect();
                    prop_assert_eq!(rejoined, original);

                    for (i, batch) in batches.iter().enumerate() {
                        prop_assert_eq!(batch.index, i);
                        prop_assert!(batch.len() <= size);
                        prop_assert!(!batch.top_level_ids.is_empty());
                        let ids = batch.block_ids();
                        for id in &batch.top_level_ids {
                            prop_assert!(ids.contains(id));
                        }
                    }

                    let all_top: Vec<BlockId> = batches
                        .iter()
                        .flat_map(|b| b.top_level_ids.iter().cloned())
                        .collect();
                    prop_assert_eq!(all_top, doc.top_level_order);
                }
                Err(StructuralError::NoTopLevelAnchor { .. }) => {}
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }
    }
}
