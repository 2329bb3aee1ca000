//! Batch validation.
//!
//! Runs before a batch is transmitted. The only silent rewrite is filling in
//! a missing parent with the container ID; stripping read-only table metadata
//! and repairing out-of-reach blocks are reported back to the caller. No block
//! leaves validation without a path to the container.

use crate::config::ParentRepairPolicy;
use crate::error::StructuralError;
use docweave_model::{Batch, Block, BlockId};
use std::collections::HashSet;
use tracing::warn;

/// Changes made while validating one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Batch index.
    pub batch: usize,
    /// Blocks whose empty parent was set to the container.
    pub normalized_parents: usize,
    /// Table-family blocks that had read-only metadata removed.
    pub stripped_tables: usize,
    /// Blocks attached to the container as top-level because their parent was
    /// out of reach or they were missing from the top-level order.
    pub repaired: Vec<BlockId>,
}

impl ValidationReport {
    /// Returns true if validation changed nothing.
    pub fn is_clean(&self) -> bool {
        self.normalized_parents == 0 && self.stripped_tables == 0 && self.repaired.is_empty()
    }
}

/// Checks a whole collection before it is partitioned: every block has a
/// unique, non-empty ID, and the top-level order references each known
/// block at most once.
pub fn validate_collection(
    blocks: &[Block],
    top_level_order: &[BlockId],
) -> Result<(), StructuralError> {
    let mut seen = HashSet::with_capacity(blocks.len());
    for (position, block) in blocks.iter().enumerate() {
        if block.id.is_empty() {
            return Err(StructuralError::MissingId { position });
        }
        if !seen.insert(&block.id) {
            return Err(StructuralError::DuplicateId(block.id.clone()));
        }
    }

    let mut listed = HashSet::with_capacity(top_level_order.len());
    for id in top_level_order {
        if !seen.contains(id) {
            return Err(StructuralError::UnknownTopLevel(id.clone()));
        }
        if !listed.insert(id) {
            return Err(StructuralError::DuplicateTopLevel(id.clone()));
        }
    }
    Ok(())
}

/// Validates batches in write order.
///
/// Tracks which block IDs earlier batches have committed, so a parent
/// written by a previous batch counts as reachable.
#[derive(Debug, Clone)]
pub struct BatchValidator {
    container_id: BlockId,
    policy: ParentRepairPolicy,
    written: HashSet<BlockId>,
}

impl BatchValidator {
    /// Creates a validator for writes under `container_id`.
    pub fn new(container_id: BlockId, policy: ParentRepairPolicy) -> Self {
        Self {
            container_id,
            policy,
            written: HashSet::new(),
        }
    }

    /// Returns the container ID.
    pub fn container_id(&self) -> &BlockId {
        &self.container_id
    }

    /// Records a batch's blocks as committed.
    pub fn mark_written(&mut self, batch: &Batch) {
        self.written.extend(batch.blocks.iter().map(|b| b.id.clone()));
    }

    /// Returns true if `id` was committed by an earlier batch.
    pub fn is_written(&self, id: &BlockId) -> bool {
        self.written.contains(id)
    }

    /// Validates and normalizes a batch in place.
    ///
    /// Running it again on its own output changes nothing.
    pub fn validate(&self, batch: &mut Batch) -> Result<ValidationReport, StructuralError> {
        let mut report = ValidationReport {
            batch: batch.index,
            ..ValidationReport::default()
        };

        for (position, block) in batch.blocks.iter_mut().enumerate() {
            if block.id.is_empty() {
                return Err(StructuralError::MissingId { position });
            }
            if block.parent_id.as_ref().map_or(true, BlockId::is_empty) {
                block.parent_id = Some(self.container_id.clone());
                report.normalized_parents += 1;
            }
            if block.strip_read_only() {
                report.stripped_tables += 1;
            }
        }

        let ids: HashSet<BlockId> = batch.blocks.iter().map(|b| b.id.clone()).collect();

        let missing: Vec<BlockId> = batch
            .top_level_ids
            .iter()
            .filter(|id| !ids.contains(*id))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(StructuralError::TopLevelNotInBatch {
                batch: batch.index,
                missing,
            });
        }

        for block in &mut batch.blocks {
            let Some(parent) = block.parent_id.as_ref() else {
                continue;
            };
            // Under the container but outside the top-level order, a block
            // would be stored without being attached to the tree.
            let detached = if parent == &self.container_id {
                !batch.top_level_ids.contains(&block.id)
            } else {
                !ids.contains(parent) && !self.written.contains(parent)
            };
            if !detached {
                continue;
            }
            match self.policy {
                ParentRepairPolicy::Strict if parent == &self.container_id => {
                    return Err(StructuralError::NotAttached {
                        batch: batch.index,
                        block: block.id.clone(),
                    });
                }
                ParentRepairPolicy::Strict => {
                    return Err(StructuralError::UnreachableParent {
                        batch: batch.index,
                        block: block.id.clone(),
                        parent: parent.clone(),
                    });
                }
                ParentRepairPolicy::Repair => {
                    warn!(
                        batch = batch.index,
                        block = %block.id,
                        parent = %parent,
                        "block out of reach, attaching it to the container"
                    );
                    block.parent_id = Some(self.container_id.clone());
                    if !batch.top_level_ids.contains(&block.id) {
                        batch.top_level_ids.push(block.id.clone());
                    }
                    report.repaired.push(block.id.clone());
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docweave_model::{BlockPayload, TableContent};
    use docweave_testkit::{forest_strategy, PropTestConfig};
    use proptest::prelude::*;
    use serde_json::json;

    fn container() -> BlockId {
        BlockId::new("doc")
    }

    fn batch(blocks: Vec<Block>, top: &[&str]) -> Batch {
        Batch::new(0, blocks, top.iter().map(|s| BlockId::new(*s)).collect())
    }

    #[test]
    fn collection_rejects_missing_id() {
        let blocks = vec![Block::text("a", "1"), Block::text("", "2")];
        assert_eq!(
            validate_collection(&blocks, &[BlockId::new("a")]),
            Err(StructuralError::MissingId { position: 1 })
        );
    }

    #[test]
    fn collection_rejects_duplicates_and_unknown_ids() {
        let blocks = vec![Block::text("a", "1"), Block::text("a", "2")];
        assert_eq!(
            validate_collection(&blocks, &[]),
            Err(StructuralError::DuplicateId(BlockId::new("a")))
        );

        let blocks = vec![Block::text("a", "1")];
        assert_eq!(
            validate_collection(&blocks, &[BlockId::new("zz")]),
            Err(StructuralError::UnknownTopLevel(BlockId::new("zz")))
        );
        assert_eq!(
            validate_collection(&blocks, &[BlockId::new("a"), BlockId::new("a")]),
            Err(StructuralError::DuplicateTopLevel(BlockId::new("a")))
        );
    }

    #[test]
    fn normalizes_missing_parent() {
        let validator = BatchValidator::new(container(), ParentRepairPolicy::Repair);
        let mut b = batch(
            vec![Block::text("a", "1"), Block::text("b", "2").with_parent("")],
            &["a", "b"],
        );
        let report = validator.validate(&mut b).unwrap();
        assert_eq!(report.normalized_parents, 2);
        assert!(b.blocks.iter().all(|x| x.parent_id == Some(container())));
    }

    #[test]
    fn strips_table_metadata() {
        let mut table = TableContent::new(1, 1);
        table.property.merge_info = Some(vec![json!({ "row_span": 1, "col_span": 1 })]);
        let mut b = batch(vec![Block::new("t", BlockPayload::Table(table))], &["t"]);

        let validator = BatchValidator::new(container(), ParentRepairPolicy::Repair);
        let report = validator.validate(&mut b).unwrap();
        assert_eq!(report.stripped_tables, 1);
        assert!(!b.blocks[0].has_read_only_metadata());
    }

    #[test]
    fn rejects_top_level_id_outside_batch() {
        let validator = BatchValidator::new(container(), ParentRepairPolicy::Repair);
        let mut b = batch(vec![Block::text("a", "1")], &["a", "ghost"]);
        let err = validator.validate(&mut b).unwrap_err();
        assert_eq!(
            err,
            StructuralError::TopLevelNotInBatch {
                batch: 0,
                missing: vec![BlockId::new("ghost")],
            }
        );
    }

    #[test]
    fn repairs_unreachable_parent() {
        let validator = BatchValidator::new(container(), ParentRepairPolicy::Repair);
        let mut b = batch(
            vec![
                Block::text("a", "1"),
                Block::text("orphan", "2").with_parent("elsewhere"),
            ],
            &["a"],
        );
        let report = validator.validate(&mut b).unwrap();
        assert_eq!(report.repaired, vec![BlockId::new("orphan")]);
        assert_eq!(b.blocks[1].parent_id, Some(container()));
        assert_eq!(
            b.top_level_ids,
            vec![BlockId::new("a"), BlockId::new("orphan")]
        );
    }

    #[test]
    fn strict_policy_rejects_unreachable_parent() {
        let validator = BatchValidator::new(container(), ParentRepairPolicy::Strict);
        let mut b = batch(
            vec![
                Block::text("a", "1"),
                Block::text("orphan", "2").with_parent("elsewhere"),
            ],
            &["a"],
        );
        assert!(matches!(
            validator.validate(&mut b),
            Err(StructuralError::UnreachableParent { .. })
        ));
    }

    #[test]
    fn attaches_block_missing_from_top_level_order() {
        let validator = BatchValidator::new(container(), ParentRepairPolicy::Repair);
        let mut b = batch(
            vec![Block::text("a", "top"), Block::text("b", "kept")],
            &["a"],
        );
        let report = validator.validate(&mut b).unwrap();
        assert_eq!(report.repaired, vec![BlockId::new("b")]);
        assert_eq!(b.blocks[1].parent_id, Some(container()));
        assert_eq!(b.top_level_ids, vec![BlockId::new("a"), BlockId::new("b")]);

        // Explicitly parented to the container counts the same.
        let mut b = batch(
            vec![Block::text("a", "top"), Block::text("c", "kept").with_parent("doc")],
            &["a"],
        );
        let report = validator.validate(&mut b).unwrap();
        assert_eq!(report.repaired, vec![BlockId::new("c")]);
        assert_eq!(report.normalized_parents, 1);
    }

    #[test]
    fn strict_policy_rejects_block_missing_from_top_level_order() {
        let validator = BatchValidator::new(container(), ParentRepairPolicy::Strict);
        let mut b = batch(
            vec![Block::text("a", "top"), Block::text("b", "kept")],
            &["a"],
        );
        assert_eq!(
            validator.validate(&mut b),
            Err(StructuralError::NotAttached {
                batch: 0,
                block: BlockId::new("b"),
            })
        );
    }

    #[test]
    fn parent_in_earlier_batch_is_reachable() {
        let mut validator = BatchValidator::new(container(), ParentRepairPolicy::Strict);
        let mut first = batch(vec![Block::text("a", "1")], &["a"]);
        validator.validate(&mut first).unwrap();
        validator.mark_written(&first);
        assert!(validator.is_written(&BlockId::new("a")));

        let mut second = Batch::new(
            1,
            vec![
                Block::text("b", "2"),
                Block::text("a.1", "child").with_parent("a"),
            ],
            vec![BlockId::new("b")],
        );
        let report = validator.validate(&mut second).unwrap();
        assert!(report.repaired.is_empty());
        assert_eq!(second.blocks[1].parent_id, Some(BlockId::new("a")));
    }

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn validation_is_a_fixed_point(doc in forest_strategy(1..20, 0..4)) {
            let validator = BatchValidator::new(container(), ParentRepairPolicy::Repair);
            let mut b = Batch::new(0, doc.blocks, doc.top_level_order);

            validator.validate(&mut b).unwrap();
            let once = b.clone();
            let second = validator.validate(&mut b).unwrap();

            prop_assert!(second.is_clean());
            prop_assert_eq!(b, once);
        }

        #[test]
        fn every_parent_reachable_after_validation(
            doc in forest_strategy(1..20, 0..4),
            detach in proptest::collection::vec(any::<bool>(), 0..80),
        ) {
            // Point some parents somewhere unknown.
            let mut blocks = doc.blocks;
            for (block, cut) in blocks.iter_mut().zip(detach) {
                if cut && block.parent_id.is_some() {
                    block.parent_id = Some(BlockId::new("missing"));
                }
            }
            let validator = BatchValidator::new(container(), ParentRepairPolicy::Repair);
            let mut b = Batch::new(0, blocks, doc.top_level_order);
            validator.validate(&mut b).unwrap();

            let ids = b.block_ids();
            for block in &b.blocks {
                let parent = block.parent_id.as_ref().unwrap();
                if parent == &container() {
                    prop_assert!(b.top_level_ids.contains(&block.id));
                } else {
                    prop_assert!(ids.contains(parent));
                }
            }
        }

        #[test]
        fn repaired_batch_is_a_fixed_point(
            doc in forest_strategy(1..20, 0..4),
            detach in proptest::collection::vec(0u8..3, 0..80),
        ) {
            // 1: unknown parent, 2: no parent and absent from the order.
            let mut blocks = doc.blocks;
            for (block, cut) in blocks.iter_mut().zip(detach) {
                if block.parent_id.is_some() {
                    match cut {
                        1 => block.parent_id = Some(BlockId::new("missing")),
                        2 => block.parent_id = None,
                        _ => {}
                    }
                }
            }
            let validator = BatchValidator::new(container(), ParentRepairPolicy::Repair);
            let mut b = Batch::new(0, blocks, doc.top_level_order);

            validator.validate(&mut b).unwrap();
            let once = b.clone();
            let second = validator.validate(&mut b).unwrap();

            prop_assert!(second.is_clean());
            prop_assert_eq!(b, once);
        }
    }
}
