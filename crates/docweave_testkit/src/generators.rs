//! Property-based test generators.
//!
//! Provides proptest strategies for generating block collections.

use docweave_model::{Block, BlockId, ConvertedDocument};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;
use std::ops::Range;

/// Generates a three-level block forest in pre-order.
///
/// `roots` bounds the number of top-level blocks; `children` bounds both the
/// children per root and the grandchildren per child. Roots have no parent,
/// and `top_level_order` lists them in the order they appear.
pub fn forest_strategy(
    roots: Range<usize>,
    children: Range<usize>,
) -> impl Strategy<Value = ConvertedDocument> {
    prop::collection::vec(prop::collection::vec(children.clone(), children), roots)
        .prop_map(build_forest)
}

/// Builds a forest from its shape: `shape[i][j]` is the number of
/// grandchildren under child `j` of root `i`.
pub fn build_forest(shape: Vec<Vec<usize>>) -> ConvertedDocument {
    let mut blocks = Vec::new();
    let mut order = Vec::with_capacity(shape.len());

    for (i, kids) in shape.iter().enumerate() {
        let root = format!("r{i}");
        let child_ids: Vec<String> = (0..kids.len()).map(|j| format!("{root}.c{j}")).collect();
        blocks.push(Block::text(root.as_str(), format!("root {i}")).with_children(child_ids.clone()));
        order.push(BlockId::new(root.as_str()));

        for (child, grandkids) in child_ids.iter().zip(kids) {
            let grand_ids: Vec<String> = (0..*grandkids).map(|k| format!("{child}.g{k}")).collect();
            blocks.push(
                Block::text(child.as_str(), child.as_str())
                    .with_parent(root.as_str())
                    .with_children(grand_ids.clone()),
            );
            for grand in grand_ids {
                blocks.push(Block::text(grand.as_str(), grand.as_str()).with_parent(child.as_str()));
            }
        }
    }

    ConvertedDocument::new(blocks, order)
}

/// Generates markdown-ish text with headings, list items and paragraphs.
pub fn markdown_strategy() -> impl Strategy<Value = String> {
    let line = prop_oneof![
        "[a-z ]{1,40}".prop_map(|s| format!("{s}\n")),
        "[a-z ]{1,20}".prop_map(|s| format!("# {s}\n")),
        "[a-z ]{1,20}".prop_map(|s| format!("- {s}\n")),
    ];
    prop::collection::vec(line, 1..30).prop_map(|lines| lines.join("\n"))
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    #[test]
    fn build_forest_shape() {
        let doc = build_forest(vec![vec![2, 0], vec![]]);
        let ids: Vec<&str> = doc.blocks.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["r0", "r0.c0", "r0.c0.g0", "r0.c0.g1", "r0.c1", "r1"]
        );
        assert_eq!(doc.top_level_order, vec![BlockId::new("r0"), BlockId::new("r1")]);
        assert_eq!(doc.blocks[1].children.len(), 2);
    }

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn forest_parents_precede_children(doc in forest_strategy(1..10, 0..4)) {
            let mut position = HashMap::new();
            for (i, block) in doc.blocks.iter().enumerate() {
                prop_assert!(position.insert(block.id.clone(), i).is_none());
            }
            for (i, block) in doc.blocks.iter().enumerate() {
                if let Some(parent) = &block.parent_id {
                    prop_assert!(position[parent] < i);
                }
            }
            let roots: HashSet<_> = doc
                .blocks
                .iter()
                .filter(|b| b.parent_id.is_none())
                .map(|b| b.id.clone())
                .collect();
            prop_assert_eq!(roots.len(), doc.top_level_order.len());
        }

        #[test]
        fn markdown_is_nonempty(text in markdown_strategy()) {
            prop_assert!(!text.trim().is_empty());
        }
    }
}
