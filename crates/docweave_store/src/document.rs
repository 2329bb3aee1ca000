//! Stored documents.

use docweave_model::{Block, BlockId};
use std::collections::{HashMap, HashSet};

/// A document held by the in-memory store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: String,
    top_level: Vec<BlockId>,
    blocks: HashMap<BlockId, Block>,
    /// Temporary ID of every written block to the ID it is stored under.
    aliases: HashMap<BlockId, BlockId>,
    next_suffix: u64,
}

impl Document {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            top_level: Vec::new(),
            blocks: HashMap::new(),
            aliases: HashMap::new(),
            next_suffix: 1,
        }
    }

    /// Document ID; also the ID of its root block.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Direct children of the root, in order.
    pub fn top_level(&self) -> &[BlockId] {
        &self.top_level
    }

    /// Returns a stored block.
    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    /// Returns true if `id` is the root or a stored block.
    pub fn contains(&self, id: &BlockId) -> bool {
        id.as_str() == self.id || self.blocks.contains_key(id)
    }

    /// Resolves an ID sent by an earlier write to its stored ID.
    ///
    /// Temporary IDs resolve to the block most recently written under them.
    pub fn resolve(&self, id: &BlockId) -> Option<BlockId> {
        match self.aliases.get(id) {
            Some(stored) => Some(stored.clone()),
            None => self.contains(id).then(|| id.clone()),
        }
    }

    /// Number of stored blocks, root excluded.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns true if nothing was written yet.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Children of `id` in order; the root's children for the document ID.
    pub fn children_of(&self, id: &BlockId) -> Vec<BlockId> {
        if id.as_str() == self.id {
            self.top_level.clone()
        } else {
            self.blocks
                .get(id)
                .map(|b| b.children.clone())
                .unwrap_or_default()
        }
    }

    /// Concatenated plain text of every text block, depth-first in order.
    pub fn plain_text(&self) -> String {
        let mut out = Vec::new();
        let mut stack: Vec<BlockId> = self.top_level.iter().rev().cloned().collect();
        while let Some(id) = stack.pop() {
            let Some(block) = self.blocks.get(&id) else {
                continue;
            };
            if let docweave_model::BlockPayload::Text { content, .. } = &block.payload {
                out.push(content.plain_text());
            }
            stack.extend(block.children.iter().rev().cloned());
        }
        out.join("\n")
    }

    /// Inserts `blocks` and appends `top_level_ids` to `container`.
    ///
    /// Incoming IDs that are already taken are stored under a fresh ID, the
    /// way the remote store assigns its own IDs to temporary ones.
    pub(crate) fn apply(&mut self, container: &BlockId, top_level_ids: &[BlockId], blocks: &[Block]) {
        let sent: HashSet<&BlockId> = blocks.iter().map(|b| &b.id).collect();
        let mut renames: HashMap<BlockId, BlockId> = HashMap::with_capacity(blocks.len());
        for block in blocks {
            let stored = if self.contains(&block.id) {
                self.fresh_id(&block.id, &sent)
            } else {
                block.id.clone()
            };
            renames.insert(block.id.clone(), stored);
        }

        let stored: Vec<Block> = blocks
            .iter()
            .map(|block| {
                let mut block = block.clone();
                block.id = renames[&block.id].clone();
                block.parent_id = block
                    .parent_id
                    .map(|parent| self.stored_parent(&renames, container, parent));
                block.children = block
                    .children
                    .iter()
                    .map(|child| renames.get(child).cloned().unwrap_or_else(|| child.clone()))
                    .collect();
                block
            })
            .collect();

        // Blocks hanging off an earlier write are linked into their parent.
        let incoming: HashSet<&BlockId> = renames.values().collect();
        for block in &stored {
            let Some(parent_id) = &block.parent_id else {
                continue;
            };
            if parent_id == container || incoming.contains(parent_id) {
                continue;
            }
            if let Some(parent) = self.blocks.get_mut(parent_id) {
                if !parent.children.contains(&block.id) {
                    parent.children.push(block.id.clone());
                }
            }
        }

        let top_level: Vec<BlockId> = top_level_ids
            .iter()
            .map(|id| renames.get(id).cloned().unwrap_or_else(|| id.clone()))
            .collect();
        for block in stored {
            self.blocks.insert(block.id.clone(), block);
        }
        self.aliases.extend(renames);
        if container.as_str() == self.id {
            self.top_level.extend(top_level);
        } else if let Some(parent) = self.blocks.get_mut(container) {
            parent.children.extend(top_level);
        }
    }

    fn stored_parent(
        &self,
        renames: &HashMap<BlockId, BlockId>,
        container: &BlockId,
        parent: BlockId,
    ) -> BlockId {
        if let Some(renamed) = renames.get(&parent) {
            return renamed.clone();
        }
        if &parent == container {
            return parent;
        }
        self.resolve(&parent).unwrap_or(parent)
    }

    fn fresh_id(&mut self, id: &BlockId, sent: &HashSet<&BlockId>) -> BlockId {
        loop {
            let candidate = BlockId::new(format!("{id}_{}", self.next_suffix));
            self.next_suffix += 1;
            if !self.contains(&candidate) && !sent.contains(&candidate) {
                return candidate;
            }
        }
    }
}
