//! Test fixtures.
//!
//! Canned block collections and temporary files for common test scenarios.

use docweave_model::{Block, BlockId, BlockPayload, ConvertedDocument, TableContent, TextKind};
use serde_json::{json, Map};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// `count` top-level paragraphs `p0`, `p1`, ...
pub fn flat_document(count: usize) -> ConvertedDocument {
    let blocks: Vec<Block> = (0..count)
        .map(|i| Block::text(format!("p{i}"), format!("paragraph {i}")))
        .collect();
    let order = blocks.iter().map(|b| b.id.clone()).collect();
    ConvertedDocument::new(blocks, order)
}

/// One top-level block with `count` direct children.
///
/// Any partition smaller than the whole collection leaves a batch with no
/// top-level block.
pub fn wide_tree_document(count: usize) -> ConvertedDocument {
    let child_ids: Vec<String> = (0..count).map(|i| format!("item{i}")).collect();
    let mut blocks = vec![Block::new(
        "list",
        BlockPayload::Text {
            kind: TextKind::Bullet,
            content: docweave_model::TextContent::plain("list"),
        },
    )
    .with_children(child_ids.clone())];
    blocks.extend(
        child_ids
            .iter()
            .map(|id| Block::text(id.as_str(), id.as_str()).with_parent("list")),
    );
    ConvertedDocument::new(blocks, vec![BlockId::new("list")])
}

/// A heading followed by a 2x2 table whose table block carries `merge_info`.
pub fn table_document() -> ConvertedDocument {
    let cells: Vec<String> = (0..4).map(|i| format!("cell{i}")).collect();

    let mut table = TableContent::new(2, 2);
    table.cells = cells.iter().map(|c| BlockId::new(c.as_str())).collect();
    table.property.merge_info = Some(vec![
        json!({ "row_span": 1, "col_span": 1 });
        4
    ]);

    let mut blocks = vec![
        Block::new(
            "title",
            BlockPayload::Text {
                kind: TextKind::Heading(1),
                content: docweave_model::TextContent::plain("Quarterly numbers"),
            },
        ),
        Block::new("tbl", BlockPayload::Table(table)).with_children(cells.clone()),
    ];
    for (i, cell) in cells.iter().enumerate() {
        let text = format!("{cell}.text");
        blocks.push(
            Block::new(cell.as_str(), BlockPayload::TableCell(Map::new()))
                .with_parent("tbl")
                .with_children([text.clone()]),
        );
        blocks.push(Block::text(text.as_str(), format!("value {i}")).with_parent(cell.as_str()));
    }

    ConvertedDocument::new(blocks, vec![BlockId::new("title"), BlockId::new("tbl")])
}

/// A conversion response payload as the remote store returns it.
pub fn sample_convert_json() -> String {
    json!({
        "first_level_block_ids": ["h", "l"],
        "blocks": [
            {
                "block_id": "h",
                "block_type": 3,
                "heading1": { "elements": [{ "text_run": { "content": "Weekly report" } }] }
            },
            {
                "block_id": "l",
                "block_type": 12,
                "parent_id": "",
                "children": ["l.1"],
                "bullet": { "elements": [{ "text_run": { "content": "Shipped" } }] }
            },
            {
                "block_id": "l.1",
                "block_type": 2,
                "parent_id": "l",
                "text": { "elements": [{ "text_run": { "content": "sync engine" } }] }
            },
            {
                "block_id": "v",
                "block_type": 43,
                "parent_id": "l",
                "board": { "token": "opaque" }
            }
        ]
    })
    .to_string()
}

/// A temporary directory holding files written by a test.
pub struct TempFiles {
    dir: TempDir,
}

impl TempFiles {
    /// Creates an empty temporary directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Writes `contents` to `name` and returns its path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).expect("Failed to write temp file");
        path
    }

    /// Directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl Default for TempFiles {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_document_is_all_top_level() {
        let doc = flat_document(5);
        assert_eq!(doc.len(), 5);
        assert_eq!(doc.top_level_order.len(), 5);
        assert!(doc.blocks.iter().all(|b| b.parent_id.is_none()));
    }

    #[test]
    fn table_document_carries_merge_info() {
        let doc = table_document();
        let table = doc.blocks.iter().find(|b| b.id.as_str() == "tbl").unwrap();
        assert!(table.has_read_only_metadata());
        assert_eq!(doc.len(), 10);
    }

    #[test]
    fn sample_json_decodes() {
        let doc = ConvertedDocument::from_json(&sample_convert_json()).unwrap();
        assert_eq!(doc.len(), 4);
        assert_eq!(doc.blocks[3].block_type(), 43);
    }

    #[test]
    fn temp_files_roundtrip() {
        let files = TempFiles::new();
        let path = files.write("note.md", "# hi");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# hi");
        assert!(files.path().exists());
    }
}
