//! JSON wire format.
//!
//! Blocks travel as flat objects:
//!
//! ```json
//! { "block_id": "b1", "parent_id": "doc", "children": [],
//!   "block_type": 2, "text": { "elements": [...] } }
//! ```
//!
//! The payload sits under a key named after the block kind. Unknown block
//! types decode to [`BlockPayload::Opaque`] and encode back unchanged.

use crate::block::{Block, BlockId, BlockPayload, TableContent, TextContent, TextKind};
use crate::error::{ModelError, ModelResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Numeric block types with a dedicated payload.
pub mod block_type {
    /// Plain text paragraph.
    pub const TEXT: u32 = 2;
    /// Horizontal rule.
    pub const DIVIDER: u32 = 22;
    /// Table.
    pub const TABLE: u32 = 31;
    /// Table cell.
    pub const TABLE_CELL: u32 = 32;
}

/// Flat wire representation of a block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WireBlock {
    #[serde(default)]
    block_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<String>,
    block_type: u32,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

fn take_payload<T: DeserializeOwned + Default>(
    rest: &mut Map<String, Value>,
    key: &str,
    block_type: u32,
) -> ModelResult<T> {
    match rest.remove(key) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value).map_err(|source| ModelError::Payload {
            key: key.to_string(),
            block_type,
            source,
        }),
    }
}

impl TryFrom<WireBlock> for Block {
    type Error = ModelError;

    fn try_from(wire: WireBlock) -> ModelResult<Self> {
        let WireBlock {
            block_id,
            parent_id,
            children,
            block_type,
            mut rest,
        } = wire;

        let payload = if let Some(kind) = TextKind::from_code(block_type) {
            let content: TextContent = take_payload(&mut rest, &kind.payload_key(), block_type)?;
            BlockPayload::Text { kind, content }
        } else {
            match block_type {
                block_type::DIVIDER => {
                    rest.remove("divider");
                    BlockPayload::Divider
                }
                block_type::TABLE => {
                    let table: TableContent = take_payload(&mut rest, "table", block_type)?;
                    BlockPayload::Table(table)
                }
                block_type::TABLE_CELL => {
                    let cell: Map<String, Value> =
                        take_payload(&mut rest, "table_cell", block_type)?;
                    BlockPayload::TableCell(cell)
                }
                other => BlockPayload::Opaque {
                    block_type: other,
                    fields: std::mem::take(&mut rest),
                },
            }
        };

        Ok(Block {
            id: BlockId::new(block_id),
            parent_id: parent_id.filter(|p| !p.is_empty()).map(BlockId::new),
            children: children.into_iter().map(BlockId::new).collect(),
            payload,
            extra: rest,
        })
    }
}

impl From<Block> for WireBlock {
    fn from(block: Block) -> Self {
        let block_type = block.block_type();
        let mut rest = block.extra;
        match block.payload {
            BlockPayload::Text { kind, content } => {
                rest.insert(kind.payload_key(), to_value(&content));
            }
            BlockPayload::Divider => {
                rest.insert("divider".into(), Value::Object(Map::new()));
            }
            BlockPayload::Table(table) => {
                rest.insert("table".into(), to_value(&table));
            }
            BlockPayload::TableCell(cell) => {
                rest.insert("table_cell".into(), Value::Object(cell));
            }
            BlockPayload::Opaque { fields, .. } => {
                rest.extend(fields);
            }
        }
        WireBlock {
            block_id: block.id.as_str().to_string(),
            parent_id: block.parent_id.map(|p| p.as_str().to_string()),
            children: block
                .children
                .into_iter()
                .map(|c| c.as_str().to_string())
                .collect(),
            block_type,
            rest,
        }
    }
}

// Payload structs are plain maps, strings and numbers; serializing them cannot fail.
fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Output of a markdown conversion: a flat block list plus the order in
/// which top-level blocks must appear under the destination container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvertedDocument {
    /// All blocks, flat.
    pub blocks: Vec<Block>,
    /// Top-level block IDs in document order.
    #[serde(rename = "first_level_block_ids", default)]
    pub top_level_order: Vec<BlockId>,
}

impl ConvertedDocument {
    /// Creates a converted document.
    pub fn new(blocks: Vec<Block>, top_level_order: Vec<BlockId>) -> Self {
        Self {
            blocks,
            top_level_order,
        }
    }

    /// Decodes from JSON.
    pub fn from_json(json: &str) -> ModelResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encodes to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> ModelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Returns the number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns true if there are no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
