//! Block types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// Key of the server-assigned, read-only merge/layout metadata on table blocks.
pub const READ_ONLY_TABLE_KEY: &str = "merge_info";

/// Identifier of a block, unique within one conversion output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    /// Creates a block ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the ID is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for BlockId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for BlockId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Kind of a text-bearing block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    /// Plain paragraph.
    Text,
    /// Heading, level 1 through 9.
    Heading(u8),
    /// Bulleted list item.
    Bullet,
    /// Ordered list item.
    Ordered,
    /// Code block.
    Code,
    /// Quote.
    Quote,
    /// Todo item.
    Todo,
}

impl TextKind {
    /// Converts to the numeric block type used on the wire.
    pub fn to_code(&self) -> u32 {
        match self {
            TextKind::Text => 2,
            TextKind::Heading(level) => 2 + u32::from((*level).clamp(1, 9)),
            TextKind::Bullet => 12,
            TextKind::Ordered => 13,
            TextKind::Code => 14,
            TextKind::Quote => 15,
            TextKind::Todo => 17,
        }
    }

    /// Converts from a numeric block type.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            2 => Some(TextKind::Text),
            3..=11 => Some(TextKind::Heading((code - 2) as u8)),
            12 => Some(TextKind::Bullet),
            13 => Some(TextKind::Ordered),
            14 => Some(TextKind::Code),
            15 => Some(TextKind::Quote),
            17 => Some(TextKind::Todo),
            _ => None,
        }
    }

    /// Returns the wire key that holds this kind's payload.
    pub fn payload_key(&self) -> String {
        match self {
            TextKind::Text => "text".into(),
            TextKind::Heading(level) => format!("heading{}", (*level).clamp(1, 9)),
            TextKind::Bullet => "bullet".into(),
            TextKind::Ordered => "ordered".into(),
            TextKind::Code => "code".into(),
            TextKind::Quote => "quote".into(),
            TextKind::Todo => "todo".into(),
        }
    }
}

/// Content of a text-bearing block: a list of inline elements.
///
/// Elements are kept as raw JSON; the engine never inspects them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    /// Inline elements (text runs, mentions, equations...).
    #[serde(default)]
    pub elements: Vec<Value>,
    /// Style and any other fields, passed through.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TextContent {
    /// Creates content holding a single unstyled text run.
    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            elements: vec![json!({ "text_run": { "content": content.into() } })],
            extra: Map::new(),
        }
    }

    /// Concatenates the content of every text run.
    pub fn plain_text(&self) -> String {
        self.elements
            .iter()
            .filter_map(|e| e.get("text_run")?.get("content")?.as_str())
            .collect()
    }
}

/// Layout properties of a table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableProperty {
    /// Number of rows.
    #[serde(default)]
    pub row_size: u32,
    /// Number of columns.
    #[serde(default)]
    pub column_size: u32,
    /// Column widths in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_width: Option<Vec<u32>>,
    /// Server-assigned merge layout. Read-only: never sent back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_info: Option<Vec<Value>>,
    /// Other fields, passed through.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of a table block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableContent {
    /// Cell block IDs in row-major order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cells: Vec<BlockId>,
    /// Table layout.
    #[serde(default)]
    pub property: TableProperty,
    /// Other fields, passed through.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TableContent {
    /// Creates an empty table of the given dimensions.
    pub fn new(row_size: u32, column_size: u32) -> Self {
        Self {
            cells: Vec::new(),
            property: TableProperty {
                row_size,
                column_size,
                ..TableProperty::default()
            },
            extra: Map::new(),
        }
    }
}

/// Type-specific content of a block.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockPayload {
    /// A text-bearing block.
    Text {
        /// Which text kind.
        kind: TextKind,
        /// Inline content.
        content: TextContent,
    },
    /// Horizontal rule.
    Divider,
    /// Table.
    Table(TableContent),
    /// Table cell; a container for other blocks.
    TableCell(Map<String, Value>),
    /// Any block type the model does not know; passed through untouched.
    Opaque {
        /// Numeric block type.
        block_type: u32,
        /// Every field besides id, parent and children.
        fields: Map<String, Value>,
    },
}

impl BlockPayload {
    /// Returns the numeric block type.
    pub fn block_type(&self) -> u32 {
        match self {
            BlockPayload::Text { kind, .. } => kind.to_code(),
            BlockPayload::Divider => crate::wire::block_type::DIVIDER,
            BlockPayload::Table(_) => crate::wire::block_type::TABLE,
            BlockPayload::TableCell(_) => crate::wire::block_type::TABLE_CELL,
            BlockPayload::Opaque { block_type, .. } => *block_type,
        }
    }

    /// Returns true for tables and table cells.
    pub fn is_table_family(&self) -> bool {
        matches!(self, BlockPayload::Table(_) | BlockPayload::TableCell(_))
    }
}

/// A single structural unit of document content.
///
/// Blocks arrive flat; hierarchy is expressed through `parent_id`
/// (and mirrored in `children`, which is passed through as-is).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "crate::wire::WireBlock", into = "crate::wire::WireBlock")]
pub struct Block {
    /// Block ID.
    pub id: BlockId,
    /// Parent block ID; `None` means top-level within the write.
    pub parent_id: Option<BlockId>,
    /// Child block IDs, in order.
    pub children: Vec<BlockId>,
    /// Type-specific content.
    pub payload: BlockPayload,
    /// Unrecognized sibling fields, passed through.
    pub extra: Map<String, Value>,
}

impl Block {
    /// Creates a block with no parent and no children.
    pub fn new(id: impl Into<BlockId>, payload: BlockPayload) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            children: Vec::new(),
            payload,
            extra: Map::new(),
        }
    }

    /// Creates a plain text block.
    pub fn text(id: impl Into<BlockId>, content: impl Into<String>) -> Self {
        Self::new(
            id,
            BlockPayload::Text {
                kind: TextKind::Text,
                content: TextContent::plain(content),
            },
        )
    }

    /// Sets the parent.
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<BlockId>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    /// Sets the children.
    #[must_use]
    pub fn with_children<I, T>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<BlockId>,
    {
        self.children = children.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the numeric block type.
    pub fn block_type(&self) -> u32 {
        self.payload.block_type()
    }

    /// Returns true for tables and table cells.
    pub fn is_table_family(&self) -> bool {
        self.payload.is_table_family()
    }

    /// Returns true if the block has no parent or its parent is `container`.
    pub fn is_top_level_in(&self, container: &BlockId) -> bool {
        self.parent_id
            .as_ref()
            .map_or(true, |p| p.is_empty() || p == container)
    }

    /// Returns true if any read-only table metadata is present.
    pub fn has_read_only_metadata(&self) -> bool {
        if !self.is_table_family() {
            return false;
        }
        if contains_key_deep(&self.extra, READ_ONLY_TABLE_KEY) {
            return true;
        }
        match &self.payload {
            BlockPayload::Table(table) => {
                table.property.merge_info.is_some()
                    || contains_key_deep(&table.property.extra, READ_ONLY_TABLE_KEY)
                    || contains_key_deep(&table.extra, READ_ONLY_TABLE_KEY)
            }
            BlockPayload::TableCell(fields) => contains_key_deep(fields, READ_ONLY_TABLE_KEY),
            _ => false,
        }
    }

    /// Removes read-only table metadata from the block and every nested
    /// table substructure. Returns true if anything was removed.
    ///
    /// Non-table blocks are left untouched.
    pub fn strip_read_only(&mut self) -> bool {
        if !self.is_table_family() {
            return false;
        }
        let mut changed = strip_key_deep(&mut self.extra, READ_ONLY_TABLE_KEY);
        match &mut self.payload {
            BlockPayload::Table(table) => {
                changed |= table.property.merge_info.take().is_some();
                changed |= strip_key_deep(&mut table.property.extra, READ_ONLY_TABLE_KEY);
                changed |= strip_key_deep(&mut table.extra, READ_ONLY_TABLE_KEY);
            }
            BlockPayload::TableCell(fields) => {
                changed |= strip_key_deep(fields, READ_ONLY_TABLE_KEY);
            }
            _ => {}
        }
        changed
    }
}

fn contains_key_deep(map: &Map<String, Value>, key: &str) -> bool {
    map.contains_key(key) || map.values().any(|v| value_contains_key(v, key))
}

fn value_contains_key(value: &Value, key: &str) -> bool {
    match value {
        Value::Object(map) => contains_key_deep(map, key),
        Value::Array(items) => items.iter().any(|v| value_contains_key(v, key)),
        _ => false,
    }
}

fn strip_key_deep(map: &mut Map<String, Value>, key: &str) -> bool {
    let mut changed = map.remove(key).is_some();
    for value in map.values_mut() {
        changed |= strip_value(value, key);
    }
    changed
}

fn strip_value(value: &mut Value, key: &str) -> bool {
    match value {
        Value::Object(map) => strip_key_deep(map, key),
        Value::Array(items) => items
            .iter_mut()
            .fold(false, |changed, v| strip_value(v, key) | changed),
        _ => false,
    }
}
