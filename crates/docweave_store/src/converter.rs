//! Markdown to block conversion.
//!
//! Walks pulldown-cmark events and emits a flat, pre-ordered block list in
//! the shape the remote converter produces: containers (list items, quotes,
//! tables, cells) come before their descendants, and only top-level blocks
//! lack a parent.

use crate::error::ConvertError;
use docweave_model::{
    Block, BlockId, BlockPayload, ConvertedDocument, TableContent, TextContent, TextKind,
};
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Converts markdown into blocks.
///
/// Block IDs are temporary but never repeat across conversions of one
/// converter or its clones.
#[derive(Debug, Clone, Default)]
pub struct MarkdownConverter {
    block_limit: Option<usize>,
    next_id: Arc<AtomicU64>,
}

impl MarkdownConverter {
    /// Creates a converter with no size limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails conversions producing more than `limit` blocks.
    pub fn with_block_limit(mut self, limit: usize) -> Self {
        self.block_limit = Some(limit);
        self
    }

    /// Converts `markdown`. Empty input yields an empty document.
    pub fn convert(&self, markdown: &str) -> Result<ConvertedDocument, ConvertError> {
        let options =
            Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES | Options::ENABLE_TASKLISTS;
        let mut builder = Builder::new(&self.next_id);
        for event in Parser::new_ext(markdown, options) {
            builder.handle(event);
        }
        let converted = builder.finish();

        match self.block_limit {
            Some(limit) if converted.len() > limit => Err(ConvertError::TooManyBlocks {
                count: converted.len(),
                limit,
            }),
            _ => Ok(converted),
        }
    }
}

#[derive(Debug, Default, Clone)]
struct InlineStyle {
    bold: bool,
    italic: bool,
    strikethrough: bool,
    link: Option<String>,
}

impl InlineStyle {
    fn to_json(&self, inline_code: bool) -> Option<Value> {
        let mut style = Map::new();
        if self.bold {
            style.insert("bold".into(), Value::Bool(true));
        }
        if self.italic {
            style.insert("italic".into(), Value::Bool(true));
        }
        if self.strikethrough {
            style.insert("strikethrough".into(), Value::Bool(true));
        }
        if inline_code {
            style.insert("inline_code".into(), Value::Bool(true));
        }
        if let Some(url) = &self.link {
            style.insert("link".into(), json!({ "url": url }));
        }
        (!style.is_empty()).then_some(Value::Object(style))
    }
}

#[derive(Debug)]
struct TableBuild {
    block: usize,
    rows: u32,
    cells: Vec<BlockId>,
}

#[derive(Debug)]
struct Builder<'a> {
    ids: &'a AtomicU64,
    blocks: Vec<Block>,
    top_level: Vec<BlockId>,
    /// Open container blocks, innermost last.
    frames: Vec<usize>,
    /// Kinds of the open lists, innermost last.
    lists: Vec<TextKind>,
    /// Block receiving inline text.
    inline_target: Option<usize>,
    style: InlineStyle,
    table: Option<TableBuild>,
}

impl<'a> Builder<'a> {
    fn new(ids: &'a AtomicU64) -> Self {
        Self {
            ids,
            blocks: Vec::new(),
            top_level: Vec::new(),
            frames: Vec::new(),
            lists: Vec::new(),
            inline_target: None,
            style: InlineStyle::default(),
            table: None,
        }
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::Paragraph) => {
                let target = match self.frames.last().copied() {
                    Some(frame) if self.is_empty_text(frame) => frame,
                    _ => self.open(text_payload(TextKind::Text)),
                };
                self.inline_target = Some(target);
            }
            Event::Start(Tag::Heading { level, .. }) => {
                let kind = TextKind::Heading(heading_level(level));
                self.inline_target = Some(self.open(text_payload(kind)));
            }
            Event::Start(Tag::CodeBlock(_)) => {
                self.inline_target = Some(self.open(text_payload(TextKind::Code)));
            }
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::CodeBlock) => {
                self.inline_target = None;
            }
            Event::Start(Tag::BlockQuote(_)) => {
                self.inline_target = None;
                let quote = self.open(text_payload(TextKind::Quote));
                self.frames.push(quote);
            }
            Event::End(TagEnd::BlockQuote(_)) | Event::End(TagEnd::Item) => {
                self.inline_target = None;
                self.frames.pop();
            }
            Event::Start(Tag::List(start)) => {
                self.inline_target = None;
                self.lists.push(if start.is_some() {
                    TextKind::Ordered
                } else {
                    TextKind::Bullet
                });
            }
            Event::End(TagEnd::List(_)) => {
                self.inline_target = None;
                self.lists.pop();
            }
            Event::Start(Tag::Item) => {
                self.inline_target = None;
                let kind = self.lists.last().copied().unwrap_or(TextKind::Bullet);
                let item = self.open(text_payload(kind));
                self.frames.push(item);
            }
            Event::TaskListMarker(done) => self.mark_todo(done),
            Event::Rule => {
                self.inline_target = None;
                self.open(BlockPayload::Divider);
            }
            Event::Start(Tag::Table(alignments)) => {
                self.inline_target = None;
                let columns = u32::try_from(alignments.len()).unwrap_or(u32::MAX);
                let block = self.open(BlockPayload::Table(TableContent::new(0, columns)));
                self.frames.push(block);
                self.table = Some(TableBuild {
                    block,
                    rows: 0,
                    cells: Vec::new(),
                });
            }
            Event::Start(Tag::TableHead | Tag::TableRow) => {
                if let Some(table) = self.table.as_mut() {
                    table.rows += 1;
                }
            }
            Event::Start(Tag::TableCell) => {
                let cell = self.open(BlockPayload::TableCell(Map::new()));
                if let Some(table) = self.table.as_mut() {
                    table.cells.push(self.blocks[cell].id.clone());
                }
                self.frames.push(cell);
                self.inline_target = Some(self.open(text_payload(TextKind::Text)));
            }
            Event::End(TagEnd::TableCell) => {
                self.inline_target = None;
                self.frames.pop();
            }
            Event::End(TagEnd::Table) => {
                self.frames.pop();
                self.close_table();
            }
            Event::Start(Tag::Strong) => self.style.bold = true,
            Event::End(TagEnd::Strong) => self.style.bold = false,
            Event::Start(Tag::Emphasis) => self.style.italic = true,
            Event::End(TagEnd::Emphasis) => self.style.italic = false,
            Event::Start(Tag::Strikethrough) => self.style.strikethrough = true,
            Event::End(TagEnd::Strikethrough) => self.style.strikethrough = false,
            Event::Start(Tag::Link { dest_url, .. }) => {
                self.style.link = Some(dest_url.to_string());
            }
            Event::End(TagEnd::Link) => self.style.link = None,
            Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => {
                self.push_run(&text, false);
            }
            Event::Code(code) => self.push_run(&code, true),
            Event::SoftBreak => self.push_run(" ", false),
            Event::HardBreak => self.push_run("\n", false),
            _ => {}
        }
    }

    fn finish(self) -> ConvertedDocument {
        ConvertedDocument::new(self.blocks, self.top_level)
    }

    /// Appends a block under the innermost open container.
    fn open(&mut self, payload: BlockPayload) -> usize {
        let id = BlockId::new(format!("blk_{}", self.ids.fetch_add(1, Ordering::Relaxed) + 1));
        let mut block = Block::new(id.clone(), payload);
        match self.frames.last() {
            Some(&parent) => {
                block.parent_id = Some(self.blocks[parent].id.clone());
                self.blocks[parent].children.push(id);
            }
            None => self.top_level.push(id),
        }
        self.blocks.push(block);
        self.blocks.len() - 1
    }

    fn is_empty_text(&self, index: usize) -> bool {
        matches!(
            &self.blocks[index].payload,
            BlockPayload::Text { content, .. } if content.elements.is_empty()
        )
    }

    fn push_run(&mut self, text: &str, inline_code: bool) {
        let target = match self.inline_target {
            Some(target) => target,
            None => {
                // Tight list items carry text without a paragraph.
                let target = match self.frames.last().copied() {
                    Some(frame) if self.is_empty_text(frame) => frame,
                    _ => self.open(text_payload(TextKind::Text)),
                };
                self.inline_target = Some(target);
                target
            }
        };

        let mut run = json!({ "content": text });
        if let Some(style) = self.style.to_json(inline_code) {
            run["text_element_style"] = style;
        }
        if let BlockPayload::Text { content, .. } = &mut self.blocks[target].payload {
            content.elements.push(json!({ "text_run": run }));
        }
    }

    fn mark_todo(&mut self, done: bool) {
        let Some(&item) = self.frames.last() else {
            return;
        };
        if let BlockPayload::Text { kind, content } = &mut self.blocks[item].payload {
            *kind = TextKind::Todo;
            content.extra.insert("style".into(), json!({ "done": done }));
        }
    }

    fn close_table(&mut self) {
        let Some(table) = self.table.take() else {
            return;
        };
        if let BlockPayload::Table(content) = &mut self.blocks[table.block].payload {
            content.property.row_size = table.rows;
            content.cells = table.cells;
        }
    }
}

fn text_payload(kind: TextKind) -> BlockPayload {
    BlockPayload::Text {
        kind,
        content: TextContent::default(),
    }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}
