//! In-memory document store.

use crate::config::StoreConfig;
use crate::converter::MarkdownConverter;
use crate::document::Document;
use crate::error::WriteRejection;
use async_trait::async_trait;
use docweave_engine::{DocumentStore, StoreError};
use docweave_model::{Block, BlockId, ConvertedDocument};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

struct DocumentState {
    document: Document,
    /// Writes still to be answered "not found".
    lag: u32,
}

/// A [`DocumentStore`] holding documents in memory.
///
/// Enforces the same write rules as the remote store, so the engine can be
/// exercised end to end without a network. Safe to share between tasks.
pub struct MemoryDocumentStore {
    config: StoreConfig,
    converter: MarkdownConverter,
    documents: RwLock<HashMap<String, DocumentState>>,
    faults: Mutex<VecDeque<u16>>,
    write_calls: AtomicUsize,
    convert_calls: AtomicUsize,
}

impl MemoryDocumentStore {
    /// Creates an empty store with default limits.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates an empty store.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            converter: MarkdownConverter::new(),
            documents: RwLock::new(HashMap::new()),
            faults: Mutex::new(VecDeque::new()),
            write_calls: AtomicUsize::new(0),
            convert_calls: AtomicUsize::new(0),
        }
    }

    /// Replaces the markdown converter.
    pub fn with_converter(mut self, converter: MarkdownConverter) -> Self {
        self.converter = converter;
        self
    }

    /// Creates an empty document using the configured visibility lag.
    pub fn create_document(&self, id: &str) {
        self.create_document_with_lag(id, self.config.visibility_lag);
    }

    /// Creates an empty document that answers the next `lag` writes with
    /// "not found".
    pub fn create_document_with_lag(&self, id: &str, lag: u32) {
        info!(document_id = id, lag, "document created");
        self.documents.write().insert(
            id.to_string(),
            DocumentState {
                document: Document::new(id),
                lag,
            },
        );
    }

    /// Answers the next `count` writes with `status`.
    pub fn fail_next_writes(&self, count: usize, status: u16) {
        self.faults.lock().extend(std::iter::repeat(status).take(count));
    }

    /// Returns a snapshot of a document.
    pub fn document(&self, id: &str) -> Option<Document> {
        self.documents.read().get(id).map(|s| s.document.clone())
    }

    /// Write calls received, rejected ones included.
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Convert calls received.
    pub fn convert_calls(&self) -> usize {
        self.convert_calls.load(Ordering::SeqCst)
    }

    fn check(
        &self,
        document: &Document,
        container: &BlockId,
        top_level_ids: &[BlockId],
        blocks: &[Block],
    ) -> Result<(), WriteRejection> {
        if !document.contains(container) {
            return Err(WriteRejection::UnknownContainer(container.clone()));
        }
        if blocks.len() > self.config.max_descendants {
            return Err(WriteRejection::TooManyDescendants {
                count: blocks.len(),
                limit: self.config.max_descendants,
            });
        }
        if top_level_ids.is_empty() {
            return Err(WriteRejection::NoChildren);
        }

        let mut incoming = HashSet::with_capacity(blocks.len());
        for block in blocks {
            if block.id.is_empty() {
                return Err(WriteRejection::MissingId);
            }
            if !incoming.insert(&block.id) {
                return Err(WriteRejection::DuplicateId(block.id.clone()));
            }
            if self.config.reject_read_only && block.has_read_only_metadata() {
                return Err(WriteRejection::ReadOnlyField(block.id.clone()));
            }
        }
        if let Some(missing) = top_level_ids.iter().find(|id| !incoming.contains(id)) {
            return Err(WriteRejection::ChildNotInDescendants(missing.clone()));
        }
        for block in blocks {
            let Some(parent) = &block.parent_id else {
                continue;
            };
            if parent != container && !incoming.contains(parent) && document.resolve(parent).is_none()
            {
                return Err(WriteRejection::UnknownParent {
                    block: block.id.clone(),
                    parent: parent.clone(),
                });
            }
        }
        Ok(())
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn convert(&self, markdown: &str) -> Result<ConvertedDocument, StoreError> {
        self.convert_calls.fetch_add(1, Ordering::SeqCst);
        let converted = self.converter.convert(markdown)?;
        debug!(blocks = converted.len(), "markdown converted");
        Ok(converted)
    }

    async fn write_batch(
        &self,
        document_id: &str,
        container_id: &BlockId,
        top_level_ids: &[BlockId],
        blocks: &[Block],
    ) -> Result<(), StoreError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(status) = self.faults.lock().pop_front() {
            debug!(document_id, status, "injected write fault");
            return Err(StoreError::from_response(status, None, "injected fault"));
        }

        let mut documents = self.documents.write();
        let state = documents
            .get_mut(document_id)
            .ok_or_else(|| StoreError::not_yet_visible(format!("document {document_id} not found")))?;
        if state.lag > 0 {
            state.lag -= 1;
            return Err(StoreError::not_yet_visible(format!(
                "document {document_id} not found"
            )));
        }

        self.check(&state.document, container_id, top_level_ids, blocks)?;
        state.document.apply(container_id, top_level_ids, blocks);
        debug!(
            document_id,
            blocks = blocks.len(),
            top_level = top_level_ids.len(),
            "descendants written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CODE_INVALID_PARAM;
    use docweave_engine::StoreErrorKind;
    use docweave_testkit::table_document;

    fn root() -> BlockId {
        BlockId::new("doc")
    }

    fn para(id: &str) -> Block {
        Block::text(id, id).with_parent("doc")
    }

    #[tokio::test]
    async fn write_appends_top_level() {
        let store = MemoryDocumentStore::new();
        store.create_document("doc");

        store
            .write_batch("doc", &root(), &[BlockId::new("a")], &[para("a")])
            .await
            .unwrap();
        store
            .write_batch("doc", &root(), &[BlockId::new("b")], &[para("b")])
            .await
            .unwrap();

        let doc = store.document("doc").unwrap();
        assert_eq!(doc.top_level(), &[BlockId::new("a"), BlockId::new("b")]);
        assert_eq!(store.write_calls(), 2);
    }

    #[tokio::test]
    async fn unknown_document_is_not_yet_visible() {
        let store = MemoryDocumentStore::new();
        let err = store
            .write_batch("nope", &root(), &[BlockId::new("a")], &[para("a")])
            .await
            .unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::NotYetVisible);
    }

    #[tokio::test]
    async fn visibility_lag_then_success() {
        let store = MemoryDocumentStore::with_config(StoreConfig::new().with_visibility_lag(2));
        store.create_document("doc");
        let top = [BlockId::new("a")];
        let blocks = [para("a")];

        for _ in 0..2 {
            let err = store.write_batch("doc", &root(), &top, &blocks).await.unwrap_err();
            assert_eq!(err.status, Some(404));
        }
        store.write_batch("doc", &root(), &top, &blocks).await.unwrap();
        assert_eq!(store.document("doc").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejects_structural_violations() {
        let store = MemoryDocumentStore::with_config(StoreConfig::new().with_max_descendants(2));
        store.create_document("doc");

        let cases: Vec<(Vec<BlockId>, Vec<Block>)> = vec![
            (vec![], vec![para("a")]),
            (vec![BlockId::new("x")], vec![para("a")]),
            (
                vec![BlockId::new("a")],
                vec![para("a"), Block::text("b", "b").with_parent("ghost")],
            ),
            (
                vec![BlockId::new("a")],
                vec![para("a"), para("b"), para("c")],
            ),
            (vec![BlockId::new("a")], vec![para("a"), para("a")]),
        ];
        for (top, blocks) in cases {
            let err = store.write_batch("doc", &root(), &top, &blocks).await.unwrap_err();
            assert_eq!(err.status, Some(400));
            assert_eq!(err.code, Some(CODE_INVALID_PARAM));
        }
        assert!(store.document("doc").unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_read_only_table_metadata() {
        let store = MemoryDocumentStore::new();
        store.create_document("doc");
        let converted = table_document();
        let blocks: Vec<Block> = converted
            .blocks
            .into_iter()
            .map(|b| if b.parent_id.is_none() { b.with_parent("doc") } else { b })
            .collect();

        let err = store
            .write_batch("doc", &root(), &converted.top_level_order, &blocks)
            .await
            .unwrap_err();
        assert!(err.message.contains("merge_info"));

        let stripped: Vec<Block> = blocks
            .into_iter()
            .map(|mut b| {
                b.strip_read_only();
                b
            })
            .collect();
        store
            .write_batch("doc", &root(), &converted.top_level_order, &stripped)
            .await
            .unwrap();
        assert_eq!(store.document("doc").unwrap().len(), 10);
    }

    #[tokio::test]
    async fn parent_from_earlier_write_is_accepted() {
        let store = MemoryDocumentStore::new();
        store.create_document("doc");
        store
            .write_batch("doc", &root(), &[BlockId::new("a")], &[para("a")])
            .await
            .unwrap();
        store
            .write_batch(
                "doc",
                &root(),
                &[BlockId::new("b")],
                &[para("b"), Block::text("a.1", "late child").with_parent("a")],
            )
            .await
            .unwrap();

        let doc = store.document("doc").unwrap();
        assert_eq!(doc.children_of(&BlockId::new("a")), vec![BlockId::new("a.1")]);
    }

    #[tokio::test]
    async fn reused_temporary_id_is_stored_separately() {
        let store = MemoryDocumentStore::new();
        store.create_document("doc");
        let top = [BlockId::new("plain_text_1")];

        for text in ["first", "second"] {
            store
                .write_batch("doc", &root(), &top, &[Block::text("plain_text_1", text).with_parent("doc")])
                .await
                .unwrap();
        }

        let doc = store.document("doc").unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.top_level().len(), 2);
        assert_eq!(doc.plain_text(), "first\nsecond");
    }

    #[tokio::test]
    async fn repeated_within_one_write_is_rejected() {
        let store = MemoryDocumentStore::new();
        store.create_document("doc");
        let err = store
            .write_batch("doc", &root(), &[BlockId::new("a")], &[para("a"), para("a")])
            .await
            .unwrap_err();
        assert!(err.message.contains("repeated"));
    }

    #[tokio::test]
    async fn converted_twice_into_one_document() {
        let store = MemoryDocumentStore::new();
        store.create_document("doc");

        for markdown in ["# One\n\nbody", "# Two\n\nbody"] {
            let converted = store.convert(markdown).await.unwrap();
            let blocks: Vec<Block> = converted
                .blocks
                .into_iter()
                .map(|b| b.with_parent("doc"))
                .collect();
            store
                .write_batch("doc", &root(), &converted.top_level_order, &blocks)
                .await
                .unwrap();
        }

        let doc = store.document("doc").unwrap();
        assert_eq!(doc.top_level().len(), 4);
        assert_eq!(doc.plain_text(), "One\nbody\nTwo\nbody");
    }

    #[tokio::test]
    async fn injected_faults_come_first() {
        let store = MemoryDocumentStore::new();
        store.create_document("doc");
        store.fail_next_writes(1, 429);

        let top = [BlockId::new("a")];
        let blocks = [para("a")];
        let err = store.write_batch("doc", &root(), &top, &blocks).await.unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::RateLimited);
        store.write_batch("doc", &root(), &top, &blocks).await.unwrap();
    }

    #[tokio::test]
    async fn convert_uses_converter() {
        let store =
            MemoryDocumentStore::new().with_converter(MarkdownConverter::new().with_block_limit(1));
        assert_eq!(store.convert("# one").await.unwrap().len(), 1);
        let err = store.convert("a\n\nb").await.unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::Permanent);
        assert_eq!(store.convert_calls(), 2);
    }
}
