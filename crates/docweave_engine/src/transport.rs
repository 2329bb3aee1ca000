//! Document store abstraction.

use crate::error::StoreError;
use async_trait::async_trait;
use docweave_model::{Block, BlockId, ConvertedDocument};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// The remote document store the engine writes into.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, in-memory, scripted for testing). Implementations
/// must be safe to share between concurrent synchronizations.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Converts markdown into a flat block list plus top-level order.
    async fn convert(&self, markdown: &str) -> Result<ConvertedDocument, StoreError>;

    /// Inserts `blocks` as descendants of `container_id` in `document_id`,
    /// with `top_level_ids` appended as the container's direct children.
    async fn write_batch(
        &self,
        document_id: &str,
        container_id: &BlockId,
        top_level_ids: &[BlockId],
        blocks: &[Block],
    ) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    async fn convert(&self, markdown: &str) -> Result<ConvertedDocument, StoreError> {
        (**self).convert(markdown).await
    }

    async fn write_batch(
        &self,
        document_id: &str,
        container_id: &BlockId,
        top_level_ids: &[BlockId],
        blocks: &[Block],
    ) -> Result<(), StoreError> {
        (**self)
            .write_batch(document_id, container_id, top_level_ids, blocks)
            .await
    }
}

/// A write call captured by [`ScriptedStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWrite {
    /// Target document.
    pub document_id: String,
    /// Container the blocks were inserted under.
    pub container_id: BlockId,
    /// Top-level IDs sent.
    pub top_level_ids: Vec<BlockId>,
    /// Blocks sent.
    pub blocks: Vec<Block>,
}

/// A scripted store for testing.
///
/// Conversion returns whatever was set; writes consume queued outcomes and
/// succeed once the queue is empty. Every call is recorded.
#[derive(Debug, Default)]
pub struct ScriptedStore {
    conversion: Mutex<Option<Result<ConvertedDocument, StoreError>>>,
    write_outcomes: Mutex<VecDeque<Result<(), StoreError>>>,
    conversions: Mutex<Vec<String>>,
    writes: Mutex<Vec<RecordedWrite>>,
}

impl ScriptedStore {
    /// Creates a scripted store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the conversion output returned by every `convert` call.
    pub fn set_conversion(&self, converted: ConvertedDocument) {
        *self.conversion.lock() = Some(Ok(converted));
    }

    /// Makes every `convert` call fail.
    pub fn fail_conversion(&self, error: StoreError) {
        *self.conversion.lock() = Some(Err(error));
    }

    /// Queues the outcome of the next unanswered write.
    pub fn push_write_outcome(&self, outcome: Result<(), StoreError>) {
        self.write_outcomes.lock().push_back(outcome);
    }

    /// Queues `count` failures of the next writes.
    pub fn fail_next_writes(&self, count: usize, error: StoreError) {
        let mut outcomes = self.write_outcomes.lock();
        outcomes.extend(std::iter::repeat_with(|| Err(error.clone())).take(count));
    }

    /// Returns every markdown input passed to `convert`.
    pub fn conversions(&self) -> Vec<String> {
        self.conversions.lock().clone()
    }

    /// Returns every write call, successful or not.
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().clone()
    }

    /// Returns the number of write calls.
    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    async fn convert(&self, markdown: &str) -> Result<ConvertedDocument, StoreError> {
        self.conversions.lock().push(markdown.to_string());
        self.conversion
            .lock()
            .clone()
            .unwrap_or_else(|| Err(StoreError::invalid("no scripted conversion set")))
    }

    async fn write_batch(
        &self,
        document_id: &str,
        container_id: &BlockId,
        top_level_ids: &[BlockId],
        blocks: &[Block],
    ) -> Result<(), StoreError> {
        self.writes.lock().push(RecordedWrite {
            document_id: document_id.to_string(),
            container_id: container_id.clone(),
            top_level_ids: top_level_ids.to_vec(),
            blocks: blocks.to_vec(),
        });
        self.write_outcomes.lock().pop_front().unwrap_or(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_conversion_unset() {
        let store = ScriptedStore::new();
        let err = store.convert("# hi").await.unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(store.conversions(), vec!["# hi".to_string()]);
    }

    #[tokio::test]
    async fn scripted_writes_consume_outcomes() {
        let store = ScriptedStore::new();
        store.fail_next_writes(2, StoreError::rate_limited("busy"));

        let container = BlockId::new("doc");
        let blocks = vec![Block::text("a", "x")];
        let top = vec![BlockId::new("a")];

        assert!(store.write_batch("doc", &container, &top, &blocks).await.is_err());
        assert!(store.write_batch("doc", &container, &top, &blocks).await.is_err());
        assert!(store.write_batch("doc", &container, &top, &blocks).await.is_ok());
        assert_eq!(store.write_count(), 3);
        assert_eq!(store.writes()[0].blocks, blocks);
    }

    #[tokio::test]
    async fn arc_store_delegates() {
        let store = Arc::new(ScriptedStore::new());
        store.set_conversion(ConvertedDocument::new(
            vec![Block::text("a", "x")],
            vec![BlockId::new("a")],
        ));
        let shared: Arc<dyn DocumentStore> = store.clone();
        let converted = shared.convert("x").await.unwrap();
        assert_eq!(converted.len(), 1);
        assert_eq!(store.conversions().len(), 1);
    }
}
