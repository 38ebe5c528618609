//! Nearest-chunk lookup over the indexed store.

use std::collections::HashMap;
use std::sync::Arc;

use crumb_llm::LlmError;
use crumb_llm::provider::EmbedFn;
use crumb_memory::vector_store::payload_keys;
use crumb_memory::{ScoredVectorPoint, VectorStore, VectorStoreError};

use crate::config::RetrievalConfig;

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("failed to embed query: {0}")]
    Embedding(#[from] LlmError),

    #[error("vector store error: {0}")]
    Store(#[from] VectorStoreError),
}

/// A stored chunk matched by a query.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub content: String,
    pub source: String,
    pub chunk_index: usize,
    /// Character offset of the chunk in its source.
    pub start_offset: usize,
    /// Cosine similarity to the query.
    pub score: f32,
}

impl RetrievedChunk {
    fn from_point(point: ScoredVectorPoint) -> Self {
        let ScoredVectorPoint { score, payload, .. } = point;
        Self {
            content: text_field(&payload, payload_keys::CONTENT),
            source: text_field(&payload, payload_keys::SOURCE),
            chunk_index: number_field(&payload, payload_keys::CHUNK_INDEX),
            start_offset: number_field(&payload, payload_keys::START_OFFSET),
            score,
        }
    }
}

fn text_field(payload: &HashMap<String, serde_json::Value>, key: &str) -> String {
    payload
        .get(key)
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

fn number_field(payload: &HashMap<String, serde_json::Value>, key: &str) -> usize {
    payload
        .get(key)
        .and_then(serde_json::Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or_default()
}

/// Outcome of [`Retriever::retrieve`]. Failures are carried as text so callers
/// can show them without handling an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieved {
    /// Matching chunks, closest first. May be empty.
    Context(Vec<RetrievedChunk>),
    Failed(String),
}

impl Retrieved {
    /// Chunk contents joined by newlines, or the failure message.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Context(chunks) => chunks
                .iter()
                .map(|c| c.content.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Failed(msg) => msg.clone(),
        }
    }

    /// `true` when no chunk matched. A failure is not empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Context(chunks) if chunks.is_empty())
    }
}

pub struct Retriever {
    store: Arc<dyn VectorStore>,
    collection: String,
    embed_fn: EmbedFn,
    config: RetrievalConfig,
}

impl Retriever {
    #[must_use]
    pub fn new(
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        embed_fn: EmbedFn,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            embed_fn,
            config,
        }
    }

    /// Up to `k` chunks closest to `query`, best first, dropping those scoring
    /// below the configured threshold. An empty or missing index yields no chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be embedded or the store fails.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        if k == 0 || self.store.count(&self.collection).await? == 0 {
            return Ok(Vec::new());
        }

        let vector = (self.embed_fn)(query).await?;
        let hits = self
            .store
            .search(&self.collection, vector, k as u64, None)
            .await?;

        let threshold = self.config.score_threshold;
        let chunks: Vec<RetrievedChunk> = hits
            .into_iter()
            .filter(|hit| hit.score >= threshold)
            .map(RetrievedChunk::from_point)
            .collect();
        tracing::debug!(k, matched = chunks.len(), "retrieval finished");
        Ok(chunks)
    }

    /// Like [`Retriever::search`], but logs failures and returns them as text.
    pub async fn retrieve(&self, query: &str, k: usize) -> Retrieved {
        match self.search(query, k).await {
            Ok(chunks) => Retrieved::Context(chunks),
            Err(e) => {
                tracing::error!("retrieval failed: {e:#}");
                Retrieved::Failed(format!("Error during retrieval: {e}"))
            }
        }
    }

    /// [`Retriever::retrieve`] with the configured `top_k`.
    pub async fn retrieve_default(&self, query: &str) -> Retrieved {
        self.retrieve(query, self.config.top_k).await
    }

    /// Number of chunks currently indexed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn total_chunks(&self) -> Result<u64, RetrievalError> {
        Ok(self.store.count(&self.collection).await?)
    }

    /// Release the underlying store.
    pub async fn close(&self) {
        self.store.close().await;
    }
}
