use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crumb_llm::provider::EmbedFn;
use uuid::Uuid;

use super::{Chunk, Document, DocumentError, DocumentLoader, TextSplitter};
use crate::vector_store::{VectorFilter, VectorPoint, VectorStore, payload_keys};

/// Totals reported by [`IngestionPipeline::load_and_ingest`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub documents: usize,
    pub chunks: usize,
}

pub struct IngestionPipeline {
    splitter: TextSplitter,
    store: Arc<dyn VectorStore>,
    collection: String,
    embed_fn: EmbedFn,
}

/// Stable id of a chunk, so re-indexing the same source overwrites its entries.
#[must_use]
pub fn chunk_id(source: &str, chunk_index: usize) -> String {
    Uuid::new_v5(
        &Uuid::NAMESPACE_URL,
        format!("{source}#{chunk_index}").as_bytes(),
    )
    .to_string()
}

fn chunk_payload(chunk: &Chunk) -> HashMap<String, serde_json::Value> {
    HashMap::from([
        (
            payload_keys::SOURCE.to_owned(),
            serde_json::json!(chunk.metadata.source),
        ),
        (
            payload_keys::CONTENT_TYPE.to_owned(),
            serde_json::json!(chunk.metadata.content_type),
        ),
        (
            payload_keys::CHUNK_INDEX.to_owned(),
            serde_json::json!(chunk.chunk_index),
        ),
        (
            payload_keys::START_OFFSET.to_owned(),
            serde_json::json!(chunk.start_offset),
        ),
        (
            payload_keys::CONTENT.to_owned(),
            serde_json::json!(chunk.content),
        ),
    ])
}

impl IngestionPipeline {
    pub fn new(
        splitter: TextSplitter,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        embed_fn: EmbedFn,
    ) -> Self {
        Self {
            splitter,
            store,
            collection: collection.into(),
            embed_fn,
        }
    }

    /// Ingest a document: split, embed, then replace the entries previously
    /// stored for the same source. Returns the chunk count.
    ///
    /// Nothing is written unless every chunk embeds successfully.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or storage fails.
    pub async fn ingest(&self, document: Document) -> Result<usize, DocumentError> {
        let source = document.metadata.source.clone();
        let chunks = self.splitter.split(&document);

        let mut points = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let vector = (self.embed_fn)(&chunk.content).await?;
            points.push(VectorPoint {
                id: chunk_id(&source, chunk.chunk_index),
                vector,
                payload: chunk_payload(chunk),
            });
        }

        let source_filter = VectorFilter::text_eq(payload_keys::SOURCE, source.as_str());
        let Some(first) = points.first() else {
            if self.store.collection_exists(&self.collection).await? {
                self.store
                    .delete_by_filter(&self.collection, source_filter)
                    .await?;
            }
            tracing::info!(%source, "document produced no chunks");
            return Ok(0);
        };

        self.store
            .ensure_collection(&self.collection, first.vector.len() as u64)
            .await?;
        self.store
            .delete_by_filter(&self.collection, source_filter)
            .await?;

        let count = points.len();
        self.store.upsert(&self.collection, points).await?;
        tracing::info!(%source, chunks = count, collection = %self.collection, "document indexed");
        Ok(count)
    }

    /// # Errors
    ///
    /// Returns an error if loading, embedding, or storage fails.
    pub async fn load_and_ingest(
        &self,
        loader: &(dyn DocumentLoader + '_),
        path: &Path,
    ) -> Result<IngestStats, DocumentError> {
        let documents = loader.load(path).await?;
        let mut stats = IngestStats {
            documents: documents.len(),
            chunks: 0,
        };
        for doc in documents {
            stats.chunks += self.ingest(doc).await?;
        }
        Ok(stats)
    }
}
