//! Turns a text file into stored, embedded chunks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crumb_llm::provider::EmbedFn;
use crumb_memory::VectorStore;
use crumb_memory::document::pipeline::IngestStats;
use crumb_memory::document::{
    DocumentError, IngestionPipeline, SplitterConfig, TextLoader, TextSplitter,
};

use crate::config::IndexConfig;

/// Result of a single indexing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    Indexed(IngestStats),
    /// The source file does not exist. Nothing was written.
    SourceMissing(PathBuf),
}

pub struct Indexer {
    pipeline: IngestionPipeline,
    loader: TextLoader,
}

impl Indexer {
    #[must_use]
    pub fn new(
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        embed_fn: EmbedFn,
        config: &IndexConfig,
    ) -> Self {
        let splitter = TextSplitter::new(SplitterConfig {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            strategy: config.strategy,
        });
        Self {
            pipeline: IngestionPipeline::new(splitter, store, collection, embed_fn),
            loader: TextLoader::with_max_file_size(config.max_file_size),
        }
    }

    /// Chunk, embed and store `source`, replacing anything indexed earlier from it.
    ///
    /// A missing file is not an error: it is logged and reported as
    /// [`IndexOutcome::SourceMissing`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, or if embedding or storage fails.
    pub async fn index(&self, source: &Path) -> Result<IndexOutcome, DocumentError> {
        match self.pipeline.load_and_ingest(&self.loader, source).await {
            Ok(stats) => {
                tracing::info!(
                    source = %source.display(),
                    chunks = stats.chunks,
                    "indexing complete"
                );
                Ok(IndexOutcome::Indexed(stats))
            }
            Err(DocumentError::SourceNotFound(path)) => {
                tracing::warn!(path = %path.display(), "source file not found, nothing indexed");
                Ok(IndexOutcome::SourceMissing(path))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crumb_llm::LlmProvider;
    use crumb_llm::mock::MockProvider;
    use crumb_llm::provider::EmbedFuture;
    use crumb_memory::InMemoryVectorStore;

    const COLLECTION: &str = "test_chunks";

    fn mock_embed(mock: MockProvider) -> EmbedFn {
        let mock = Arc::new(mock);
        Box::new(move |text: &str| -> EmbedFuture {
            let mock = Arc::clone(&mock);
            let text = text.to_owned();
            Box::pin(async move { mock.embed(&text).await })
        })
    }

    fn small_config() -> IndexConfig {
        IndexConfig {
            chunk_size: 40,
            chunk_overlap: 0,
            ..IndexConfig::default()
        }
    }

    #[tokio::test]
    async fn missing_source_is_reported_not_raised() {
        let store = Arc::new(InMemoryVectorStore::new());
        let indexer = Indexer::new(
            store.clone(),
            COLLECTION,
            mock_embed(MockProvider::bag_of_words(64)),
            &small_config(),
        );
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.txt");

        let outcome = indexer.index(&missing).await.unwrap();
        assert_eq!(outcome, IndexOutcome::SourceMissing(missing));
        assert_eq!(store.count(COLLECTION).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn indexes_file_into_store() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("source.txt");
        std::fs::write(
            &file,
            "Bakery X is open at 8am.\n\nThe river bridge was rebuilt in 1902.",
        )
        .unwrap();

        let store = Arc::new(InMemoryVectorStore::new());
        let indexer = Indexer::new(
            store.clone(),
            COLLECTION,
            mock_embed(MockProvider::bag_of_words(64)),
            &small_config(),
        );

        let IndexOutcome::Indexed(stats) = indexer.index(&file).await.unwrap() else {
            panic!("expected an indexed outcome");
        };
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.chunks, 2);
        assert_eq!(store.count(COLLECTION).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn reindex_does_not_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("source.txt");
        std::fs::write(&file, "alpha beta gamma delta epsilon zeta eta theta").unwrap();

        let store = Arc::new(InMemoryVectorStore::new());
        let indexer = Indexer::new(
            store.clone(),
            COLLECTION,
            mock_embed(MockProvider::bag_of_words(64)),
            &small_config(),
        );
        indexer.index(&file).await.unwrap();
        let first = store.count(COLLECTION).await.unwrap();
        indexer.index(&file).await.unwrap();
        assert_eq!(store.count(COLLECTION).await.unwrap(), first);
    }

    #[tokio::test]
    async fn embedding_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("source.txt");
        std::fs::write(&file, "some text").unwrap();

        let failing = MockProvider::default().with_failing_embed();
        let indexer = Indexer::new(
            Arc::new(InMemoryVectorStore::new()),
            COLLECTION,
            mock_embed(failing),
            &small_config(),
        );
        assert!(matches!(
            indexer.index(&file).await,
            Err(DocumentError::Embedding(_))
        ));
    }

    #[tokio::test]
    async fn directory_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = Indexer::new(
            Arc::new(InMemoryVectorStore::new()),
            COLLECTION,
            mock_embed(MockProvider::default()),
            &small_config(),
        );
        assert!(matches!(
            indexer.index(dir.path()).await,
            Err(DocumentError::UnsupportedFormat(_))
        ));
    }
}
