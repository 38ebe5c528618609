#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("source file not found: {}", .0.display())]
    SourceNotFound(std::path::PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("file too large: {0} bytes")]
    FileTooLarge(u64),

    #[error("embedding failed: {0}")]
    Embedding(#[from] crumb_llm::LlmError),

    #[error("storage error: {0}")]
    Storage(#[from] crate::error::MemoryError),
}

impl From<crate::vector_store::VectorStoreError> for DocumentError {
    fn from(e: crate::vector_store::VectorStoreError) -> Self {
        Self::Storage(crate::error::MemoryError::VectorStore(e))
    }
}
