use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    /// Canonical path of the file the document was read from.
    pub source: String,
    pub content_type: String,
    pub extra: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// Contiguous slice of a [`Document`].
#[derive(Debug, Clone)]
pub struct Chunk {
    pub content: String,
    pub metadata: DocumentMetadata,
    pub chunk_index: usize,
    /// Offset of the first character of `content` in the document, counted in chars.
    pub start_offset: usize,
}
