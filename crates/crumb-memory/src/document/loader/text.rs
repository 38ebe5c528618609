use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;

use super::super::{
    BoxFuture, DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader, DocumentMetadata,
};

/// Loads a UTF-8 text or Markdown file as a single document.
pub struct TextLoader {
    pub max_file_size: u64,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl TextLoader {
    #[must_use]
    pub fn with_max_file_size(max_file_size: u64) -> Self {
        Self { max_file_size }
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("md" | "markdown") => "text/markdown",
        _ => "text/plain",
    }
}

impl DocumentLoader for TextLoader {
    fn load(&self, path: &Path) -> BoxFuture<'_, Result<Vec<Document>, DocumentError>> {
        let requested = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            let path = match tokio::fs::canonicalize(&requested).await {
                Ok(p) => p,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(DocumentError::SourceNotFound(requested));
                }
                Err(e) => return Err(e.into()),
            };

            let meta = tokio::fs::metadata(&path).await?;
            if !meta.is_file() {
                return Err(DocumentError::UnsupportedFormat(format!(
                    "{} is not a regular file",
                    path.display()
                )));
            }
            if meta.len() > max_size {
                return Err(DocumentError::FileTooLarge(meta.len()));
            }

            let bytes = tokio::fs::read(&path).await?;
            let content = String::from_utf8(bytes).map_err(|_| {
                DocumentError::UnsupportedFormat(format!("{} is not valid UTF-8", path.display()))
            })?;

            tracing::debug!(path = %path.display(), bytes = content.len(), "loaded document");
            Ok(vec![Document {
                content,
                metadata: DocumentMetadata {
                    source: path.display().to_string(),
                    content_type: content_type_for(&path).to_owned(),
                    extra: HashMap::new(),
                },
            }])
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["txt", "md", "markdown"]
    }
}
