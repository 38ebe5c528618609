use std::future::Future;
use std::pin::Pin;

use crate::error::LlmError;

/// Boxed future returned by type-erased embedding closures.
pub type EmbedFuture = Pin<Box<dyn Future<Output = Result<Vec<f32>, LlmError>> + Send>>;

/// Boxed embedding closure shared by the indexer and the retriever.
pub type EmbedFn = Box<dyn Fn(&str) -> EmbedFuture + Send + Sync>;

pub trait LlmProvider: Send + Sync {
    /// Generate a completion for `prompt`, producing at most `max_tokens` tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to produce an output.
    fn generate(
        &self,
        prompt: &str,
        max_tokens: usize,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Compute an embedding vector for `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend has no embedding model or the call fails.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    fn name(&self) -> &str;
}
