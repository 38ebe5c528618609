//! Retrieval-augmented answering.

use crumb_llm::{LlmError, LlmProvider};

use crate::retriever::{Retrieved, Retriever};

/// Number of chunks placed in the prompt.
pub const ANSWER_TOP_K: usize = 3;

pub const NOT_FOUND_MESSAGE: &str = "No relevant information found.";

#[derive(Debug, thiserror::Error)]
pub enum AnswerError {
    #[error("generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error("model returned an empty answer")]
    EmptyAnswer,
}

#[must_use]
pub fn build_prompt(context: &str, question: &str) -> String {
    format!("Based on the following information:\n{context}\nAnswer: {question}")
}

pub struct AnswerPipeline<P> {
    retriever: Retriever,
    provider: P,
    max_tokens: usize,
}

impl<P: LlmProvider> AnswerPipeline<P> {
    #[must_use]
    pub fn new(retriever: Retriever, provider: P, max_tokens: usize) -> Self {
        Self {
            retriever,
            provider,
            max_tokens,
        }
    }

    /// Answer `question` from the indexed chunks.
    ///
    /// Returns [`NOT_FOUND_MESSAGE`] without calling the model when nothing
    /// relevant is indexed, and the retrieval error text when retrieval fails.
    ///
    /// # Errors
    ///
    /// Returns an error if generation fails or produces only whitespace.
    pub async fn answer(&self, question: &str) -> Result<String, AnswerError> {
        let context = match self.retriever.retrieve(question, ANSWER_TOP_K).await {
            Retrieved::Failed(msg) => return Ok(msg),
            retrieved if retrieved.is_empty() => {
                tracing::info!("no relevant context for question");
                return Ok(NOT_FOUND_MESSAGE.to_owned());
            }
            retrieved => retrieved.text(),
        };

        let prompt = build_prompt(&context, question);
        tracing::debug!(
            provider = self.provider.name(),
            prompt_len = prompt.len(),
            "generating answer"
        );
        let raw = self.provider.generate(&prompt, self.max_tokens).await?;
        let answer = raw.trim();
        if answer.is_empty() {
            return Err(AnswerError::EmptyAnswer);
        }
        Ok(answer.to_owned())
    }
}
