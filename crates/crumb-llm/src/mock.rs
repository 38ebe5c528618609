//! Test-only mock provider.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::LlmProvider;

/// How the mock turns text into vectors.
#[derive(Debug, Clone)]
pub enum MockEmbedding {
    /// Every text maps to the same vector.
    Fixed(Vec<f32>),
    /// Lowercased words are hashed into `dim` buckets, so texts sharing words are similar.
    BagOfWords { dim: usize },
}

/// A prompt observed by [`MockProvider::generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPrompt {
    pub prompt: String,
    pub max_tokens: usize,
}

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    prompts: Arc<Mutex<Vec<RecordedPrompt>>>,
    pub default_response: String,
    pub embedding: MockEmbedding,
    pub supports_embeddings: bool,
    pub fail_generate: bool,
    pub fail_embed: bool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            embedding: MockEmbedding::Fixed(vec![0.0; 384]),
            supports_embeddings: true,
            fail_generate: false,
            fail_embed: false,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    /// Word-hashing embedder with `dim` buckets; a zero `dim` is clamped to one.
    #[must_use]
    pub fn bag_of_words(dim: usize) -> Self {
        Self {
            embedding: MockEmbedding::BagOfWords { dim: dim.max(1) },
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_generate: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    #[must_use]
    pub fn with_fixed_embedding(mut self, vector: Vec<f32>) -> Self {
        self.embedding = MockEmbedding::Fixed(vector);
        self
    }

    #[must_use]
    pub fn with_failing_embed(mut self) -> Self {
        self.fail_embed = true;
        self
    }

    /// Prompts passed to `generate` so far, oldest first.
    #[must_use]
    pub fn prompts(&self) -> Vec<RecordedPrompt> {
        self.prompts.lock().unwrap().clone()
    }
}

fn bag_of_words(text: &str, dim: usize) -> Vec<f32> {
    let mut v = vec![0.0_f32; dim.max(1)];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        #[allow(clippy::cast_possible_truncation)]
        let bucket = (hasher.finish() % v.len() as u64) as usize;
        v[bucket] += 1.0;
    }
    v
}

impl LlmProvider for MockProvider {
    async fn generate(&self, prompt: &str, max_tokens: usize) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(RecordedPrompt {
            prompt: prompt.to_owned(),
            max_tokens,
        });
        if self.fail_generate {
            return Err(LlmError::Other("mock generation error".into()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if !self.supports_embeddings {
            return Err(LlmError::EmbedUnsupported { provider: "mock" });
        }
        if self.fail_embed {
            return Err(LlmError::Other("mock embedding error".into()));
        }
        Ok(match &self.embedding {
            MockEmbedding::Fixed(v) => v.clone(),
            MockEmbedding::BagOfWords { dim } => bag_of_words(text, *dim),
        })
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}
