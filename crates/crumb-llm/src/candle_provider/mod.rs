pub mod embed;
pub mod generate;
pub mod loader;

use std::sync::Arc;

pub use candle_core::Device;

use self::embed::EmbedModel;
use self::generate::{GenerationOutput, Seq2SeqModel};
use self::loader::ModelSource;
use crate::error::LlmError;
use crate::provider::LlmProvider;

/// Local inference: a BERT encoder for embeddings and, unless built with
/// [`CandleProvider::embedder_only`], a T5 model for answers.
#[derive(Clone)]
pub struct CandleProvider {
    generator: Option<Arc<Seq2SeqModel>>,
    embed_model: Arc<EmbedModel>,
    device: Device,
}

impl std::fmt::Debug for CandleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandleProvider")
            .field("device", &format!("{:?}", self.device))
            .field("generator", &self.generator)
            .field("embed_model", &self.embed_model)
            .finish()
    }
}

impl CandleProvider {
    /// Load both models onto `device`.
    ///
    /// # Errors
    ///
    /// Returns an error if either model fails to load.
    pub fn new(
        generator_source: &ModelSource,
        embedding_source: &ModelSource,
        seed: u64,
        device: Device,
    ) -> Result<Self, LlmError> {
        let generator = Seq2SeqModel::load(generator_source, &device, seed)?;
        let embed_model = EmbedModel::load(embedding_source, &device)?;
        Ok(Self {
            generator: Some(Arc::new(generator)),
            embed_model: Arc::new(embed_model),
            device,
        })
    }

    /// Load only the embedding model. `generate` on the result fails with
    /// [`LlmError::GenerateUnsupported`].
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding model fails to load.
    pub fn embedder_only(embedding_source: &ModelSource, device: Device) -> Result<Self, LlmError> {
        let embed_model = EmbedModel::load(embedding_source, &device)?;
        Ok(Self {
            generator: None,
            embed_model: Arc::new(embed_model),
            device,
        })
    }

    #[must_use]
    pub fn can_generate(&self) -> bool {
        self.generator.is_some()
    }

    #[must_use]
    pub fn device_name(&self) -> &'static str {
        match &self.device {
            Device::Cpu => "cpu",
            Device::Cuda(_) => "cuda",
            Device::Metal(_) => "metal",
        }
    }
}

impl LlmProvider for CandleProvider {
    async fn generate(&self, prompt: &str, max_tokens: usize) -> Result<String, LlmError> {
        let generator = self
            .generator
            .clone()
            .ok_or(LlmError::GenerateUnsupported { provider: "candle" })?;
        let prompt = prompt.to_owned();
        let GenerationOutput {
            text,
            tokens_generated,
        } = tokio::task::spawn_blocking(move || generator.generate_sync(&prompt, max_tokens))
            .await
            .map_err(|e| LlmError::Inference(format!("candle generation task failed: {e}")))??;

        tracing::debug!("generated {tokens_generated} token(s)");
        Ok(text)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let model = Arc::clone(&self.embed_model);
        let text = text.to_owned();
        tokio::task::spawn_blocking(move || model.embed_sync(&text))
            .await
            .map_err(|e| LlmError::Inference(format!("candle embedding task failed: {e}")))?
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "candle"
    }
}
