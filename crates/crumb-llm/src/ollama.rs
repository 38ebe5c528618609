use ollama_rs::Ollama;
use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::models::ModelOptions;
use url::Url;

use crate::error::LlmError;
use crate::provider::LlmProvider;

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Ollama,
    model: String,
    embedding_model: String,
}

const DEFAULT_PORT: u16 = 11434;

impl OllamaProvider {
    /// Create a client for the Ollama server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidUrl`] unless `base_url` is an `http` or
    /// `https` URL with a host.
    pub fn new(base_url: &str, model: String, embedding_model: String) -> Result<Self, LlmError> {
        let (host, port) = parse_host_port(base_url)?;
        Ok(Self {
            client: Ollama::new(host, port),
            model,
            embedding_model,
        })
    }

    /// Check if Ollama is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection to Ollama fails.
    pub async fn health_check(&self) -> Result<(), LlmError> {
        self.client.list_local_models().await.map_err(|e| {
            LlmError::Other(format!("failed to connect to Ollama, is it running? {e}"))
        })?;
        Ok(())
    }
}

impl LlmProvider for OllamaProvider {
    async fn generate(&self, prompt: &str, max_tokens: usize) -> Result<String, LlmError> {
        let num_predict = i32::try_from(max_tokens).unwrap_or(i32::MAX);
        let request = GenerationRequest::new(self.model.clone(), prompt.to_owned())
            .options(ModelOptions::default().num_predict(num_predict));

        let response = self
            .client
            .generate(request)
            .await
            .map_err(|e| LlmError::Other(format!("Ollama generation request failed: {e}")))?;

        if response.response.is_empty() {
            return Err(LlmError::EmptyResponse { provider: "ollama" });
        }
        Ok(response.response)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let request = GenerateEmbeddingsRequest::new(
            self.embedding_model.clone(),
            EmbeddingsInput::from(text),
        );

        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| LlmError::Other(format!("Ollama embedding request failed: {e}")))?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse { provider: "ollama" })
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "ollama"
    }
}

/// Split `base_url` into the `scheme://host` and port pair the client expects.
///
/// # Errors
///
/// Returns [`LlmError::InvalidUrl`] for unparseable URLs, schemes other than
/// `http`/`https`, or URLs without a host.
pub fn parse_host_port(base_url: &str) -> Result<(String, u16), LlmError> {
    let invalid = |reason: &str| LlmError::InvalidUrl {
        url: base_url.to_owned(),
        reason: reason.to_owned(),
    };
    let url = Url::parse(base_url.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
    let port = url.port().unwrap_or(DEFAULT_PORT);
    Ok((format!("{}://{host}", url.scheme()), port))
}
