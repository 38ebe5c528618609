use std::path::PathBuf;

use crumb_memory::document::{DEFAULT_MAX_FILE_SIZE, SplitStrategy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// LLM provider backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    #[default]
    Candle,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Candle => "candle",
        }
    }

    /// Generation model used when `llm.model` is unset.
    #[must_use]
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Ollama => "llama3.2:1b",
            Self::Candle => "google/flan-t5-base",
        }
    }

    /// Embedding model used when `llm.embedding_model` is unset.
    #[must_use]
    pub fn default_embedding_model(self) -> &'static str {
        match self {
            Self::Ollama => "all-minilm",
            Self::Candle => "sentence-transformers/all-MiniLM-L6-v2",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Generation model: a Hugging Face repo id, a local directory, or an Ollama model tag.
    /// Unset means the provider's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default)]
    pub candle: CandleConfig,
}

fn default_base_url() -> String {
    "http://localhost:11434".into()
}

fn default_max_tokens() -> usize {
    200
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            base_url: default_base_url(),
            model: None,
            embedding_model: None,
            max_tokens: default_max_tokens(),
            candle: CandleConfig::default(),
        }
    }
}

impl LlmConfig {
    #[must_use]
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    #[must_use]
    pub fn embedding_model(&self) -> &str {
        self.embedding_model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_embedding_model())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CandleConfig {
    /// `huggingface` or `local`.
    #[serde(default = "default_candle_source")]
    pub source: String,
    /// `cpu`, `cuda`, `metal` or `auto`.
    #[serde(default = "default_candle_device")]
    pub device: String,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_candle_source() -> String {
    "huggingface".into()
}

fn default_candle_device() -> String {
    "cpu".into()
}

fn default_seed() -> u64 {
    299_792_458
}

impl Default for CandleConfig {
    fn default() -> Self {
        Self {
            source: default_candle_source(),
            device: default_candle_device(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default = "default_source_path")]
    pub source_path: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default)]
    pub strategy: SplitStrategy,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_source_path() -> PathBuf {
    PathBuf::from("data/source.txt")
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            source_path: default_source_path(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            strategy: SplitStrategy::default(),
            max_file_size: default_max_file_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Qdrant,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Directory of the `SQLite` store.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/vector_db")
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

fn default_collection() -> String {
    "crumb_chunks".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
            qdrant_url: default_qdrant_url(),
            collection: default_collection(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Minimum cosine similarity for a chunk to count as relevant.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
}

fn default_top_k() -> usize {
    3
}

fn default_score_threshold() -> f32 {
    0.3
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            score_threshold: default_score_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    #[serde(default = "default_gateway_max_body")]
    pub max_body_size: usize,
}

fn default_gateway_bind() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    7860
}

fn default_gateway_max_body() -> usize {
    65_536
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_gateway_bind(),
            port: default_gateway_port(),
            max_body_size: default_gateway_max_body(),
        }
    }
}
