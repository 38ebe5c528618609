use std::str::FromStr;

use super::Config;

/// Parsed value of `key`, or `None` when unset. Unparsable values are logged and ignored.
fn parsed<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("ignoring invalid {key} value: {raw}");
            None
        }
    }
}

/// Like [`parsed`] for lowercase serde enums such as `ProviderKind`.
fn parsed_enum<T: serde::de::DeserializeOwned>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    if let Ok(v) = serde_json::from_value(serde_json::Value::String(raw.trim().to_lowercase())) {
        Some(v)
    } else {
        tracing::warn!("ignoring invalid {key} value: {raw}");
        None
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_index();
        self.apply_env_overrides_serving();
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Some(kind) = parsed_enum("CRUMB_LLM_PROVIDER") {
            self.llm.provider = kind;
        }
        if let Ok(v) = std::env::var("CRUMB_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("CRUMB_LLM_MODEL") {
            self.llm.model = Some(v);
        }
        if let Ok(v) = std::env::var("CRUMB_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = Some(v);
        }
        if let Some(n) = parsed("CRUMB_LLM_MAX_TOKENS") {
            self.llm.max_tokens = n;
        }
        if let Ok(v) = std::env::var("CRUMB_CANDLE_DEVICE") {
            self.llm.candle.device = v;
        }
    }

    fn apply_env_overrides_index(&mut self) {
        if let Ok(v) = std::env::var("CRUMB_INDEX_SOURCE") {
            self.index.source_path = v.into();
        }
        if let Some(n) = parsed("CRUMB_INDEX_CHUNK_SIZE") {
            self.index.chunk_size = n;
        }
        if let Some(n) = parsed("CRUMB_INDEX_CHUNK_OVERLAP") {
            self.index.chunk_overlap = n;
        }
        if let Some(backend) = parsed_enum("CRUMB_STORE_BACKEND") {
            self.store.backend = backend;
        }
        if let Ok(v) = std::env::var("CRUMB_STORE_PATH") {
            self.store.path = v.into();
        }
        if let Ok(v) = std::env::var("CRUMB_QDRANT_URL") {
            self.store.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("CRUMB_STORE_COLLECTION") {
            self.store.collection = v;
        }
    }

    fn apply_env_overrides_serving(&mut self) {
        if let Some(k) = parsed("CRUMB_RETRIEVAL_TOP_K") {
            self.retrieval.top_k = k;
        }
        if let Some(t) = parsed::<f32>("CRUMB_RETRIEVAL_SCORE_THRESHOLD") {
            self.retrieval.score_threshold = t.clamp(-1.0, 1.0);
        }
        if let Ok(v) = std::env::var("CRUMB_GATEWAY_BIND") {
            self.gateway.bind = v;
        }
        if let Some(port) = parsed("CRUMB_GATEWAY_PORT") {
            self.gateway.port = port;
        }
    }
}
