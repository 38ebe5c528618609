use std::io::Write;
use std::path::PathBuf;

use serial_test::serial;

use super::*;
use crumb_memory::document::SplitStrategy;

const ENV_KEYS: [&str; 17] = [
    "CRUMB_LLM_PROVIDER",
    "CRUMB_LLM_BASE_URL",
    "CRUMB_LLM_MODEL",
    "CRUMB_LLM_EMBEDDING_MODEL",
    "CRUMB_LLM_MAX_TOKENS",
    "CRUMB_CANDLE_DEVICE",
    "CRUMB_INDEX_SOURCE",
    "CRUMB_INDEX_CHUNK_SIZE",
    "CRUMB_INDEX_CHUNK_OVERLAP",
    "CRUMB_STORE_BACKEND",
    "CRUMB_STORE_PATH",
    "CRUMB_QDRANT_URL",
    "CRUMB_STORE_COLLECTION",
    "CRUMB_RETRIEVAL_TOP_K",
    "CRUMB_RETRIEVAL_SCORE_THRESHOLD",
    "CRUMB_GATEWAY_BIND",
    "CRUMB_GATEWAY_PORT",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    write!(f, "{body}").unwrap();
    path
}

#[test]
fn defaults_when_file_missing() {
    let config = Config::default();
    assert_eq!(config.llm.provider, ProviderKind::Candle);
    assert_eq!(config.llm.model(), "google/flan-t5-base");
    assert_eq!(
        config.llm.embedding_model(),
        "sentence-transformers/all-MiniLM-L6-v2"
    );
    assert_eq!(config.llm.max_tokens, 200);
    assert_eq!(config.llm.candle.device, "cpu");
    assert_eq!(config.index.source_path, PathBuf::from("data/source.txt"));
    assert_eq!(config.index.chunk_size, 500);
    assert_eq!(config.index.chunk_overlap, 200);
    assert_eq!(config.index.strategy, SplitStrategy::Recursive);
    assert_eq!(config.store.backend, StoreBackend::Sqlite);
    assert_eq!(config.store.path, PathBuf::from("data/vector_db"));
    assert_eq!(config.store.collection, "crumb_chunks");
    assert_eq!(config.retrieval.top_k, 3);
    assert!((config.retrieval.score_threshold - 0.3).abs() < f32::EPSILON);
    assert_eq!(config.gateway.bind, "127.0.0.1");
    assert_eq!(config.gateway.port, 7860);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn load_missing_file_uses_defaults() {
    clear_env();
    let config = Config::load(std::path::Path::new("/nonexistent/crumb.toml")).unwrap();
    assert_eq!(config.index.chunk_size, 500);
    assert_eq!(config.gateway.port, 7860);
}

#[test]
#[serial]
fn load_partial_file_fills_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[llm]
provider = "ollama"
model = "llama3.2:1b"
embedding_model = "all-minilm"

[index]
source_path = "docs/handbook.md"
strategy = "chars"

[store]
backend = "qdrant"
"#,
    );

    let config = Config::load(&path).unwrap();
    assert_eq!(config.llm.provider, ProviderKind::Ollama);
    assert_eq!(config.llm.model(), "llama3.2:1b");
    assert_eq!(config.llm.embedding_model(), "all-minilm");
    assert_eq!(config.llm.base_url, "http://localhost:11434");
    assert_eq!(config.index.source_path, PathBuf::from("docs/handbook.md"));
    assert_eq!(config.index.strategy, SplitStrategy::Chars);
    assert_eq!(config.index.chunk_size, 500);
    assert_eq!(config.store.backend, StoreBackend::Qdrant);
    assert_eq!(config.retrieval.top_k, 3);
}

#[test]
#[serial]
fn load_rejects_malformed_toml() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[index\nchunk_size = ");
    assert!(Config::load(&path).is_err());
}

#[test]
#[serial]
fn load_rejects_unknown_provider() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[llm]\nprovider = \"claude\"\n");
    assert!(Config::load(&path).is_err());
}

#[test]
#[serial]
fn load_rejects_overlap_not_smaller_than_chunk() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[index]\nchunk_size = 100\nchunk_overlap = 100\n");
    let err = Config::load(&path).unwrap_err();
    assert!(err.to_string().contains("chunk_overlap"), "{err}");
}

#[test]
fn validate_rejects_zero_values() {
    let mut config = Config::default();
    config.index.chunk_size = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.retrieval.top_k = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.llm.max_tokens = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.store.collection = "  ".into();
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_unusable_ollama_url() {
    let mut config = Config::default();
    config.llm.provider = ProviderKind::Ollama;
    config.llm.base_url = "localhost:11434".into();
    let err = config.validate().unwrap_err();
    assert!(format!("{err:#}").contains("base_url"), "{err:#}");

    config.llm.base_url = "http://localhost:11434".into();
    assert!(config.validate().is_ok());

    config.llm.provider = ProviderKind::Candle;
    config.llm.base_url = "localhost:11434".into();
    assert!(config.validate().is_ok());
}

#[test]
fn model_defaults_follow_provider() {
    let mut config = Config::default();
    config.llm.provider = ProviderKind::Ollama;
    assert_eq!(config.llm.model(), "llama3.2:1b");
    assert_eq!(config.llm.embedding_model(), "all-minilm");

    config.llm.embedding_model = Some("nomic-embed-text".into());
    assert_eq!(config.llm.embedding_model(), "nomic-embed-text");
    assert_eq!(config.llm.model(), "llama3.2:1b");
}

#[test]
#[serial]
fn env_overrides() {
    clear_env();
    let mut config = Config::default();

    unsafe {
        std::env::set_var("CRUMB_LLM_PROVIDER", "Ollama");
        std::env::set_var("CRUMB_LLM_MODEL", "phi3:mini");
        std::env::set_var("CRUMB_INDEX_CHUNK_SIZE", "800");
        std::env::set_var("CRUMB_STORE_BACKEND", "qdrant");
        std::env::set_var("CRUMB_STORE_PATH", "/var/lib/crumb");
        std::env::set_var("CRUMB_RETRIEVAL_TOP_K", "5");
        std::env::set_var("CRUMB_GATEWAY_PORT", "8080");
    }
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.llm.provider, ProviderKind::Ollama);
    assert_eq!(config.llm.model(), "phi3:mini");
    assert_eq!(config.llm.embedding_model(), "all-minilm");
    assert_eq!(config.index.chunk_size, 800);
    assert_eq!(config.store.backend, StoreBackend::Qdrant);
    assert_eq!(config.store.path, PathBuf::from("/var/lib/crumb"));
    assert_eq!(config.retrieval.top_k, 5);
    assert_eq!(config.gateway.port, 8080);
}

#[test]
#[serial]
fn env_override_invalid_values_ignored() {
    clear_env();
    let mut config = Config::default();

    unsafe {
        std::env::set_var("CRUMB_LLM_PROVIDER", "gpt");
        std::env::set_var("CRUMB_INDEX_CHUNK_OVERLAP", "lots");
        std::env::set_var("CRUMB_GATEWAY_PORT", "99999");
    }
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.llm.provider, ProviderKind::Candle);
    assert_eq!(config.index.chunk_overlap, 200);
    assert_eq!(config.gateway.port, 7860);
}

#[test]
#[serial]
fn env_override_wins_over_file() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[retrieval]\ntop_k = 4\n");

    unsafe { std::env::set_var("CRUMB_RETRIEVAL_TOP_K", "7") };
    let config = Config::load(&path);
    clear_env();

    assert_eq!(config.unwrap().retrieval.top_k, 7);
}

#[test]
#[serial]
fn env_override_score_threshold_clamped() {
    clear_env();
    let mut config = Config::default();
    unsafe { std::env::set_var("CRUMB_RETRIEVAL_SCORE_THRESHOLD", "4.5") };
    config.apply_env_overrides();
    clear_env();
    assert!((config.retrieval.score_threshold - 1.0).abs() < f32::EPSILON);
}

#[test]
fn provider_kind_display() {
    assert_eq!(ProviderKind::Candle.to_string(), "candle");
    assert_eq!(ProviderKind::Ollama.as_str(), "ollama");
}

#[test]
fn config_round_trips_through_toml() {
    let config = Config::default();
    let text = toml::to_string(&config).unwrap();
    let parsed: Config = toml::from_str(&text).unwrap();
    assert_eq!(parsed.store.collection, config.store.collection);
    assert_eq!(parsed.index.max_file_size, config.index.max_file_size);
}
