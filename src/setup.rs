//! Construction of the long-lived resources shared by every command.

use std::path::PathBuf;
use std::sync::Arc;

#[cfg(feature = "candle")]
use anyhow::Context;
use anyhow::bail;
use crumb_core::config::{Config, ProviderKind, StoreBackend, StoreConfig};
use crumb_llm::any::AnyProvider;
use crumb_llm::ollama::OllamaProvider;
use crumb_memory::{InMemoryVectorStore, QdrantOps, SqliteVectorStore, VectorStore};

pub(crate) fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `--config`, then `CRUMB_CONFIG`, then the default path.
pub(crate) fn resolve_config_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    if let Ok(path) = std::env::var("CRUMB_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(crumb_core::config::DEFAULT_CONFIG_PATH)
}

fn ollama_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let provider = OllamaProvider::new(
        &config.llm.base_url,
        config.llm.model().to_owned(),
        config.llm.embedding_model().to_owned(),
    )?;
    Ok(AnyProvider::Ollama(provider))
}

/// Provider able to both embed and generate, for `ask` and `serve`.
pub(crate) fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    match config.llm.provider {
        ProviderKind::Ollama => ollama_provider(config),
        #[cfg(feature = "candle")]
        ProviderKind::Candle => {
            use crumb_llm::candle_provider::CandleProvider;
            use crumb_llm::candle_provider::loader::ModelSource;

            let candle_cfg = &config.llm.candle;
            let generator = ModelSource::from_config(&candle_cfg.source, config.llm.model());
            let embedder =
                ModelSource::from_config(&candle_cfg.source, config.llm.embedding_model());
            let device = select_device(&candle_cfg.device)?;
            let provider = CandleProvider::new(&generator, &embedder, candle_cfg.seed, device)
                .context("failed to load candle models")?;
            Ok(AnyProvider::Candle(provider))
        }
        #[allow(unreachable_patterns)]
        other => bail!("LLM provider {other} not available (feature not enabled)"),
    }
}

/// Provider that only needs to embed, for `index` and `search`. The candle
/// generator is never loaded.
pub(crate) fn create_embedder(config: &Config) -> anyhow::Result<AnyProvider> {
    match config.llm.provider {
        ProviderKind::Ollama => ollama_provider(config),
        #[cfg(feature = "candle")]
        ProviderKind::Candle => {
            use crumb_llm::candle_provider::CandleProvider;
            use crumb_llm::candle_provider::loader::ModelSource;

            let candle_cfg = &config.llm.candle;
            let embedder =
                ModelSource::from_config(&candle_cfg.source, config.llm.embedding_model());
            let device = select_device(&candle_cfg.device)?;
            let provider = CandleProvider::embedder_only(&embedder, device)
                .context("failed to load candle embedding model")?;
            Ok(AnyProvider::Candle(provider))
        }
        #[allow(unreachable_patterns)]
        other => bail!("LLM provider {other} not available (feature not enabled)"),
    }
}

#[cfg(feature = "candle")]
pub(crate) fn select_device(
    preference: &str,
) -> anyhow::Result<crumb_llm::candle_provider::Device> {
    use crumb_llm::candle_provider::Device;

    match preference {
        "metal" => {
            #[cfg(feature = "metal")]
            return Ok(Device::new_metal(0)?);
            #[cfg(not(feature = "metal"))]
            bail!("candle compiled without metal feature");
        }
        "cuda" => {
            #[cfg(feature = "cuda")]
            return Ok(Device::new_cuda(0)?);
            #[cfg(not(feature = "cuda"))]
            bail!("candle compiled without cuda feature");
        }
        "auto" => {
            #[cfg(feature = "metal")]
            if let Ok(device) = Device::new_metal(0) {
                return Ok(device);
            }
            #[cfg(feature = "cuda")]
            if let Ok(device) = Device::new_cuda(0) {
                return Ok(device);
            }
            Ok(Device::Cpu)
        }
        _ => Ok(Device::Cpu),
    }
}

pub(crate) async fn health_check(provider: &AnyProvider) {
    match provider {
        AnyProvider::Ollama(ollama) => match ollama.health_check().await {
            Ok(()) => tracing::info!("ollama health check passed"),
            Err(e) => tracing::warn!("ollama health check failed: {e:#}"),
        },
        #[cfg(feature = "candle")]
        AnyProvider::Candle(candle) => {
            tracing::info!("candle provider loaded, device: {}", candle.device_name());
        }
        #[allow(unreachable_patterns)]
        _ => {}
    }
}

/// Open the store for writing, creating the `SQLite` database when needed.
pub(crate) async fn open_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match config.backend {
        StoreBackend::Sqlite => Arc::new(SqliteVectorStore::open(&config.path).await?),
        StoreBackend::Qdrant => Arc::new(QdrantOps::new(&config.qdrant_url)?),
    };
    tracing::debug!(location = %store_location(config), "vector store opened");
    Ok(store)
}

/// Open the store for reading. A `SQLite` index that was never built reads as
/// empty and nothing is created on disk.
pub(crate) async fn open_index(config: &StoreConfig) -> anyhow::Result<Arc<dyn VectorStore>> {
    match config.backend {
        StoreBackend::Sqlite => match SqliteVectorStore::open_existing(&config.path).await? {
            Some(store) => Ok(Arc::new(store)),
            None => {
                tracing::info!(
                    location = %store_location(config),
                    "no index built yet, reading an empty one"
                );
                Ok(Arc::new(InMemoryVectorStore::new()))
            }
        },
        StoreBackend::Qdrant => open_store(config).await,
    }
}

/// Human-readable location of the persisted index.
pub(crate) fn store_location(config: &StoreConfig) -> String {
    match config.backend {
        StoreBackend::Sqlite => config
            .path
            .join(crumb_memory::sqlite::DB_FILE_NAME)
            .display()
            .to_string(),
        StoreBackend::Qdrant => format!("{} (collection {})", config.qdrant_url, config.collection),
    }
}
