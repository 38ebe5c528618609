use std::path::{Path, PathBuf};

use crate::error::LlmError;

/// Where the weights, tokenizer and config of a model come from.
#[derive(Debug, Clone)]
pub enum ModelSource {
    /// A directory holding `config.json`, `tokenizer.json` and `model.safetensors`.
    Local { path: PathBuf },
    HuggingFace { repo_id: String },
}

impl ModelSource {
    /// `local` selects a directory, anything else is treated as a Hugging Face repo id.
    #[must_use]
    pub fn from_config(kind: &str, model: &str) -> Self {
        match kind {
            "local" => Self::Local {
                path: PathBuf::from(model),
            },
            _ => Self::HuggingFace {
                repo_id: model.to_owned(),
            },
        }
    }
}

#[derive(Debug)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";

/// Resolve model files, downloading them into the Hugging Face cache when needed.
///
/// # Errors
///
/// Returns an error if a file is missing locally or cannot be downloaded.
pub fn resolve_files(source: &ModelSource) -> Result<ModelFiles, LlmError> {
    match source {
        ModelSource::Local { path } => Ok(ModelFiles {
            config: local_file(path, CONFIG_FILE)?,
            tokenizer: local_file(path, TOKENIZER_FILE)?,
            weights: local_file(path, WEIGHTS_FILE)?,
        }),
        ModelSource::HuggingFace { repo_id } => {
            let api = hf_hub::api::sync::Api::new().map_err(|e| {
                LlmError::ModelLoad(format!("failed to create HuggingFace API client: {e}"))
            })?;
            let repo = api.model(repo_id.clone());
            let fetch = |name: &str| {
                repo.get(name).map_err(|e| {
                    LlmError::ModelLoad(format!("failed to download {name} from {repo_id}: {e}"))
                })
            };
            Ok(ModelFiles {
                config: fetch(CONFIG_FILE)?,
                tokenizer: fetch(TOKENIZER_FILE)?,
                weights: fetch(WEIGHTS_FILE)?,
            })
        }
    }
}

fn local_file(dir: &Path, name: &str) -> Result<PathBuf, LlmError> {
    let path = dir.join(name);
    if path.is_file() {
        Ok(path)
    } else {
        Err(LlmError::ModelLoad(format!(
            "{name} not found in {}",
            dir.display()
        )))
    }
}

pub(crate) fn load_tokenizer(path: &Path) -> Result<tokenizers::Tokenizer, LlmError> {
    let mut tokenizer = tokenizers::Tokenizer::from_file(path).map_err(|e| {
        LlmError::ModelLoad(format!(
            "failed to load tokenizer from {}: {e}",
            path.display()
        ))
    })?;
    tokenizer
        .with_truncation(Some(tokenizers::TruncationParams {
            max_length: MAX_INPUT_TOKENS,
            ..Default::default()
        }))
        .map_err(|e| LlmError::ModelLoad(format!("failed to configure truncation: {e}")))?;
    Ok(tokenizer)
}

/// Both the BERT encoder and T5 are trained on inputs of at most 512 tokens.
const MAX_INPUT_TOKENS: usize = 512;
