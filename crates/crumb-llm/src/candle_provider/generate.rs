use std::sync::Mutex;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::t5::{self, T5ForConditionalGeneration};
use tokenizers::Tokenizer;

use super::loader::{ModelSource, load_tokenizer, resolve_files};
use crate::error::LlmError;

/// Token ids that drive the decoder loop.
#[derive(Debug, Clone, Copy)]
pub struct DecodeConfig {
    pub start_token: u32,
    pub eos_token: u32,
    pub max_tokens: usize,
    /// With a KV cache only the newest token is fed to each step.
    pub use_cache: bool,
}

pub struct GenerationOutput {
    pub text: String,
    pub tokens_generated: usize,
}

/// Encoder-decoder (T5 family) text-to-text model.
pub struct Seq2SeqModel {
    // std::sync::Mutex: the decoder KV cache makes every call exclusive.
    model: Mutex<T5ForConditionalGeneration>,
    tokenizer: Tokenizer,
    config: t5::Config,
    device: Device,
    seed: u64,
}

impl std::fmt::Debug for Seq2SeqModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Seq2SeqModel")
            .field("device", &self.device)
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl Seq2SeqModel {
    /// Load a T5 conditional-generation model.
    ///
    /// # Errors
    ///
    /// Returns an error if model download or loading fails.
    pub fn load(source: &ModelSource, device: &Device, seed: u64) -> Result<Self, LlmError> {
        let files = resolve_files(source)?;

        let config_str = std::fs::read_to_string(&files.config)
            .map_err(|e| LlmError::ModelLoad(format!("failed to read T5 config: {e}")))?;
        let mut config: t5::Config = serde_json::from_str(&config_str)?;
        config.use_cache = true;

        let tokenizer = load_tokenizer(&files.tokenizer)?;

        // SAFETY: the safetensors file is not modified during the VarBuilder lifetime
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.weights], DType::F32, device)?
        };
        let model = T5ForConditionalGeneration::load(vb, &config)?;

        Ok(Self {
            model: Mutex::new(model),
            tokenizer,
            config,
            device: device.clone(),
            seed,
        })
    }

    /// Greedy-decode an answer for `prompt`.
    ///
    /// # Errors
    ///
    /// Returns an error if tokenization, a forward pass or detokenization fails.
    pub fn generate_sync(
        &self,
        prompt: &str,
        max_tokens: usize,
    ) -> Result<GenerationOutput, LlmError> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| LlmError::Inference(format!("tokenizer encode failed: {e}")))?;
        let input_ids = Tensor::new(encoding.get_ids(), &self.device)?.unsqueeze(0)?;

        let decode_config = DecodeConfig {
            start_token: token_id(
                self.config
                    .decoder_start_token_id
                    .unwrap_or(self.config.pad_token_id),
            )?,
            eos_token: token_id(self.config.eos_token_id)?,
            max_tokens,
            use_cache: self.config.use_cache,
        };
        let mut logits_processor = LogitsProcessor::new(self.seed, None, None);

        let mut model = self
            .model
            .lock()
            .map_err(|e| LlmError::Inference(format!("model lock poisoned: {e}")))?;
        model.clear_kv_cache();
        let encoder_output = model.encode(&input_ids)?;

        let device = &self.device;
        let mut step = |ids: &[u32]| -> Result<Tensor, LlmError> {
            let decoder_ids = Tensor::new(ids, device)?.unsqueeze(0)?;
            let logits = model.decode(&decoder_ids, &encoder_output)?.squeeze(0)?;
            Ok(logits.to_dtype(DType::F32)?)
        };
        let tokens = decode_tokens(&mut step, decode_config, &mut logits_processor)?;
        model.clear_kv_cache();
        drop(model);

        let text = self
            .tokenizer
            .decode(&tokens, true)
            .map_err(|e| LlmError::Inference(format!("tokenizer decode failed: {e}")))?;
        Ok(GenerationOutput {
            text,
            tokens_generated: tokens.len(),
        })
    }
}

fn token_id(id: usize) -> Result<u32, LlmError> {
    u32::try_from(id).map_err(|e| LlmError::ModelLoad(format!("token id out of range: {e}")))
}

/// Run the decoder loop until EOS or `max_tokens` generated tokens.
///
/// `step_fn` receives the decoder input for one step and returns the logits of the next token.
/// The start token and the EOS token are not part of the result.
///
/// # Errors
///
/// Returns an error if a step or sampling fails.
pub fn decode_tokens<F>(
    step_fn: &mut F,
    config: DecodeConfig,
    logits_processor: &mut LogitsProcessor,
) -> Result<Vec<u32>, LlmError>
where
    F: FnMut(&[u32]) -> Result<Tensor, LlmError>,
{
    let mut output = vec![config.start_token];

    for index in 0..config.max_tokens {
        let input = if index == 0 || !config.use_cache {
            &output[..]
        } else {
            &output[output.len() - 1..]
        };
        let logits = step_fn(input)?;
        let next_token = logits_processor.sample(&logits)?;
        if next_token == config.eos_token {
            break;
        }
        output.push(next_token);
    }

    output.remove(0);
    Ok(output)
}
