//! Completion engine: raw text in, ranked completions out.
//!
//! Splits the input into context and partially typed word, encodes the
//! context, runs [`PrefixAwareBeamSearcher`], and renders each completion
//! as the context followed by its decoded tokens.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{ModelConfig, SearchConfig};
use crate::context::{split_partial_token, ContextEncoder};
use crate::error::{ComposeError, ConfigError, Result};
use crate::model::StepModel;
use crate::search::{CancelToken, PrefixAwareBeamSearcher, ScoredCompletion};
use crate::vocab::{SpecialTokens, Vocabulary};

/// Decoder output for one input, best completion first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOutput {
    /// Whether any vocabulary token is consistent with the partial word.
    pub exist_prefix: bool,
    pub predicted_scores: Vec<f32>,
    pub predicted_texts: Vec<String>,
}

impl CompletionOutput {
    pub fn is_empty(&self) -> bool {
        self.predicted_texts.is_empty()
    }
}

/// Object-safe view of an engine, for callers that do not care which model
/// or vocabulary sits behind it.
pub trait CompletionService: Send + Sync {
    fn complete(&self, text: &str, cancel: &CancelToken) -> Result<CompletionOutput>;

    /// Decode a batch. Exactly one input is accepted.
    fn complete_batch(&self, inputs: &[String], cancel: &CancelToken) -> Result<CompletionOutput> {
        match inputs {
            [text] => self.complete(text, cancel),
            _ => Err(ComposeError::BatchSize(inputs.len())),
        }
    }

    fn tokenize(&self, text: &str) -> Result<Vec<u32>>;

    fn detokenize(&self, token_ids: &[u32]) -> Result<String>;

    fn vocab_size(&self) -> usize;

    fn search_config(&self) -> &SearchConfig;
}

pub struct CompletionEngine<M: StepModel, V: Vocabulary> {
    model: M,
    vocab: V,
    model_config: ModelConfig,
    searcher: PrefixAwareBeamSearcher,
    encoder: ContextEncoder,
    special: SpecialTokens,
    surfaces: Vec<String>,
}

impl<M: StepModel, V: Vocabulary> CompletionEngine<M, V> {
    pub fn new(
        model: M,
        vocab: V,
        model_config: ModelConfig,
        search_config: SearchConfig,
    ) -> std::result::Result<Self, ConfigError> {
        model_config.validate()?;
        if vocab.vocab_size() != model_config.vocab_size {
            return Err(ConfigError::VocabSizeMismatch {
                name: "config",
                model: model_config.vocab_size,
                vocab: vocab.vocab_size(),
            });
        }
        if model.vocab_size() != model_config.vocab_size {
            return Err(ConfigError::VocabSizeMismatch {
                name: "step model",
                model: model.vocab_size(),
                vocab: vocab.vocab_size(),
            });
        }

        let special = SpecialTokens::from_model_config(&model_config);
        if vocab.special_tokens() != special {
            return Err(ConfigError::SpecialTokensMismatch {
                model: special,
                vocab: vocab.special_tokens(),
            });
        }
        let searcher = PrefixAwareBeamSearcher::new(search_config, model_config.vocab_size, special)?;
        let encoder = ContextEncoder::from_model_config(&model_config);
        let surfaces = vocab.surface_forms();

        info!(
            vocab_size = model_config.vocab_size,
            beam_width = search_config.beam_width,
            max_decode_length = search_config.max_decode_length,
            length_norm_power = search_config.length_norm_power,
            min_seq_prob = search_config.min_seq_prob,
            "completion engine ready"
        );

        Ok(Self {
            model,
            vocab,
            model_config,
            searcher,
            encoder,
            special,
            surfaces,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn vocab(&self) -> &V {
        &self.vocab
    }

    pub fn model_config(&self) -> &ModelConfig {
        &self.model_config
    }

    pub fn searcher(&self) -> &PrefixAwareBeamSearcher {
        &self.searcher
    }

    fn render(&self, context: &str, completion: &ScoredCompletion) -> Result<String> {
        let words: Vec<u32> = completion
            .token_ids
            .iter()
            .copied()
            .filter(|&id| !self.special.is_special(id))
            .collect();
        if words.is_empty() {
            return Ok(context.trim_end().to_string());
        }
        let decoded = self.vocab.decode(&words)?;
        Ok(format!("{context}{decoded}"))
    }
}

impl<M: StepModel, V: Vocabulary> CompletionService for CompletionEngine<M, V> {
    fn complete(&self, text: &str, cancel: &CancelToken) -> Result<CompletionOutput> {
        let (context, partial) = split_partial_token(text);
        let context_ids = self.encoder.encode(&self.vocab, context)?;
        debug!(context_len = context_ids.len(), partial, "completing");

        let outcome =
            self.searcher
                .search(&self.model, &context_ids, partial, &self.surfaces, cancel)?;

        let mut predicted_scores = Vec::with_capacity(outcome.completions.len());
        let mut predicted_texts = Vec::with_capacity(outcome.completions.len());
        for completion in &outcome.completions {
            predicted_scores.push(completion.score);
            predicted_texts.push(self.render(context, completion)?);
        }

        Ok(CompletionOutput {
            exist_prefix: outcome.exist_prefix,
            predicted_scores,
            predicted_texts,
        })
    }

    fn tokenize(&self, text: &str) -> Result<Vec<u32>> {
        self.vocab.encode(text)
    }

    fn detokenize(&self, token_ids: &[u32]) -> Result<String> {
        let vocab_size = self.model_config.vocab_size;
        if let Some(&id) = token_ids.iter().find(|&&id| id as usize >= vocab_size) {
            return Err(ConfigError::TokenIdOutOfRange {
                name: "input",
                id,
                vocab_size,
            }
            .into());
        }
        self.vocab.decode(token_ids)
    }

    fn vocab_size(&self) -> usize {
        self.model_config.vocab_size
    }

    fn search_config(&self) -> &SearchConfig {
        self.searcher.config()
    }
}
