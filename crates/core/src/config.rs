use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Model hyperparameters, read from a model directory's `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub vocab_size: usize,
    pub embedding_dim: usize,
    pub hidden_size: usize,
    pub separator_token_id: u32,
    pub pad_token_id: u32,
    #[serde(default)]
    pub cls_token_id: Option<u32>,
    /// Training-time padding length. Inference always pads to a single id.
    #[serde(default = "default_min_len")]
    pub min_len: usize,
    /// Context encodings keep only the most recent `max_len` ids.
    #[serde(default = "default_max_len")]
    pub max_len: usize,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_min_len() -> usize {
    1
}

fn default_max_len() -> usize {
    32
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            vocab_size: 30522,
            embedding_dim: 128,
            hidden_size: 128,
            separator_token_id: 102,
            pad_token_id: 0,
            cls_token_id: Some(101),
            min_len: default_min_len(),
            max_len: default_max_len(),
            extra: serde_json::Map::new(),
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vocab_size == 0 {
            return Err(ConfigError::ZeroVocabSize);
        }
        if self.max_len == 0 {
            return Err(ConfigError::ZeroMaxLen);
        }
        if self.min_len > self.max_len {
            return Err(ConfigError::MinLenExceedsMaxLen {
                min_len: self.min_len,
                max_len: self.max_len,
            });
        }
        check_token_id("separator", self.separator_token_id, self.vocab_size)?;
        check_token_id("pad", self.pad_token_id, self.vocab_size)?;
        if let Some(cls) = self.cls_token_id {
            check_token_id("cls", cls, self.vocab_size)?;
        }
        Ok(())
    }
}

pub(crate) fn check_token_id(
    name: &'static str,
    id: u32,
    vocab_size: usize,
) -> Result<(), ConfigError> {
    if (id as usize) < vocab_size {
        Ok(())
    } else {
        Err(ConfigError::TokenIdOutOfRange {
            name,
            id,
            vocab_size,
        })
    }
}

/// What the searcher does when no vocabulary token is consistent with the
/// partially typed word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoPrefixMatchPolicy {
    /// Report `exist_prefix = false` with no completions. The model is not run.
    #[default]
    ReturnEmpty,
    /// Report `exist_prefix = false` but decode as if nothing had been typed.
    Unconstrained,
}

/// Beam search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub beam_width: usize,
    /// 0 ranks by raw log-probability; positive values shrink the score
    /// magnitude of longer completions.
    pub length_norm_power: f32,
    pub max_decode_length: usize,
    /// Sequences whose probability drops below this are discarded. 0 disables pruning.
    pub min_seq_prob: f32,
    pub no_prefix_match: NoPrefixMatchPolicy,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            beam_width: 10,
            length_norm_power: 0.0,
            max_decode_length: 3,
            min_seq_prob: 0.0,
            no_prefix_match: NoPrefixMatchPolicy::ReturnEmpty,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.beam_width == 0 {
            return Err(ConfigError::ZeroBeamWidth);
        }
        if self.max_decode_length == 0 {
            return Err(ConfigError::ZeroMaxDecodeLength);
        }
        if !self.length_norm_power.is_finite() || self.length_norm_power < 0.0 {
            return Err(ConfigError::InvalidLengthNormPower(self.length_norm_power));
        }
        if !(0.0..=1.0).contains(&self.min_seq_prob) {
            return Err(ConfigError::MinSeqProbOutOfRange(self.min_seq_prob));
        }
        Ok(())
    }
}
