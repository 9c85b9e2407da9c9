use thiserror::Error;

use crate::vocab::SpecialTokens;

/// Rejected configuration. Returned at construction time, never mid-decode.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("vocab_size must be positive")]
    ZeroVocabSize,

    #[error("beam_width must be positive")]
    ZeroBeamWidth,

    #[error("max_decode_length must be positive")]
    ZeroMaxDecodeLength,

    #[error("max_len must be positive")]
    ZeroMaxLen,

    #[error("length_norm_power must be finite and >= 0, got {0}")]
    InvalidLengthNormPower(f32),

    #[error("min_seq_prob must be in [0, 1], got {0}")]
    MinSeqProbOutOfRange(f32),

    #[error("{name} token id {id} is outside vocabulary of size {vocab_size}")]
    TokenIdOutOfRange {
        name: &'static str,
        id: u32,
        vocab_size: usize,
    },

    #[error("min_len {min_len} exceeds max_len {max_len}")]
    MinLenExceedsMaxLen { min_len: usize, max_len: usize },

    #[error("{name} size mismatch: model has {model}, vocabulary has {vocab}")]
    VocabSizeMismatch {
        name: &'static str,
        model: usize,
        vocab: usize,
    },

    #[error("vocabulary special tokens {vocab:?} differ from model config {model:?}")]
    SpecialTokensMismatch {
        model: SpecialTokens,
        vocab: SpecialTokens,
    },
}

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("decoder expects exactly one input per call, got {0}")]
    BatchSize(usize),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("step model returned {got} logit rows, expected {expected}")]
    LogitsRowCount { expected: usize, got: usize },

    #[error("logit row has length {got}, expected vocab size {expected}")]
    LogitsWidth { expected: usize, got: usize },

    #[error("step model returned {got} states, expected {expected}")]
    StateCount { expected: usize, got: usize },

    #[error("decode cancelled at step {step}")]
    Cancelled { step: usize },

    #[error("decode deadline exceeded at step {step}")]
    DeadlineExceeded { step: usize },

    #[error("candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ComposeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_token_out_of_range() {
        let e = ConfigError::TokenIdOutOfRange {
            name: "separator",
            id: 9,
            vocab_size: 5,
        };
        assert_eq!(
            e.to_string(),
            "separator token id 9 is outside vocabulary of size 5"
        );
    }

    #[test]
    fn error_display_min_len() {
        let e = ConfigError::MinLenExceedsMaxLen {
            min_len: 4,
            max_len: 2,
        };
        assert_eq!(e.to_string(), "min_len 4 exceeds max_len 2");
    }

    #[test]
    fn config_error_converts_into_compose_error() {
        let e: ComposeError = ConfigError::ZeroBeamWidth.into();
        assert_eq!(
            e.to_string(),
            "invalid configuration: beam_width must be positive"
        );
    }

    #[test]
    fn error_display_batch_size() {
        assert_eq!(
            ComposeError::BatchSize(3).to_string(),
            "decoder expects exactly one input per call, got 3"
        );
    }
}
