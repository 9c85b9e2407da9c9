use crate::config::ModelConfig;
use crate::tokenizer::TokenizerWrapper;
use crate::vocab::SpecialTokens;

pub const TINY_TOKENS: [&str; 10] = [
    "[PAD]", "[UNK]", "[CLS]", "[SEP]", "hello", "the", "there", "then", "end", "world",
];
pub const TINY_PAD: u32 = 0;
pub const TINY_UNK: u32 = 1;
pub const TINY_CLS: u32 = 2;
pub const TINY_SEP: u32 = 3;

/// Config matching [`tiny_vocab`]: 10 tokens, 8-wide embeddings and state.
pub fn tiny_model_config() -> ModelConfig {
    ModelConfig {
        vocab_size: TINY_TOKENS.len(),
        embedding_dim: 8,
        hidden_size: 8,
        separator_token_id: TINY_SEP,
        pad_token_id: TINY_PAD,
        cls_token_id: Some(TINY_CLS),
        min_len: 1,
        max_len: 6,
        extra: serde_json::Map::new(),
    }
}

/// Word-level vocabulary over [`TINY_TOKENS`].
pub fn tiny_vocab() -> TokenizerWrapper {
    let config = tiny_model_config();
    TokenizerWrapper::from_tokens(
        &TINY_TOKENS,
        TINY_TOKENS[TINY_UNK as usize],
        SpecialTokens::from_model_config(&config),
    )
    .expect("tiny vocabulary is valid")
}
