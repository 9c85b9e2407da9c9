use std::path::Path;

use tokenizers::models::wordlevel::WordLevel;
use tokenizers::pre_tokenizers::whitespace::WhitespaceSplit;
use tokenizers::Tokenizer;

use crate::error::{ComposeError, Result};
use crate::vocab::{SpecialTokens, Vocabulary};

/// `tokenizers`-backed vocabulary.
pub struct TokenizerWrapper {
    inner: Tokenizer,
    special: SpecialTokens,
}

impl TokenizerWrapper {
    pub fn from_file(path: &Path, special: SpecialTokens) -> Result<Self> {
        let inner = Tokenizer::from_file(path)
            .map_err(|e| ComposeError::Tokenizer(format!("tokenizer load: {e}")))?;
        Self::new(inner, special)
    }

    pub fn new(inner: Tokenizer, special: SpecialTokens) -> Result<Self> {
        special.validate(inner.get_vocab_size(true))?;
        Ok(Self { inner, special })
    }

    /// Word-level tokenizer over `tokens`, where a token's id is its position.
    /// Words missing from the list encode to `unk_token`, which must be listed.
    pub fn from_tokens(tokens: &[&str], unk_token: &str, special: SpecialTokens) -> Result<Self> {
        let mut vocab = ahash::AHashMap::new();
        for (id, token) in tokens.iter().enumerate() {
            vocab.insert(token.to_string(), id as u32);
        }
        let model = WordLevel::builder()
            .vocab(vocab)
            .unk_token(unk_token.to_string())
            .build()
            .map_err(|e| ComposeError::Tokenizer(format!("word-level model: {e}")))?;
        let mut inner = Tokenizer::new(model);
        inner.with_pre_tokenizer(Some(WhitespaceSplit));
        Self::new(inner, special)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.inner
            .save(path, true)
            .map_err(|e| ComposeError::Tokenizer(format!("tokenizer save: {e}")))
    }
}

impl Vocabulary for TokenizerWrapper {
    fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }

    fn id_to_token(&self, id: u32) -> Option<String> {
        self.inner.id_to_token(id)
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.inner.token_to_id(token)
    }

    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| ComposeError::Tokenizer(format!("encode: {e}")))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, false)
            .map_err(|e| ComposeError::Tokenizer(format!("decode: {e}")))
    }

    fn special_tokens(&self) -> SpecialTokens {
        self.special
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_vocab() -> TokenizerWrapper {
        TokenizerWrapper::from_tokens(
            &["[UNK]", "hello", "there", "world", "[SEP]", "[PAD]"],
            "[UNK]",
            SpecialTokens {
                separator: 4,
                pad: 5,
                cls: None,
            },
        )
        .expect("build tokenizer")
    }

    #[test]
    fn encode_splits_on_whitespace() {
        let tok = small_vocab();
        assert_eq!(tok.encode("hello  world").unwrap(), vec![1, 3]);
    }

    #[test]
    fn encode_unknown_word_maps_to_unk() {
        let tok = small_vocab();
        assert_eq!(tok.encode("hello mars").unwrap(), vec![1, 0]);
    }

    #[test]
    fn decode_joins_tokens() {
        let tok = small_vocab();
        assert_eq!(tok.decode(&[1, 2]).unwrap(), "hello there");
    }

    #[test]
    fn id_token_mapping_is_bidirectional() {
        let tok = small_vocab();
        assert_eq!(tok.vocab_size(), 6);
        assert_eq!(tok.id_to_token(2).as_deref(), Some("there"));
        assert_eq!(tok.token_to_id("world"), Some(3));
        assert_eq!(tok.token_to_id("mars"), None);
        assert_eq!(tok.surface_forms()[4], "[SEP]");
    }

    #[test]
    fn rejects_special_ids_outside_vocab() {
        let result = TokenizerWrapper::from_tokens(
            &["[UNK]", "a"],
            "[UNK]",
            SpecialTokens {
                separator: 7,
                pad: 0,
                cls: None,
            },
        );
        assert!(matches!(result, Err(ComposeError::Config(_))));
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokenizer.json");
        let tok = small_vocab();
        tok.save(&path).unwrap();

        let reloaded = TokenizerWrapper::from_file(&path, tok.special_tokens()).unwrap();
        assert_eq!(reloaded.vocab_size(), 6);
        assert_eq!(reloaded.encode("there world").unwrap(), vec![2, 3]);
    }
}
