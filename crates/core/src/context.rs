//! Turning raw user input into the searcher's inputs.

use crate::config::ModelConfig;
use crate::error::Result;
use crate::vocab::Vocabulary;

/// Split `text` into the finished context and the partially typed last word.
///
/// Text that is empty or ends in whitespace has no partial word. The context
/// keeps its trailing whitespace, so `context + partial == text`.
pub fn split_partial_token(text: &str) -> (&str, &str) {
    match text.char_indices().rev().find(|(_, c)| c.is_whitespace()) {
        Some((idx, c)) => text.split_at(idx + c.len_utf8()),
        None => ("", text),
    }
}

/// Inference pads short contexts to this many ids, whatever the model was
/// trained with.
pub const INFERENCE_MIN_LEN: usize = 1;

/// Context encoding with the model's cls, truncation, and padding rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextEncoder {
    pub cls: Option<u32>,
    pub pad: u32,
    pub min_len: usize,
    pub max_len: usize,
}

impl ContextEncoder {
    pub fn from_model_config(config: &ModelConfig) -> Self {
        Self {
            cls: config.cls_token_id,
            pad: config.pad_token_id,
            min_len: INFERENCE_MIN_LEN.min(config.max_len),
            max_len: config.max_len,
        }
    }

    /// `[cls]?` followed by the most recent ids of `context`, at most
    /// `max_len` ids in total and right-padded with `pad` to `min_len`.
    pub fn encode<V: Vocabulary + ?Sized>(&self, vocab: &V, context: &str) -> Result<Vec<u32>> {
        let body = vocab.encode(context)?;
        Ok(self.assemble(&body))
    }

    fn assemble(&self, body: &[u32]) -> Vec<u32> {
        let mut ids = Vec::with_capacity(self.max_len.max(self.min_len));
        ids.extend(self.cls);
        let room = self.max_len.saturating_sub(ids.len());
        let start = body.len().saturating_sub(room);
        ids.extend_from_slice(&body[start..]);
        ids.truncate(self.max_len);
        if ids.len() < self.min_len {
            ids.resize(self.min_len, self.pad);
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{tiny_model_config, tiny_vocab, TINY_CLS, TINY_PAD};

    fn encoder(cls: Option<u32>, min_len: usize, max_len: usize) -> ContextEncoder {
        ContextEncoder {
            cls,
            pad: TINY_PAD,
            min_len,
            max_len,
        }
    }

    #[test]
    fn split_takes_text_after_last_whitespace() {
        assert_eq!(split_partial_token("hello th"), ("hello ", "th"));
        assert_eq!(split_partial_token("a b\tcd"), ("a b\t", "cd"));
        assert_eq!(split_partial_token("th"), ("", "th"));
    }

    #[test]
    fn split_without_partial_word() {
        assert_eq!(split_partial_token(""), ("", ""));
        assert_eq!(split_partial_token("hello "), ("hello ", ""));
    }

    #[test]
    fn split_handles_multibyte_whitespace() {
        let text = "hello\u{3000}wor";
        assert_eq!(split_partial_token(text), ("hello\u{3000}", "wor"));
    }

    #[test]
    fn encode_prepends_cls() {
        let ids = encoder(Some(TINY_CLS), 1, 8)
            .encode(&tiny_vocab(), "hello world ")
            .unwrap();
        assert_eq!(ids, vec![TINY_CLS, 4, 9]);
    }

    #[test]
    fn encode_keeps_most_recent_ids() {
        let vocab = tiny_vocab();
        let ids = encoder(Some(TINY_CLS), 1, 3)
            .encode(&vocab, "hello the end world")
            .unwrap();
        assert_eq!(ids, vec![TINY_CLS, 8, 9]);

        let ids = encoder(None, 1, 2)
            .encode(&vocab, "hello the end world")
            .unwrap();
        assert_eq!(ids, vec![8, 9]);
    }

    #[test]
    fn encode_pads_empty_context() {
        let ids = encoder(None, 1, 4).encode(&tiny_vocab(), "").unwrap();
        assert_eq!(ids, vec![TINY_PAD]);

        let ids = encoder(Some(TINY_CLS), 3, 4)
            .encode(&tiny_vocab(), "end")
            .unwrap();
        assert_eq!(ids, vec![TINY_CLS, 8, TINY_PAD]);
    }

    #[test]
    fn inference_ignores_training_min_len() {
        let config = ModelConfig {
            min_len: 5,
            ..tiny_model_config()
        };
        let encoder = ContextEncoder::from_model_config(&config);
        assert_eq!(encoder.min_len, INFERENCE_MIN_LEN);
        let ids = encoder.encode(&tiny_vocab(), "end ").unwrap();
        assert_eq!(ids, vec![TINY_CLS, 8]);
    }
}
