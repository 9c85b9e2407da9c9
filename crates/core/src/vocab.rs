//! Vocabulary contract consumed by the completion engine and the searcher.

use serde::{Deserialize, Serialize};

use crate::config::{check_token_id, ModelConfig};
use crate::error::{ConfigError, Result};

/// Ids of the special tokens the decoder treats differently from words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialTokens {
    /// Ends a completion.
    pub separator: u32,
    pub pad: u32,
    /// Prepended to every context encoding when present.
    pub cls: Option<u32>,
}

impl SpecialTokens {
    pub fn from_model_config(config: &ModelConfig) -> Self {
        Self {
            separator: config.separator_token_id,
            pad: config.pad_token_id,
            cls: config.cls_token_id,
        }
    }

    pub fn validate(&self, vocab_size: usize) -> std::result::Result<(), ConfigError> {
        check_token_id("separator", self.separator, vocab_size)?;
        check_token_id("pad", self.pad, vocab_size)?;
        if let Some(cls) = self.cls {
            check_token_id("cls", cls, vocab_size)?;
        }
        Ok(())
    }

    /// True for ids that never appear as completion text.
    pub fn is_special(&self, id: u32) -> bool {
        id == self.separator || id == self.pad || Some(id) == self.cls
    }

    pub fn ids(&self) -> Vec<u32> {
        let mut ids = vec![self.separator, self.pad];
        ids.extend(self.cls);
        ids
    }
}

/// Bidirectional token/id mapping plus text encoding.
pub trait Vocabulary: Send + Sync {
    fn vocab_size(&self) -> usize;

    fn id_to_token(&self, id: u32) -> Option<String>;

    fn token_to_id(&self, token: &str) -> Option<u32>;

    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    fn decode(&self, ids: &[u32]) -> Result<String>;

    fn special_tokens(&self) -> SpecialTokens;

    /// Surface string of every id in order; ids without a string map to "".
    fn surface_forms(&self) -> Vec<String> {
        (0..self.vocab_size() as u32)
            .map(|id| self.id_to_token(id).unwrap_or_default())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_tokens_membership() {
        let special = SpecialTokens {
            separator: 4,
            pad: 5,
            cls: Some(6),
        };
        assert!(special.is_special(4));
        assert!(special.is_special(5));
        assert!(special.is_special(6));
        assert!(!special.is_special(0));
        assert_eq!(special.ids(), vec![4, 5, 6]);
    }

    #[test]
    fn special_tokens_validate_range() {
        let special = SpecialTokens {
            separator: 4,
            pad: 5,
            cls: Some(9),
        };
        assert_eq!(
            special.validate(7),
            Err(ConfigError::TokenIdOutOfRange {
                name: "cls",
                id: 9,
                vocab_size: 7
            })
        );
        assert!(special.validate(10).is_ok());
    }
}
