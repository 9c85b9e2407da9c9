//! Shared test utilities for compose-core.
//!
//! A scripted step model with hand-written next-token distributions, plus a
//! tiny configuration and vocabulary that fit it.

mod mock_model;
mod tiny_config;

pub use mock_model::{probs_to_logits, ScriptedStepModel};
pub use tiny_config::{
    tiny_model_config, tiny_vocab, TINY_CLS, TINY_PAD, TINY_SEP, TINY_TOKENS, TINY_UNK,
};
