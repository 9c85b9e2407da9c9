//! Prefix-aware text completion.
//!
//! A recurrent step model scores next tokens, and a beam search whose first
//! step is constrained to the partially typed word ranks completions.

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod loader;
pub mod model;
pub mod search;
pub mod tokenizer;
pub mod vocab;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use config::{ModelConfig, NoPrefixMatchPolicy, SearchConfig};
pub use engine::{CompletionEngine, CompletionOutput, CompletionService};
pub use error::{ComposeError, ConfigError, Result};
pub use search::CancelToken;
