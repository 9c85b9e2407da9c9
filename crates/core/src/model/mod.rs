//! Step function contract between the beam search and a sequence model.
//!
//! The searcher only sees logits and opaque per-beam states, so any
//! recurrent cell (or a cached transformer layer) can sit behind
//! [`StepModel`] without touching the search.

mod lstm;

pub use lstm::{LstmStepModel, RecurrentState};

use crate::error::Result;

/// Hidden states handed to [`StepModel::step`], one per live beam.
///
/// Moved into each step and returned as a fresh value: a step never
/// edits the cache it received.
#[derive(Debug, Clone)]
pub struct DecodeCache<S> {
    pub last_state: Vec<S>,
}

impl<S> DecodeCache<S> {
    pub fn new(last_state: Vec<S>) -> Self {
        Self { last_state }
    }

    pub fn len(&self) -> usize {
        self.last_state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_state.is_empty()
    }
}

pub trait StepModel: Send + Sync {
    /// Per-beam recurrent state. Cloned when a beam forks.
    type State: Clone + Send + Sync;

    fn vocab_size(&self) -> usize;

    /// Run the whole context once, returning the logits for the first
    /// decoded token and the state after the last context token.
    fn encode_prefix(&self, token_ids: &[u32]) -> Result<(Vec<f32>, Self::State)>;

    /// Advance every beam by one token. `token_ids[i]` is fed with
    /// `cache.last_state[i]`; the result has one logit row and one state per input.
    fn step(
        &self,
        token_ids: &[u32],
        cache: DecodeCache<Self::State>,
    ) -> Result<(Vec<Vec<f32>>, DecodeCache<Self::State>)>;
}
