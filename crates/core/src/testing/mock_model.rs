use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::Result;
use crate::model::{DecodeCache, StepModel};

/// `ln(p)` per entry. Zero probabilities become `-inf`.
pub fn probs_to_logits(probs: &[f32]) -> Vec<f32> {
    probs.iter().map(|p| p.ln()).collect()
}

/// Step model whose next-token distribution depends only on the last token
/// fed. Tokens without a script get uniform logits.
///
/// The state is the list of tokens consumed so far, so tests can check what
/// each beam was fed.
pub struct ScriptedStepModel {
    vocab_size: usize,
    initial: Vec<f32>,
    transitions: HashMap<u32, Vec<f32>>,
    encode_calls: AtomicUsize,
    step_calls: AtomicUsize,
}

impl ScriptedStepModel {
    pub fn new(vocab_size: usize) -> Self {
        Self {
            vocab_size,
            initial: vec![0.0; vocab_size],
            transitions: HashMap::new(),
            encode_calls: AtomicUsize::new(0),
            step_calls: AtomicUsize::new(0),
        }
    }

    /// Distribution of the first decoded token, whatever the context.
    pub fn with_initial_probs(mut self, probs: &[f32]) -> Self {
        self.initial = probs_to_logits(probs);
        self
    }

    /// Distribution of the token following `token`.
    pub fn with_transition_probs(mut self, token: u32, probs: &[f32]) -> Self {
        self.transitions.insert(token, probs_to_logits(probs));
        self
    }

    pub fn encode_calls(&self) -> usize {
        self.encode_calls.load(Ordering::SeqCst)
    }

    pub fn step_calls(&self) -> usize {
        self.step_calls.load(Ordering::SeqCst)
    }

    fn row_after(&self, token: u32) -> Vec<f32> {
        self.transitions
            .get(&token)
            .cloned()
            .unwrap_or_else(|| vec![0.0; self.vocab_size])
    }
}

impl StepModel for ScriptedStepModel {
    type State = Vec<u32>;

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn encode_prefix(&self, token_ids: &[u32]) -> Result<(Vec<f32>, Vec<u32>)> {
        self.encode_calls.fetch_add(1, Ordering::SeqCst);
        Ok((self.initial.clone(), token_ids.to_vec()))
    }

    fn step(
        &self,
        token_ids: &[u32],
        cache: DecodeCache<Vec<u32>>,
    ) -> Result<(Vec<Vec<f32>>, DecodeCache<Vec<u32>>)> {
        self.step_calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = Vec::with_capacity(token_ids.len());
        let mut states = Vec::with_capacity(token_ids.len());
        for (&token, mut history) in token_ids.iter().zip(cache.last_state) {
            history.push(token);
            rows.push(self.row_after(token));
            states.push(history);
        }
        Ok((rows, DecodeCache::new(states)))
    }
}
