//! Beam bookkeeping.
//!
//! A [`BeamBatch`] holds the hypotheses of one input, best first. Each step
//! consumes the batch: [`BeamBatch::expand`] turns it into a
//! [`CandidateSet`], and [`CandidateSet::select`] turns the survivors back
//! into a new batch.

use std::cmp::Ordering;

use super::clamped_log_softmax;
use super::prefix::PrefixConstraint;
use super::score::length_normalized_score;
use crate::error::{ComposeError, Result};
use crate::model::DecodeCache;

/// A single completion hypothesis.
#[derive(Debug, Clone)]
pub struct Beam<S> {
    /// Decoded tokens, not including the context.
    pub token_ids: Vec<u32>,
    /// Sum of per-token log probabilities. Never increases.
    pub cumulative_log_prob: f32,
    /// Recurrent state after consuming `token_ids`.
    pub state: S,
    pub is_finished: bool,
    /// Length-normalized score, set when the beam finishes.
    pub finished_score: Option<f32>,
}

impl<S> Beam<S> {
    fn seed(state: S) -> Self {
        Self {
            token_ids: Vec::new(),
            cumulative_log_prob: 0.0,
            state,
            is_finished: false,
            finished_score: None,
        }
    }

    pub fn len(&self) -> usize {
        self.token_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token_ids.is_empty()
    }

    pub fn last_token(&self) -> Option<u32> {
        self.token_ids.last().copied()
    }

    /// `finished_score` once finished, otherwise the score of the beam as it stands.
    pub fn score(&self, length_norm_power: f32) -> f32 {
        self.finished_score.unwrap_or_else(|| {
            length_normalized_score(self.cumulative_log_prob, self.len(), length_norm_power)
        })
    }
}

/// One way to extend a beam.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Index of the beam being extended.
    pub parent: usize,
    /// Appended token; `None` carries a finished beam over unchanged.
    pub token_id: Option<u32>,
    /// Cumulative log probability of the extended sequence.
    pub log_prob: f32,
}

impl Candidate {
    /// Best first: higher log probability, then lower token id (carry-overs
    /// first), then lower parent index.
    fn rank(&self, other: &Self) -> Ordering {
        other
            .log_prob
            .total_cmp(&self.log_prob)
            .then_with(|| self.token_id.cmp(&other.token_id))
            .then_with(|| self.parent.cmp(&other.parent))
    }
}

/// Expansion of a batch, before selection.
#[derive(Debug)]
pub struct CandidateSet<S> {
    parents: Vec<Beam<S>>,
    candidates: Vec<Candidate>,
}

impl<S: Clone> CandidateSet<S> {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Keep only the candidates for which `keep` returns true.
    pub fn retain(&mut self, keep: impl FnMut(&Candidate) -> bool) {
        self.candidates.retain(keep);
    }

    /// Build the next batch from the `k` best candidates.
    pub fn select(self, k: usize) -> BeamBatch<S> {
        let Self {
            parents,
            mut candidates,
        } = self;

        if candidates.len() > k && k > 0 {
            candidates.select_nth_unstable_by(k - 1, Candidate::rank);
        }
        candidates.truncate(k);
        candidates.sort_unstable_by(Candidate::rank);

        let beams = candidates
            .iter()
            .map(|c| {
                let parent = &parents[c.parent];
                match c.token_id {
                    None => parent.clone(),
                    Some(token_id) => {
                        let mut token_ids = Vec::with_capacity(parent.token_ids.len() + 1);
                        token_ids.extend_from_slice(&parent.token_ids);
                        token_ids.push(token_id);
                        Beam {
                            token_ids,
                            cumulative_log_prob: c.log_prob,
                            state: parent.state.clone(),
                            is_finished: false,
                            finished_score: None,
                        }
                    }
                }
            })
            .collect();
        BeamBatch { beams }
    }
}

/// The hypotheses of one input, best first.
#[derive(Debug, Clone)]
pub struct BeamBatch<S> {
    beams: Vec<Beam<S>>,
}

impl<S: Clone> BeamBatch<S> {
    /// Tile `state` into `beam_width` empty beams.
    pub fn initialize(state: S, beam_width: usize) -> Self {
        let beams = (0..beam_width).map(|_| Beam::seed(state.clone())).collect();
        Self { beams }
    }

    pub fn len(&self) -> usize {
        self.beams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beams.is_empty()
    }

    pub fn beams(&self) -> &[Beam<S>] {
        &self.beams
    }

    pub fn all_finished(&self) -> bool {
        self.beams.iter().all(|b| b.is_finished)
    }

    pub fn num_alive(&self) -> usize {
        self.beams.iter().filter(|b| !b.is_finished).count()
    }

    /// Extend every live beam by every legal token.
    ///
    /// `logits_per_beam[i]` holds beam `i`'s next-token logits; rows of
    /// finished beams are ignored. A finished beam yields one carry-over
    /// candidate. Before the first step all beams are copies of the same
    /// seed, so only the first one is expanded.
    pub fn expand(
        self,
        logits_per_beam: &[Vec<f32>],
        constraint: Option<&PrefixConstraint>,
    ) -> Result<CandidateSet<S>> {
        if logits_per_beam.len() != self.beams.len() {
            return Err(ComposeError::LogitsRowCount {
                expected: self.beams.len(),
                got: logits_per_beam.len(),
            });
        }

        let mut candidates = Vec::new();
        for (parent, beam) in self.beams.iter().enumerate() {
            if beam.is_finished {
                candidates.push(Candidate {
                    parent,
                    token_id: None,
                    log_prob: beam.cumulative_log_prob,
                });
                continue;
            }
            if parent > 0 && beam.is_empty() {
                continue;
            }

            let log_probs = clamped_log_softmax(&logits_per_beam[parent]);
            candidates.reserve(log_probs.len());
            for (token_id, &lp) in log_probs.iter().enumerate() {
                let token_id = token_id as u32;
                if constraint.is_some_and(|c| !c.allows(token_id)) {
                    continue;
                }
                candidates.push(Candidate {
                    parent,
                    token_id: Some(token_id),
                    log_prob: beam.cumulative_log_prob + lp,
                });
            }
        }

        Ok(CandidateSet {
            parents: self.beams,
            candidates,
        })
    }

    /// Finish live beams that emitted `separator_id` or reached `max_len`
    /// tokens. Returns how many beams finished.
    pub fn mark_finished(
        &mut self,
        separator_id: u32,
        max_len: usize,
        length_norm_power: f32,
    ) -> usize {
        let mut newly_finished = 0;
        for beam in self.beams.iter_mut().filter(|b| !b.is_finished) {
            if beam.last_token() == Some(separator_id) || beam.len() >= max_len {
                beam.is_finished = true;
                beam.finished_score = Some(length_normalized_score(
                    beam.cumulative_log_prob,
                    beam.len(),
                    length_norm_power,
                ));
                newly_finished += 1;
            }
        }
        newly_finished
    }

    /// Indices, last tokens, and states of the live beams, in batch order.
    pub fn live_cache(&self) -> (Vec<usize>, Vec<u32>, DecodeCache<S>) {
        let mut indices = Vec::new();
        let mut tokens = Vec::new();
        let mut states = Vec::new();
        for (i, beam) in self.beams.iter().enumerate() {
            if beam.is_finished {
                continue;
            }
            if let Some(token) = beam.last_token() {
                indices.push(i);
                tokens.push(token);
                states.push(beam.state.clone());
            }
        }
        (indices, tokens, DecodeCache::new(states))
    }

    /// Install the states returned by a step for the beams at `indices`.
    pub fn replace_states(&mut self, indices: &[usize], cache: DecodeCache<S>) -> Result<()> {
        if cache.len() != indices.len() {
            return Err(ComposeError::StateCount {
                expected: indices.len(),
                got: cache.len(),
            });
        }
        for (&i, state) in indices.iter().zip(cache.last_state) {
            self.beams[i].state = state;
        }
        Ok(())
    }

    /// Beams ordered by score, best first. Equal scores keep batch order.
    pub fn into_ranked(self, length_norm_power: f32) -> Vec<(Beam<S>, f32)> {
        let mut ranked: Vec<(Beam<S>, f32)> = self
            .beams
            .into_iter()
            .map(|b| {
                let score = b.score(length_norm_power);
                (b, score)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}
