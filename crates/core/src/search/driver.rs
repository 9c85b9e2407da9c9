//! Decode loop: `Init → Stepping → Terminated`.

use tracing::{debug, trace};

use super::beam::BeamBatch;
use super::cancel::CancelToken;
use super::prefix::PrefixConstraint;
use super::score::prune;
use crate::config::{NoPrefixMatchPolicy, SearchConfig};
use crate::error::{ComposeError, ConfigError, Result};
use crate::model::StepModel;
use crate::vocab::SpecialTokens;

/// Where a decode call is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Init,
    Stepping { step: usize },
    Terminated(TerminationReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Every surviving beam emitted the separator or hit the length cap.
    AllFinished,
    /// `max_decode_length` steps ran.
    MaxDecodeLength,
    /// Pruning left no candidates.
    Exhausted,
    /// Nothing matched the typed prefix and the policy is `ReturnEmpty`.
    NoPrefixMatch,
}

/// One ranked hypothesis, in token ids.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCompletion {
    /// Decoded tokens; ends with the separator when the beam finished on it.
    pub token_ids: Vec<u32>,
    pub score: f32,
    pub cumulative_log_prob: f32,
    pub is_finished: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub exist_prefix: bool,
    /// Best first.
    pub completions: Vec<ScoredCompletion>,
    /// Number of decode steps taken.
    pub steps: usize,
    pub termination: TerminationReason,
}

impl SearchOutcome {
    fn empty(exist_prefix: bool, steps: usize, termination: TerminationReason) -> Self {
        Self {
            exist_prefix,
            completions: Vec::new(),
            steps,
            termination,
        }
    }
}

/// Beam search whose first token must agree with a partially typed word.
#[derive(Debug, Clone)]
pub struct PrefixAwareBeamSearcher {
    config: SearchConfig,
    vocab_size: usize,
    special: SpecialTokens,
}

impl PrefixAwareBeamSearcher {
    pub fn new(
        config: SearchConfig,
        vocab_size: usize,
        special: SpecialTokens,
    ) -> std::result::Result<Self, ConfigError> {
        if vocab_size == 0 {
            return Err(ConfigError::ZeroVocabSize);
        }
        config.validate()?;
        special.validate(vocab_size)?;
        Ok(Self {
            config,
            vocab_size,
            special,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Decode completions of `context_ids` whose first token is consistent
    /// with `prefix_suffix`. `surfaces[id]` is the text of token `id`.
    pub fn search<M: StepModel>(
        &self,
        model: &M,
        context_ids: &[u32],
        prefix_suffix: &str,
        surfaces: &[String],
        cancel: &CancelToken,
    ) -> Result<SearchOutcome> {
        let beam_width = self.config.beam_width;
        let max_steps = self.config.max_decode_length;
        let power = self.config.length_norm_power;
        let mut phase = SearchPhase::Init;
        trace!(?phase, context_len = context_ids.len(), prefix_suffix, "search start");

        let mut constraint =
            PrefixConstraint::build(prefix_suffix, surfaces, &self.special.ids());
        let exist_prefix = constraint.exist_prefix();
        if !exist_prefix {
            match self.config.no_prefix_match {
                NoPrefixMatchPolicy::ReturnEmpty => {
                    debug!(prefix_suffix, "no vocabulary token matches typed prefix");
                    return Ok(SearchOutcome::empty(
                        false,
                        0,
                        TerminationReason::NoPrefixMatch,
                    ));
                }
                NoPrefixMatchPolicy::Unconstrained => {
                    debug!(prefix_suffix, "no prefix match, decoding unconstrained");
                    constraint = PrefixConstraint::unconstrained();
                }
            }
        }

        let (initial_logits, initial_state) = model.encode_prefix(context_ids)?;
        self.check_width(&initial_logits)?;
        let mut batch = BeamBatch::initialize(initial_state, beam_width);
        let mut logits_per_beam = vec![initial_logits; beam_width];

        let mut steps = 0;
        let termination = loop {
            cancel.check(steps)?;
            phase = SearchPhase::Stepping { step: steps };

            let step_constraint = (steps == 0 && constraint.is_active()).then_some(&constraint);
            let mut candidates = batch.expand(&logits_per_beam, step_constraint)?;
            let expanded = candidates.len();
            let pruned = prune(&mut candidates, self.config.min_seq_prob);
            batch = candidates.select(beam_width);
            steps += 1;

            if batch.is_empty() {
                break TerminationReason::Exhausted;
            }
            let finished = batch.mark_finished(self.special.separator, max_steps, power);
            trace!(
                ?phase,
                expanded,
                pruned,
                beams = batch.len(),
                finished,
                alive = batch.num_alive(),
                "decode step"
            );

            if batch.all_finished() {
                break if steps >= max_steps {
                    TerminationReason::MaxDecodeLength
                } else {
                    TerminationReason::AllFinished
                };
            }
            if steps >= max_steps {
                break TerminationReason::MaxDecodeLength;
            }

            let (indices, tokens, cache) = batch.live_cache();
            let (rows, next_cache) = model.step(&tokens, cache)?;
            if rows.len() != indices.len() {
                return Err(ComposeError::LogitsRowCount {
                    expected: indices.len(),
                    got: rows.len(),
                });
            }
            batch.replace_states(&indices, next_cache)?;

            logits_per_beam = vec![Vec::new(); batch.len()];
            for (&i, row) in indices.iter().zip(rows) {
                self.check_width(&row)?;
                logits_per_beam[i] = row;
            }
        };

        phase = SearchPhase::Terminated(termination);
        let completions: Vec<ScoredCompletion> = batch
            .into_ranked(power)
            .into_iter()
            .map(|(beam, score)| ScoredCompletion {
                token_ids: beam.token_ids,
                score,
                cumulative_log_prob: beam.cumulative_log_prob,
                is_finished: beam.is_finished,
            })
            .collect();
        debug!(
            ?phase,
            steps,
            exist_prefix,
            completions = completions.len(),
            best_score = completions.first().map(|c| c.score),
            "search finished"
        );

        Ok(SearchOutcome {
            exist_prefix,
            completions,
            steps,
            termination,
        })
    }

    fn check_width(&self, row: &[f32]) -> Result<()> {
        if row.len() != self.vocab_size {
            return Err(ComposeError::LogitsWidth {
                expected: self.vocab_size,
                got: row.len(),
            });
        }
        Ok(())
    }
}
