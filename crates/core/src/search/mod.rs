//! Prefix-aware beam search.
//!
//! This module provides:
//! - Beam bookkeeping: tiling, expansion, top-k selection, finish marking
//! - The first-step prefix constraint for a partially typed word
//! - Length-normalized scoring and probability pruning
//! - The decode driver and its cancellation token

mod beam;
mod cancel;
mod driver;
mod prefix;
mod score;

pub use beam::{Beam, BeamBatch, Candidate, CandidateSet};
pub use cancel::CancelToken;
pub use driver::{
    PrefixAwareBeamSearcher, ScoredCompletion, SearchOutcome, SearchPhase, TerminationReason,
};
pub use prefix::{is_consistent, PrefixConstraint};
pub use score::{length_normalized_score, prune};

/// Probabilities are clamped to this floor before taking logs.
pub const PROB_FLOOR: f32 = 1e-12;

/// Numerically stable log-softmax.
pub fn log_softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp_sum_ln = logits
        .iter()
        .map(|&x| (x - max_logit).exp())
        .sum::<f32>()
        .ln();
    logits.iter().map(|&x| x - max_logit - exp_sum_ln).collect()
}

/// Log-softmax with every value kept in `[ln(PROB_FLOOR), 0]`.
///
/// Rows of all `-inf` (or containing NaN) come out at the floor instead of
/// NaN, so candidate comparisons stay total. A `+inf` logit takes all the
/// mass: those entries get 0 and everything else the floor.
pub fn clamped_log_softmax(logits: &[f32]) -> Vec<f32> {
    let floor = PROB_FLOOR.ln();
    if logits.contains(&f32::INFINITY) {
        return logits
            .iter()
            .map(|&x| if x == f32::INFINITY { 0.0 } else { floor })
            .collect();
    }
    log_softmax(logits)
        .into_iter()
        .map(|lp| if lp.is_nan() { floor } else { lp.clamp(floor, 0.0) })
        .collect()
}
