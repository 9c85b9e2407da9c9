use super::beam::CandidateSet;

/// `cumulative_log_prob / length^length_norm_power`.
///
/// A power of 0 is the raw log probability. Zero-length sequences divide by 1.
pub fn length_normalized_score(
    cumulative_log_prob: f32,
    length: usize,
    length_norm_power: f32,
) -> f32 {
    if length_norm_power == 0.0 {
        return cumulative_log_prob;
    }
    let length = length.max(1) as f32;
    cumulative_log_prob / length.powf(length_norm_power)
}

/// Drop candidates whose sequence probability is below `min_seq_prob`.
/// Returns the number dropped. `min_seq_prob == 0` keeps everything.
pub fn prune<S: Clone>(candidates: &mut CandidateSet<S>, min_seq_prob: f32) -> usize {
    if min_seq_prob <= 0.0 {
        return 0;
    }
    let before = candidates.len();
    candidates.retain(|c| c.log_prob.exp() >= min_seq_prob);
    before - candidates.len()
}
