//! Invariants of the decode loop, checked step by step on scripted models.

use compose_core::model::StepModel;
use compose_core::search::{prune, BeamBatch, CancelToken, PrefixAwareBeamSearcher, PrefixConstraint};
use compose_core::testing::ScriptedStepModel;
use compose_core::vocab::SpecialTokens;
use compose_core::SearchConfig;

const VOCAB: usize = 6;
const SEP: u32 = 4;

fn special() -> SpecialTokens {
    SpecialTokens {
        separator: SEP,
        pad: 5,
        cls: None,
    }
}

fn surfaces() -> Vec<String> {
    ["the", "there", "then", "end", "[SEP]", "[PAD]"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// A few hand-written models with different shapes of distribution.
fn models() -> Vec<ScriptedStepModel> {
    vec![
        ScriptedStepModel::new(VOCAB),
        ScriptedStepModel::new(VOCAB)
            .with_initial_probs(&[0.4, 0.3, 0.2, 0.05, 0.05, 0.0])
            .with_transition_probs(0, &[0.1, 0.1, 0.1, 0.2, 0.5, 0.0])
            .with_transition_probs(1, &[0.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
        ScriptedStepModel::new(VOCAB)
            .with_initial_probs(&[0.01, 0.01, 0.01, 0.9, 0.07, 0.0])
            .with_transition_probs(3, &[0.25, 0.25, 0.25, 0.25, 0.0, 0.0])
            .with_transition_probs(2, &[0.0, 0.0, 0.9, 0.0, 0.1, 0.0]),
    ]
}

/// Mirror of the driver loop that checks invariants after every step.
fn run_checked(
    model: &ScriptedStepModel,
    beam_width: usize,
    max_steps: usize,
    min_seq_prob: f32,
    constraint: &PrefixConstraint,
) -> BeamBatch<Vec<u32>> {
    let (initial, state) = model.encode_prefix(&[1, 2]).unwrap();
    let mut batch = BeamBatch::initialize(state, beam_width);
    let mut rows = vec![initial; beam_width];

    for step in 0..max_steps {
        let previous: Vec<(Vec<u32>, f32, bool)> = batch
            .beams()
            .iter()
            .map(|b| (b.token_ids.clone(), b.cumulative_log_prob, b.is_finished))
            .collect();

        let mut candidates = batch
            .expand(&rows, (step == 0).then_some(constraint))
            .unwrap();
        prune(&mut candidates, min_seq_prob);
        let available = candidates.len();
        batch = candidates.select(beam_width);
        assert_eq!(batch.len(), beam_width.min(available), "step {step}");

        batch.mark_finished(SEP, max_steps, 0.0);
        for beam in batch.beams() {
            assert!(beam.cumulative_log_prob <= 0.0);
            assert!(beam.cumulative_log_prob.is_finite());
            let parent = previous
                .iter()
                .find(|(tokens, _, finished)| {
                    let extends = beam.token_ids.len() == tokens.len() + 1
                        && beam.token_ids.starts_with(tokens);
                    let carried = *finished && beam.token_ids == *tokens;
                    extends || carried
                })
                .expect("every beam extends or carries a previous beam");
            assert!(beam.cumulative_log_prob <= parent.1 + 1e-6);
            if parent.2 {
                assert_eq!(beam.token_ids, parent.0, "finished beams are frozen");
            }
            if step == 0 {
                assert!(constraint.allows(beam.token_ids[0]));
            }
        }

        if batch.is_empty() || batch.all_finished() {
            break;
        }
        let (indices, tokens, cache) = batch.live_cache();
        let (next_rows, next_cache) = model.step(&tokens, cache).unwrap();
        batch.replace_states(&indices, next_cache).unwrap();
        rows = vec![Vec::new(); batch.len()];
        for (&i, row) in indices.iter().zip(next_rows) {
            rows[i] = row;
        }
    }
    batch
}

#[test]
fn beam_count_and_scores_hold_across_models() {
    let unconstrained = PrefixConstraint::unconstrained();
    let typed = PrefixConstraint::build("th", &surfaces(), &special().ids());
    for model in models() {
        for beam_width in [1, 2, 3, 5] {
            for min_seq_prob in [0.0, 0.01] {
                run_checked(&model, beam_width, 4, min_seq_prob, &unconstrained);
                run_checked(&model, beam_width, 4, min_seq_prob, &typed);
            }
        }
    }
}

#[test]
fn states_track_decoded_tokens() {
    let model = &models()[1];
    let batch = run_checked(model, 3, 3, 0.0, &PrefixConstraint::unconstrained());
    for beam in batch.beams() {
        // State holds the context plus every token fed back, which excludes
        // the token emitted on the final step.
        let fed = &beam.state[2..];
        assert_eq!(fed, &beam.token_ids[..fed.len()]);
        assert!(beam.token_ids.len() - fed.len() <= 1);
    }
}

#[test]
fn searcher_agrees_with_checked_loop() {
    for model in models() {
        let config = SearchConfig {
            beam_width: 3,
            max_decode_length: 4,
            ..Default::default()
        };
        let searcher = PrefixAwareBeamSearcher::new(config, VOCAB, special()).unwrap();
        let outcome = searcher
            .search(&model, &[1, 2], "th", &surfaces(), &CancelToken::new())
            .unwrap();

        let typed = PrefixConstraint::build("th", &surfaces(), &special().ids());
        let batch = run_checked(&model, 3, 4, 0.0, &typed);
        let mut expected: Vec<Vec<u32>> = batch
            .into_ranked(0.0)
            .into_iter()
            .map(|(b, _)| b.token_ids)
            .collect();
        let mut got: Vec<Vec<u32>> = outcome
            .completions
            .iter()
            .map(|c| c.token_ids.clone())
            .collect();
        expected.sort();
        got.sort();
        assert_eq!(got, expected);
    }
}

#[test]
fn every_completion_respects_typed_prefix() {
    let config = SearchConfig {
        beam_width: 5,
        max_decode_length: 3,
        ..Default::default()
    };
    let searcher = PrefixAwareBeamSearcher::new(config, VOCAB, special()).unwrap();
    for model in models() {
        for typed in ["t", "th", "the", "ther", "there", "e", "en"] {
            let outcome = searcher
                .search(&model, &[], typed, &surfaces(), &CancelToken::new())
                .unwrap();
            assert!(outcome.exist_prefix, "{typed}");
            for completion in &outcome.completions {
                let first = &surfaces()[completion.token_ids[0] as usize];
                assert!(
                    first.starts_with(typed) || typed.starts_with(first.as_str()),
                    "{first} vs {typed}"
                );
            }
        }
    }
}

#[test]
fn length_normalization_shrinks_score_magnitude() {
    let model = &models()[2];
    let mut magnitudes = Vec::new();
    for power in [0.0, 0.5, 1.0, 2.0] {
        let config = SearchConfig {
            beam_width: 1,
            max_decode_length: 3,
            length_norm_power: power,
            ..Default::default()
        };
        let searcher = PrefixAwareBeamSearcher::new(config, VOCAB, special()).unwrap();
        let outcome = searcher
            .search(model, &[], "", &surfaces(), &CancelToken::new())
            .unwrap();
        let best = &outcome.completions[0];
        assert!(best.token_ids.len() > 1);
        magnitudes.push(best.score.abs());
    }
    assert!(magnitudes.windows(2).all(|w| w[1] < w[0]), "{magnitudes:?}");
}
