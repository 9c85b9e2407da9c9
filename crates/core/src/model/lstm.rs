use candle_core::{DType, Device, Module, Tensor};
use candle_nn::rnn::{LSTMConfig, LSTMState, LSTM, RNN};
use candle_nn::{embedding, linear, Embedding, Linear, VarBuilder};

use super::{DecodeCache, StepModel};
use crate::config::ModelConfig;
use crate::error::{ComposeError, Result};

/// LSTM memory and carry for a single beam, each of shape [1, hidden_size].
#[derive(Debug, Clone)]
pub struct RecurrentState {
    pub memory: Tensor,
    pub carry: Tensor,
}

impl From<LSTMState> for RecurrentState {
    fn from(state: LSTMState) -> Self {
        Self {
            memory: state.h,
            carry: state.c,
        }
    }
}

/// Embedding → single LSTM cell → vocabulary projection.
pub struct LstmStepModel {
    embedding: Embedding,
    cell: LSTM,
    projection: Linear,
    vocab_size: usize,
    embedding_dim: usize,
    hidden_size: usize,
    device: Device,
}

impl LstmStepModel {
    pub fn new(cfg: &ModelConfig, vb: VarBuilder) -> Result<Self> {
        let embedding = embedding(cfg.vocab_size, cfg.embedding_dim, vb.pp("embedding"))?;
        let cell = LSTM::new(
            cfg.embedding_dim,
            cfg.hidden_size,
            LSTMConfig::default(),
            vb.pp("lstm"),
        )?;
        let projection = linear(cfg.hidden_size, cfg.vocab_size, vb.pp("projection"))?;
        Ok(Self {
            embedding,
            cell,
            projection,
            vocab_size: cfg.vocab_size,
            embedding_dim: cfg.embedding_dim,
            hidden_size: cfg.hidden_size,
            device: vb.device().clone(),
        })
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Embedding vectors for `token_ids`, shape [len, embedding_dim].
    pub fn lookup(&self, token_ids: &[u32]) -> Result<Tensor> {
        let ids = Tensor::new(token_ids, &self.device)?;
        Ok(self.embedding.forward(&ids)?)
    }

    fn project(&self, memory: &Tensor) -> Result<Vec<Vec<f32>>> {
        let logits = self.projection.forward(memory)?;
        Ok(logits.to_dtype(DType::F32)?.to_vec2::<f32>()?)
    }
}

impl StepModel for LstmStepModel {
    type State = RecurrentState;

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn encode_prefix(&self, token_ids: &[u32]) -> Result<(Vec<f32>, RecurrentState)> {
        let last = if token_ids.is_empty() {
            self.cell.zero_state(1)?
        } else {
            // [1, seq_len, embedding_dim]
            let embedded = self.lookup(token_ids)?.unsqueeze(0)?;
            let states = self.cell.seq(&embedded)?;
            match states.into_iter().last() {
                Some(state) => state,
                None => self.cell.zero_state(1)?,
            }
        };
        let logits = self
            .project(&last.h)?
            .into_iter()
            .next()
            .ok_or(ComposeError::LogitsRowCount {
                expected: 1,
                got: 0,
            })?;
        Ok((logits, last.into()))
    }

    fn step(
        &self,
        token_ids: &[u32],
        cache: DecodeCache<RecurrentState>,
    ) -> Result<(Vec<Vec<f32>>, DecodeCache<RecurrentState>)> {
        if cache.len() != token_ids.len() {
            return Err(ComposeError::StateCount {
                expected: token_ids.len(),
                got: cache.len(),
            });
        }
        if token_ids.is_empty() {
            return Ok((Vec::new(), DecodeCache::new(Vec::new())));
        }

        let memories: Vec<Tensor> = cache.last_state.iter().map(|s| s.memory.clone()).collect();
        let carries: Vec<Tensor> = cache.last_state.iter().map(|s| s.carry.clone()).collect();
        let batched = LSTMState {
            h: Tensor::cat(&memories, 0)?,
            c: Tensor::cat(&carries, 0)?,
        };

        let embedded = self.lookup(token_ids)?;
        let next = self.cell.step(&embedded, &batched)?;
        let logits = self.project(&next.h)?;

        let mut last_state = Vec::with_capacity(token_ids.len());
        for i in 0..token_ids.len() {
            last_state.push(RecurrentState {
                memory: next.h.narrow(0, i, 1)?.contiguous()?,
                carry: next.c.narrow(0, i, 1)?.contiguous()?,
            });
        }
        Ok((logits, DecodeCache::new(last_state)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::VarMap;

    fn tiny_config() -> ModelConfig {
        ModelConfig {
            vocab_size: 7,
            embedding_dim: 4,
            hidden_size: 6,
            separator_token_id: 5,
            pad_token_id: 6,
            cls_token_id: None,
            ..Default::default()
        }
    }

    fn random_model() -> LstmStepModel {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        LstmStepModel::new(&tiny_config(), vb).expect("build model")
    }

    fn state_values(state: &RecurrentState) -> Vec<f32> {
        state.memory.flatten_all().unwrap().to_vec1().unwrap()
    }

    #[test]
    fn zero_weights_give_uniform_logits() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let model = LstmStepModel::new(&tiny_config(), vb).unwrap();

        let (logits, state) = model.encode_prefix(&[1, 2, 3]).unwrap();
        assert_eq!(logits.len(), 7);
        assert!(logits.iter().all(|&l| l == 0.0));
        assert_eq!(state.memory.dims(), &[1, 6]);
        assert_eq!(state.carry.dims(), &[1, 6]);
    }

    #[test]
    fn encode_empty_prefix_uses_zero_state() {
        let model = random_model();
        let (logits, state) = model.encode_prefix(&[]).unwrap();
        assert_eq!(logits.len(), 7);
        assert!(state_values(&state).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn step_returns_one_row_and_state_per_beam() {
        let model = random_model();
        let (_, state) = model.encode_prefix(&[0, 1]).unwrap();
        let cache = DecodeCache::new(vec![state.clone(), state.clone(), state]);

        let (logits, next) = model.step(&[2, 3, 2], cache).unwrap();
        assert_eq!(logits.len(), 3);
        assert!(logits.iter().all(|row| row.len() == 7));
        assert_eq!(next.len(), 3);
        for s in &next.last_state {
            assert_eq!(s.memory.dims(), &[1, 6]);
        }
    }

    #[test]
    fn beams_evolve_independently() {
        let model = random_model();
        let (_, state) = model.encode_prefix(&[0]).unwrap();
        let cache = DecodeCache::new(vec![state.clone(), state]);

        let (logits, next) = model.step(&[2, 2], cache).unwrap();
        assert_eq!(logits[0], logits[1]);
        assert_eq!(
            state_values(&next.last_state[0]),
            state_values(&next.last_state[1])
        );

        let (_, diverged) = model.step(&[1, 3], next).unwrap();
        assert_ne!(
            state_values(&diverged.last_state[0]),
            state_values(&diverged.last_state[1])
        );
    }

    #[test]
    fn batched_step_matches_single_step() {
        let model = random_model();
        let (_, state) = model.encode_prefix(&[4, 1]).unwrap();

        let (single, _) = model
            .step(&[3], DecodeCache::new(vec![state.clone()]))
            .unwrap();
        let (batched, _) = model
            .step(&[2, 3], DecodeCache::new(vec![state.clone(), state]))
            .unwrap();
        for (a, b) in single[0].iter().zip(batched[1].iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn step_rejects_mismatched_cache() {
        let model = random_model();
        let (_, state) = model.encode_prefix(&[0]).unwrap();
        let err = model
            .step(&[1, 2], DecodeCache::new(vec![state]))
            .unwrap_err();
        assert!(matches!(
            err,
            ComposeError::StateCount {
                expected: 2,
                got: 1
            }
        ));
    }

    #[test]
    fn lookup_shape() {
        let model = random_model();
        let embedded = model.lookup(&[0, 1, 2]).unwrap();
        assert_eq!(embedded.dims(), &[3, 4]);
        assert_eq!(model.embedding_dim(), 4);
        assert_eq!(model.hidden_size(), 6);
    }
}
