use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{ModelConfig, SearchConfig};
use crate::engine::CompletionEngine;
use crate::model::LstmStepModel;
use crate::tokenizer::TokenizerWrapper;
use crate::vocab::SpecialTokens;

pub const CONFIG_FILE: &str = "config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const WEIGHTS_FILE: &str = "model.safetensors";
pub const WEIGHTS_INDEX_FILE: &str = "model.safetensors.index.json";

/// Everything needed to build a [`CompletionEngine`].
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: ModelConfig,
    pub weights: Vec<PathBuf>,
    pub tokenizer: PathBuf,
}

/// Reads a local model directory.
pub fn load_from_dir(dir: &Path) -> anyhow::Result<ModelFiles> {
    let config = read_config(&dir.join(CONFIG_FILE))?;

    let tokenizer = dir.join(TOKENIZER_FILE);
    if !tokenizer.is_file() {
        anyhow::bail!("missing {} in {}", TOKENIZER_FILE, dir.display());
    }

    let single = dir.join(WEIGHTS_FILE);
    let weights = if single.is_file() {
        vec![single]
    } else {
        let index = dir.join(WEIGHTS_INDEX_FILE);
        if !index.is_file() {
            anyhow::bail!(
                "no {} or {} in {}",
                WEIGHTS_FILE,
                WEIGHTS_INDEX_FILE,
                dir.display()
            );
        }
        shard_names(&index)?
            .into_iter()
            .map(|name| dir.join(name))
            .collect()
    };

    Ok(ModelFiles {
        config,
        weights,
        tokenizer,
    })
}

/// Downloads model files from HuggingFace Hub (or uses cache).
pub fn fetch_model(model_id: &str) -> anyhow::Result<ModelFiles> {
    let api = Api::new()?;
    let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

    let config = read_config(&repo.get(CONFIG_FILE)?)?;
    let tokenizer = repo.get(TOKENIZER_FILE)?;

    let weights = match repo.get(WEIGHTS_FILE) {
        Ok(path) => vec![path],
        Err(_) => {
            let index = repo.get(WEIGHTS_INDEX_FILE)?;
            let mut paths = Vec::new();
            for name in shard_names(&index)? {
                paths.push(repo.get(&name)?);
            }
            paths
        }
    };

    Ok(ModelFiles {
        config,
        weights,
        tokenizer,
    })
}

/// Creates a VarBuilder from safetensor weight files.
pub fn load_weights(
    paths: &[PathBuf],
    dtype: DType,
    device: &Device,
) -> anyhow::Result<VarBuilder<'static>> {
    let vb = unsafe { VarBuilder::from_mmaped_safetensors(paths, dtype, device)? };
    Ok(vb)
}

/// Builds the LSTM model, tokenizer, and searcher described by `files`.
pub fn load_engine(
    files: &ModelFiles,
    search: SearchConfig,
    device: &Device,
) -> anyhow::Result<CompletionEngine<LstmStepModel, TokenizerWrapper>> {
    let vb = load_weights(&files.weights, DType::F32, device)?;
    let model = LstmStepModel::new(&files.config, vb)?;
    let vocab = TokenizerWrapper::from_file(
        &files.tokenizer,
        SpecialTokens::from_model_config(&files.config),
    )?;
    let engine = CompletionEngine::new(model, vocab, files.config.clone(), search)?;
    info!(
        shards = files.weights.len(),
        hidden_size = files.config.hidden_size,
        embedding_dim = files.config.embedding_dim,
        "model loaded"
    );
    Ok(engine)
}

fn read_config(path: &Path) -> anyhow::Result<ModelConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
    let config: ModelConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Shard file names listed in a safetensors index, in shard order.
fn shard_names(index_path: &Path) -> anyhow::Result<Vec<String>> {
    let index: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(index_path)?)?;
    let weight_map = index["weight_map"]
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("missing weight_map in index"))?;

    let mut names: Vec<String> = weight_map
        .values()
        .filter_map(|v| v.as_str().map(String::from))
        .collect();
    names.sort_by_key(|a| natural_sort_key(a));
    names.dedup();
    Ok(names)
}

/// Splits a file name into text and number runs so "shard-2" sorts before "shard-10".
fn natural_sort_key(s: &str) -> Vec<Result<u64, String>> {
    let basename = Path::new(s)
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(s);
    let mut parts = Vec::new();
    let mut chars = basename.chars().peekable();
    while let Some(&first) = chars.peek() {
        let digits = first.is_ascii_digit();
        let mut run = String::new();
        while let Some(c) = chars.next_if(|c| c.is_ascii_digit() == digits) {
            run.push(c);
        }
        if digits {
            parts.push(Ok(run.parse::<u64>().unwrap_or(u64::MAX)));
        } else {
            parts.push(Err(run));
        }
    }
    parts
}
