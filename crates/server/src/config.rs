//! Configuration persistence for the completion server.
//!
//! Configuration is loaded with the following priority:
//! 1. CLI arguments (highest priority)
//! 2. Config file (~/.config/compose-server/config.toml)
//! 3. Default values (lowest priority)

use std::fs;
use std::path::{Path, PathBuf};

use compose_core::{NoPrefixMatchPolicy, SearchConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Persistent configuration stored in TOML format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Local model directory or HuggingFace Hub id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Compute device: "cpu", "cuda", or "metal".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub beam_width: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub length_norm_power: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_decode_length: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_seq_prob: Option<f32>,

    /// What to do when no token matches the partially typed word.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_prefix_match: Option<NoPrefixMatchPolicy>,

    /// Per-request decode deadline in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,

    /// Comma-separated list of allowed CORS origins. "*" allows all origins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_origins: Option<String>,
}

impl ServerConfig {
    /// Get the default config file path.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("compose-server").join("config.toml"))
    }

    /// Load configuration from the default path, or defaults if absent.
    pub fn load() -> Self {
        Self::default_path()
            .and_then(|path| Self::load_from(&path).ok())
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<PathBuf, ConfigFileError> {
        let path = Self::default_path().ok_or(ConfigFileError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Merge with another config, preferring values from `other`.
    pub fn merge(&mut self, other: &ServerConfig) {
        fn take<T: Clone>(slot: &mut Option<T>, other: &Option<T>) {
            if other.is_some() {
                slot.clone_from(other);
            }
        }
        take(&mut self.model, &other.model);
        take(&mut self.port, &other.port);
        take(&mut self.host, &other.host);
        take(&mut self.device, &other.device);
        take(&mut self.beam_width, &other.beam_width);
        take(&mut self.length_norm_power, &other.length_norm_power);
        take(&mut self.max_decode_length, &other.max_decode_length);
        take(&mut self.min_seq_prob, &other.min_seq_prob);
        take(&mut self.no_prefix_match, &other.no_prefix_match);
        take(&mut self.request_timeout_ms, &other.request_timeout_ms);
        take(&mut self.allowed_origins, &other.allowed_origins);
    }

    /// Search settings, falling back to [`SearchConfig::default`] per field.
    pub fn search_config(&self) -> SearchConfig {
        let defaults = SearchConfig::default();
        SearchConfig {
            beam_width: self.beam_width.unwrap_or(defaults.beam_width),
            length_norm_power: self.length_norm_power.unwrap_or(defaults.length_norm_power),
            max_decode_length: self.max_decode_length.unwrap_or(defaults.max_decode_length),
            min_seq_prob: self.min_seq_prob.unwrap_or(defaults.min_seq_prob),
            no_prefix_match: self.no_prefix_match.unwrap_or(defaults.no_prefix_match),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("No config directory available")]
    NoConfigDir,
}
