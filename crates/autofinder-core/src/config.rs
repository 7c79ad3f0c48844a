use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AutoFinderError, Result};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "AUTOFINDER_CONFIG";
/// Environment override for `generation.max_tokens`.
pub const MAX_TOKENS_ENV: &str = "LLM_MAX_TOKENS";
/// Environment override for `generation.temperature`.
pub const TEMPERATURE_ENV: &str = "LLM_TEMPERATURE";
/// Environment override for `generation.endpoint`.
pub const ENDPOINT_ENV: &str = "LLM_ENDPOINT";

/// Top-level configuration for AutoFinder.
///
/// Loaded from `autofinder.toml` by default. Each section corresponds to a
/// stage of the per-turn pipeline or a cross-cutting concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoFinderConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

impl AutoFinderConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AutoFinderConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply `LLM_*` environment overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup, so callers and tests do not
    /// depend on process-global state.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(MAX_TOKENS_ENV) {
            self.generation.max_tokens = raw.trim().parse().map_err(|_| {
                AutoFinderError::Config(format!("{MAX_TOKENS_ENV} must be an integer, got {raw:?}"))
            })?;
        }
        if let Some(raw) = lookup(TEMPERATURE_ENV) {
            self.generation.temperature = raw.trim().parse().map_err(|_| {
                AutoFinderError::Config(format!("{TEMPERATURE_ENV} must be a number, got {raw:?}"))
            })?;
        }
        if let Some(raw) = lookup(ENDPOINT_ENV) {
            let endpoint = raw.trim();
            if !endpoint.is_empty() {
                self.generation.endpoint = endpoint.to_string();
            }
        }
        Ok(())
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.top_k == 0 {
            return Err(AutoFinderError::Config(
                "retrieval.top_k must be at least 1".to_string(),
            ));
        }
        if self.conversation.history_window == 0 {
            return Err(AutoFinderError::Config(
                "conversation.history_window must be at least 1".to_string(),
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(AutoFinderError::Config(
                "embedding.dimensions must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(AutoFinderError::Config(format!(
                "generation.temperature must be within 0.0..=2.0, got {}",
                self.generation.temperature
            )));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Catalog source and on-disk index location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON catalog file.
    pub path: PathBuf,
    /// Directory holding `index.json` and `catalog.sig`.
    pub index_dir: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("voitures.json"),
            index_dir: PathBuf::from("catalog_index"),
        }
    }
}

/// Embedding backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend: "hash" (built-in, no model files) or "onnx".
    pub provider: String,
    /// Directory containing `model.onnx` and `tokenizer.json` for the onnx backend.
    pub model_dir: PathBuf,
    /// Model name recorded in the persisted index.
    pub model_name: String,
    /// Embedding dimension.
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hash".to_string(),
            model_dir: PathBuf::from("models/all-MiniLM-L6-v2"),
            model_name: "all-MiniLM-L6-v2".to_string(),
            dimensions: 384,
        }
    }
}

/// Retrieval sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Candidates requested from the index per search turn.
    pub top_k: usize,
    /// Maximum vehicles rendered into the prompt.
    pub max_prompt_vehicles: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_prompt_vehicles: 5,
        }
    }
}

/// Conversation bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Most recent turns kept in the effective history.
    pub history_window: usize,
    /// Maximum length of the current user message, in characters.
    pub max_message_chars: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_window: 12,
            max_message_chars: 2000,
        }
    }
}

/// Text generation collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Base URL of a llama.cpp-compatible server.
    pub endpoint: String,
    /// Maximum tokens generated per reply.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080".to_string(),
            max_tokens: 500,
            temperature: 0.4,
            timeout_secs: 120,
        }
    }
}
