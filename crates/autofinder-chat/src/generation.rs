//! Text generation collaborator.
//!
//! [`TextGenerator`] is the seam the orchestrator calls; the shipped
//! implementation talks to a llama.cpp-compatible server over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use autofinder_core::config::GenerationConfig;
use autofinder_core::error::{AutoFinderError, Result};

/// Sequences that end generation when the model starts a new turn.
pub const STOP_SEQUENCES: &[&str] = &["\nUtilisateur:", "\nUser:", "\n###", "</s>"];

/// `generate(prompt) -> text` with a bounded output size.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a reply for the full prompt. The returned text is trimmed.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Maximum number of tokens produced per call.
    fn max_tokens(&self) -> u32;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    n_predict: u32,
    temperature: f32,
    stop: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: String,
}

// =============================================================================
// LlamaServerGenerator
// =============================================================================

/// Client for the `/completion` endpoint of a llama.cpp server.
pub struct LlamaServerGenerator {
    client: reqwest::Client,
    url: String,
    max_tokens: u32,
    temperature: f32,
}

impl LlamaServerGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AutoFinderError::Generation(format!("http client: {e}")))?;

        Ok(Self {
            client,
            url: format!("{}/completion", config.endpoint.trim_end_matches('/')),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TextGenerator for LlamaServerGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = CompletionRequest {
            prompt,
            n_predict: self.max_tokens,
            temperature: self.temperature,
            stop: STOP_SEQUENCES,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AutoFinderError::Generation(format!("request failed: {e}")))?
            .error_for_status()
            .map_err(|e| AutoFinderError::Generation(format!("server error: {e}")))?;

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AutoFinderError::Generation(format!("invalid response: {e}")))?;

        debug!(chars = completion.content.len(), "Completion received");
        Ok(completion.content.trim().to_string())
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
