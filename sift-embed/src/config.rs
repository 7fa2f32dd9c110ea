//! Configuration for embedding and completion providers
//!
//! Configurations are plain serde structs so they can be embedded in a larger
//! TOML or JSON configuration file. Secrets are never stored: the OpenAI
//! adapters read their API key from the environment variable named in
//! `api_key_env` when the provider is built.

use crate::completion::CompletionProvider;
use crate::error::{CompletionError, Result};
use crate::openai::{OpenAiCompletionProvider, OpenAiEmbeddingProvider};
use crate::provider::{EmbeddingProvider, HashingProvider};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-large";
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";

/// Which embedding provider to use and how to reach it.
///
/// In TOML this is selected with a `provider` key:
///
/// ```toml
/// [embedding]
/// provider = "openai"
/// model = "text-embedding-3-small"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum EmbedConfig {
    /// Offline feature-hashing embedder
    Hashing {
        #[serde(default = "default_hashing_dimension")]
        dimension: usize,
    },
    /// OpenAI-compatible `/embeddings` endpoint
    #[serde(rename = "openai")]
    OpenAi(OpenAiEmbedConfig),
}

fn default_hashing_dimension() -> usize {
    HashingProvider::DEFAULT_DIMENSION
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self::OpenAi(OpenAiEmbedConfig::default())
    }
}

impl EmbedConfig {
    /// Offline hashing embedder with the given dimension
    pub fn hashing(dimension: usize) -> Self {
        Self::Hashing { dimension }
    }

    /// Builds the configured provider.
    pub fn build_provider(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        match self {
            Self::Hashing { dimension } => {
                tracing::info!("Using hashing embedder with {} dimensions", dimension);
                Ok(Arc::new(HashingProvider::new(*dimension)?))
            }
            Self::OpenAi(config) => {
                tracing::info!(
                    "Using OpenAI-compatible embeddings: {} at {}",
                    config.model,
                    config.base_url
                );
                Ok(Arc::new(OpenAiEmbeddingProvider::from_config(config)?))
            }
        }
    }
}

/// Settings for an OpenAI-compatible embeddings endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiEmbedConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// Requested output dimension, for models that support shortening
    pub dimensions: Option<usize>,
    /// Maximum number of inputs per request
    pub batch_size: usize,
    /// Client-level request timeout
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for OpenAiEmbedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            dimensions: None,
            batch_size: 64,
            timeout_secs: 60,
            retry: RetryPolicy::default(),
        }
    }
}

impl OpenAiEmbedConfig {
    /// Set the model name (builder style)
    pub fn with_model(self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self
        }
    }

    /// Set the base URL, e.g. a local OpenAI-compatible server (builder style)
    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..self
        }
    }

    /// Set the batch size (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }
}

/// Settings for an OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Client-level request timeout
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_COMPLETION_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            temperature: 0.7,
            max_tokens: 500,
            timeout_secs: 120,
            retry: RetryPolicy::default(),
        }
    }
}

impl CompletionConfig {
    /// Set the model name (builder style)
    pub fn with_model(self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self
        }
    }

    /// Set the sampling temperature (builder style)
    pub fn with_temperature(self, temperature: f32) -> Self {
        Self {
            temperature,
            ..self
        }
    }

    /// Builds the configured provider.
    pub fn build_provider(
        &self,
    ) -> std::result::Result<Arc<dyn CompletionProvider>, CompletionError> {
        tracing::info!(
            "Using OpenAI-compatible completions: {} at {}",
            self.model,
            self.base_url
        );
        Ok(Arc::new(OpenAiCompletionProvider::from_config(self)?))
    }
}
