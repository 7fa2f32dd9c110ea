//! # sift-embed
//!
//! Embedding and completion providers behind small async traits, so indexing
//! and question answering never depend on a particular model vendor.
//!
//! ## Features
//!
//! - **Async-First Design**: Providers are `async_trait` objects shared as `Arc<dyn ...>`
//! - **OpenAI-Compatible Adapters**: `/embeddings` and `/chat/completions` over `reqwest`
//! - **Bounded Retries**: Rate limits and server errors are retried with exponential backoff
//! - **Offline Embedder**: A deterministic feature-hashing provider for local runs and tests
//! - **Configurable**: Serde configuration with sensible defaults, secrets read from the environment
//!
//! ## Quick Start
//!
//! ```
//! use sift_embed::{EmbedConfig, EmbeddingProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = EmbedConfig::hashing(128).build_provider()?;
//!
//! let texts = vec!["Hello world".to_string(), "How are you?".to_string()];
//! let result = provider.embed_texts(&texts).await?;
//!
//! println!("Generated {} embeddings of dimension {}",
//!          result.len(), result.dimension);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`config`]: Provider selection and settings
//! - [`provider`]: The [`EmbeddingProvider`] trait and [`HashingProvider`]
//! - [`completion`]: The [`CompletionProvider`] trait
//! - [`openai`]: HTTP adapters for OpenAI-compatible servers
//! - [`retry`]: The [`RetryPolicy`] used by the HTTP adapters
//! - [`error`]: Error types and result handling
//!
//! ## Error Handling
//!
//! Embedding operations return [`Result<T>`] using [`EmbedError`]; completions
//! use [`CompletionError`]. Both wrap [`ProviderFailure`] for transport and
//! response-shape problems.

pub mod completion;
pub mod config;
pub mod error;
pub mod openai;
pub mod provider;
pub mod retry;

// Re-export main types for easy access
pub use completion::CompletionProvider;
pub use config::{CompletionConfig, EmbedConfig, OpenAiEmbedConfig};
pub use error::{CompletionError, EmbedError, ProviderFailure, Result};
pub use openai::{OpenAiCompletionProvider, OpenAiEmbeddingProvider};
pub use provider::{EmbeddingProvider, EmbeddingResult, HashingProvider};
pub use retry::RetryPolicy;
