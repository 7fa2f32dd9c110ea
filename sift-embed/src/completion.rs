//! Completion provider trait

use crate::error::CompletionError;
use async_trait::async_trait;

/// Trait for language-model providers that turn a prompt into an answer
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a completion for `prompt`
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;
}
