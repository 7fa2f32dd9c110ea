//! OpenAI-compatible HTTP adapters for embeddings and chat completions.
//!
//! Both adapters share one [`HttpTransport`]: a `reqwest` client with bearer
//! authentication and a client-level timeout, wrapped in a [`RetryPolicy`].
//! Responses are normalized here, so the rest of the workspace only ever sees
//! `Vec<f32>` embeddings in input order and plain completion text.

use crate::completion::CompletionProvider;
use crate::config::{CompletionConfig, OpenAiEmbedConfig};
use crate::error::{CompletionError, EmbedError, ProviderFailure, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone)]
struct HttpTransport {
    client: Client,
    retry: RetryPolicy,
}

impl HttpTransport {
    fn new(
        api_key: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> std::result::Result<Self, String> {
        if api_key.trim().is_empty() {
            return Err("API key is empty".to_string());
        }
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).map_err(|e| format!("invalid API key: {e}"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self { client, retry })
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> std::result::Result<R, ProviderFailure>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        let client = &self.client;
        self.retry
            .run(
                || async move {
                    let response = client.post(url).json(body).send().await?;
                    let status = response.status();
                    if !status.is_success() {
                        let detail = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "<body unavailable>".to_string());
                        return Err(ProviderFailure::Status {
                            status: status.as_u16(),
                            body: detail,
                        });
                    }
                    let text = response.text().await?;
                    serde_json::from_str::<R>(&text).map_err(|e| {
                        ProviderFailure::invalid_response(format!("unexpected JSON shape: {e}"))
                    })
                },
                ProviderFailure::is_retryable,
            )
            .await
    }
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

fn api_key_from_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|key| !key.trim().is_empty())
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Orders embeddings by their `index` field and checks that exactly one
/// embedding came back for each of the `expected` inputs.
fn normalize_embeddings(
    mut response: EmbeddingResponse,
    expected: usize,
) -> std::result::Result<Vec<Vec<f32>>, ProviderFailure> {
    response.data.sort_by_key(|entry| entry.index);
    if response.data.len() != expected {
        return Err(ProviderFailure::invalid_response(format!(
            "received {} embeddings for {} inputs",
            response.data.len(),
            expected
        )));
    }
    if let Some((position, entry)) = response
        .data
        .iter()
        .enumerate()
        .find(|(position, entry)| entry.index != *position)
    {
        return Err(ProviderFailure::invalid_response(format!(
            "embedding index {} found at position {}",
            entry.index, position
        )));
    }
    Ok(response
        .data
        .into_iter()
        .map(|entry| entry.embedding)
        .collect())
}

/// Embeddings client for OpenAI-compatible `/embeddings` endpoints.
#[derive(Clone)]
pub struct OpenAiEmbeddingProvider {
    transport: HttpTransport,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
    batch_size: usize,
}

impl std::fmt::Debug for OpenAiEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbeddingProvider")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl OpenAiEmbeddingProvider {
    /// Builds a client, reading the API key from the environment variable
    /// named in `config.api_key_env`.
    pub fn from_config(config: &OpenAiEmbedConfig) -> Result<Self> {
        let api_key =
            api_key_from_env(&config.api_key_env).ok_or_else(|| EmbedError::MissingApiKey {
                var: config.api_key_env.clone(),
            })?;
        Self::with_api_key(&api_key, config)
    }

    /// Builds a client with an explicit API key.
    pub fn with_api_key(api_key: &str, config: &OpenAiEmbedConfig) -> Result<Self> {
        if config.model.trim().is_empty() {
            return Err(EmbedError::invalid_config("embedding model name is empty"));
        }
        if config.batch_size == 0 {
            return Err(EmbedError::invalid_config(
                "embedding batch size must be greater than zero",
            ));
        }
        let transport = HttpTransport::new(
            api_key,
            Duration::from_secs(config.timeout_secs),
            config.retry.clone(),
        )
        .map_err(EmbedError::invalid_config)?;

        Ok(Self {
            transport,
            endpoint: endpoint(&config.base_url, "embeddings"),
            model: config.model.clone(),
            dimensions: config.dimensions,
            batch_size: config.batch_size,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let result = self.embed_texts(&[text.to_string()]).await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::invalid_response("no embedding generated for text"))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            tracing::debug!("Requesting {} embeddings from {}", batch.len(), self.endpoint);
            let request = EmbeddingRequest {
                model: &self.model,
                input: batch,
                dimensions: self.dimensions,
            };
            let response: EmbeddingResponse =
                self.transport.post_json(&self.endpoint, &request).await?;
            all_embeddings.extend(normalize_embeddings(response, batch.len())?);
        }

        Ok(EmbeddingResult::new(all_embeddings))
    }

    fn embedding_dimension(&self) -> Option<usize> {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

fn first_choice_text(response: ChatResponse) -> std::result::Result<String, ProviderFailure> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ProviderFailure::invalid_response("completion contained no message text"))
}

/// Chat-completions client for OpenAI-compatible `/chat/completions` endpoints.
///
/// The prompt is sent as a single user message.
#[derive(Clone)]
pub struct OpenAiCompletionProvider {
    transport: HttpTransport,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl std::fmt::Debug for OpenAiCompletionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompletionProvider")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiCompletionProvider {
    /// Builds a client, reading the API key from the environment variable
    /// named in `config.api_key_env`.
    pub fn from_config(config: &CompletionConfig) -> std::result::Result<Self, CompletionError> {
        let api_key = api_key_from_env(&config.api_key_env).ok_or_else(|| {
            CompletionError::MissingApiKey {
                var: config.api_key_env.clone(),
            }
        })?;
        Self::with_api_key(&api_key, config)
    }

    /// Builds a client with an explicit API key.
    pub fn with_api_key(
        api_key: &str,
        config: &CompletionConfig,
    ) -> std::result::Result<Self, CompletionError> {
        if config.model.trim().is_empty() {
            return Err(CompletionError::invalid_config(
                "completion model name is empty",
            ));
        }
        let transport = HttpTransport::new(
            api_key,
            Duration::from_secs(config.timeout_secs),
            config.retry.clone(),
        )
        .map_err(CompletionError::invalid_config)?;

        Ok(Self {
            transport,
            endpoint: endpoint(&config.base_url, "chat/completions"),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletionProvider {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, CompletionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        tracing::debug!(
            "Requesting completion from {} ({} prompt chars)",
            self.endpoint,
            prompt.chars().count()
        );
        let response: ChatResponse = self.transport.post_json(&self.endpoint, &request).await?;
        Ok(first_choice_text(response)?)
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embeddings_are_reordered_by_index() {
        let response: EmbeddingResponse = serde_json::from_str(
            r#"{
                "object": "list",
                "data": [
                    {"object": "embedding", "index": 1, "embedding": [0.5, 0.5]},
                    {"object": "embedding", "index": 0, "embedding": [1.0, 0.0]}
                ],
                "model": "text-embedding-3-large",
                "usage": {"prompt_tokens": 4, "total_tokens": 4}
            }"#,
        )
        .unwrap();

        let embeddings = normalize_embeddings(response, 2).unwrap();
        assert_eq!(embeddings, vec![vec![1.0, 0.0], vec![0.5, 0.5]]);
    }

    #[test]
    fn test_embedding_count_mismatch_is_invalid() {
        let response: EmbeddingResponse =
            serde_json::from_str(r#"{"data": [{"index": 0, "embedding": [1.0]}]}"#).unwrap();

        let err = normalize_embeddings(response, 2).unwrap_err();
        assert!(matches!(err, ProviderFailure::InvalidResponse { .. }));
    }

    #[test]
    fn test_duplicate_embedding_index_is_invalid() {
        let response: EmbeddingResponse = serde_json::from_str(
            r#"{"data": [{"index": 0, "embedding": [1.0]}, {"index": 0, "embedding": [2.0]}]}"#,
        )
        .unwrap();

        assert!(normalize_embeddings(response, 2).is_err());
    }

    #[test]
    fn test_first_choice_text() {
        let response: ChatResponse = serde_json::from_str(
            r#"{
                "id": "chatcmpl-1",
                "choices": [
                    {"index": 0, "message": {"role": "assistant", "content": "Margins improved."}, "finish_reason": "stop"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(first_choice_text(response).unwrap(), "Margins improved.");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(first_choice_text(empty).is_err());

        let null_content: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert!(first_choice_text(null_content).is_err());
    }

    #[test]
    fn test_endpoint_joining() {
        assert_eq!(
            endpoint("https://api.openai.com/v1/", "embeddings"),
            "https://api.openai.com/v1/embeddings"
        );
        assert_eq!(
            endpoint("http://localhost:8080/v1", "chat/completions"),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let input = vec!["alpha".to_string(), "beta".to_string()];
        let request = EmbeddingRequest {
            model: "text-embedding-3-small",
            input: &input,
            dimensions: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"model": "text-embedding-3-small", "input": ["alpha", "beta"]})
        );
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let err = OpenAiEmbeddingProvider::with_api_key("  ", &OpenAiEmbedConfig::default())
            .unwrap_err();
        assert!(matches!(err, EmbedError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn test_provider_metadata() {
        let config = OpenAiEmbedConfig {
            dimensions: Some(256),
            ..OpenAiEmbedConfig::default()
        };
        let provider = OpenAiEmbeddingProvider::with_api_key("sk-test", &config).unwrap();
        assert_eq!(provider.provider_name(), "openai");
        assert_eq!(provider.embedding_dimension(), Some(256));

        // No texts means no request.
        let result = provider.embed_texts(&[]).await.unwrap();
        assert!(result.is_empty());
    }
}
