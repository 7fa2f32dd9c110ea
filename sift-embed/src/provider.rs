//! Embedding provider trait and the offline hashing provider

use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use fnv::FnvHasher;
use std::hash::Hasher;

/// Result of embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text
    pub embeddings: Vec<Vec<f32>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result.
    ///
    /// The dimension is inferred from the first embedding vector. If the
    /// embeddings vector is empty, dimension defaults to 0.
    pub fn new(embeddings: Vec<Vec<f32>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    /// Returns the number of embedding vectors in this result.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns `true` if this result contains no embedding vectors.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Trait for embedding providers that can generate embeddings from text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch processing).
    ///
    /// The default implementation embeds one text at a time. Output order
    /// matches input order.
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed_text(text).await?);
        }
        Ok(EmbeddingResult::new(embeddings))
    }

    /// Get the dimension of embeddings produced by this provider, when it is
    /// known before the first call
    fn embedding_dimension(&self) -> Option<usize>;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;
}

/// Deterministic, offline embedding provider based on feature hashing.
///
/// Each lowercase alphanumeric token is hashed with FNV-1a into one of
/// `dimension` buckets, with the sign taken from the top hash bit. The
/// resulting vector is L2-normalized. Identical texts always map to identical
/// vectors, and texts sharing vocabulary land close together, which is enough
/// for local runs and tests without network access.
#[derive(Debug, Clone)]
pub struct HashingProvider {
    dimension: usize,
}

impl HashingProvider {
    /// Default number of hash buckets
    pub const DEFAULT_DIMENSION: usize = 256;

    /// Creates a provider producing vectors with `dimension` components.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(EmbedError::invalid_config(
                "hashing provider dimension must be greater than zero",
            ));
        }
        Ok(Self { dimension })
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = FnvHasher::default();
            for c in token.chars().flat_map(char::to_lowercase) {
                let mut buf = [0u8; 4];
                hasher.write(c.encode_utf8(&mut buf).as_bytes());
            }
            let hash = hasher.finish();
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Default for HashingProvider {
    fn default() -> Self {
        Self {
            dimension: Self::DEFAULT_DIMENSION,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        tracing::debug!("Hashing {} texts into {} buckets", texts.len(), self.dimension);
        Ok(EmbeddingResult::new(
            texts.iter().map(|t| self.embed_sync(t)).collect(),
        ))
    }

    fn embedding_dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }

    fn provider_name(&self) -> &str {
        "hashing"
    }
}
