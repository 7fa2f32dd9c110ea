//! Exact nearest-neighbour index over chunk embeddings.
//!
//! Vectors live in one flat `Vec<f32>` (row `i` is the embedding of chunk
//! `i`), next to the chunk texts in the same order. The ordinal of a chunk is
//! its position in both sequences, and every mutation keeps the two in
//! lock-step: a batch is fully embedded and validated before anything is
//! appended, and a failed write rolls the in-memory state back.

use crate::error::{IndexError, Result};
use crate::storage::{IndexPaths, chunk_file, vector_file};
use serde::Serialize;
use sift_embed::{EmbedError, EmbeddingProvider};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A chunk of indexed text and its position in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub ordinal: usize,
    pub text: String,
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// Squared Euclidean distance to the query
    pub distance: f32,
    pub chunk: Chunk,
}

/// Brute-force vector index persisted as a `.vectors` / `_chunks.txt` pair.
pub struct VectorIndex {
    paths: IndexPaths,
    embedder: Arc<dyn EmbeddingProvider>,
    /// `None` until the index has been built or loaded
    dimension: Option<usize>,
    vectors: Vec<f32>,
    chunks: Vec<String>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("prefix", &self.paths.prefix())
            .field("embedder", &self.embedder.provider_name())
            .field("dimension", &self.dimension)
            .field("len", &self.chunks.len())
            .finish()
    }
}

impl VectorIndex {
    /// An unloaded index whose artifacts live under `prefix`.
    pub fn new(prefix: impl Into<PathBuf>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            paths: IndexPaths::new(prefix),
            embedder,
            dimension: None,
            vectors: Vec::new(),
            chunks: Vec::new(),
        }
    }

    /// Embed every text, fix the dimension from the first vector, replace the
    /// current contents and persist. Returns the ordinals assigned (`0..n`).
    pub async fn build(&mut self, texts: Vec<String>) -> Result<Range<usize>> {
        if texts.is_empty() {
            return Err(IndexError::EmptyCorpus);
        }
        info!("Building index with {} chunks", texts.len());
        let (dimension, vectors) = self.embed_batch(&texts, None).await?;

        let previous = (
            self.dimension.replace(dimension),
            std::mem::replace(&mut self.vectors, vectors),
            std::mem::replace(&mut self.chunks, texts),
        );
        if let Err(e) = self.save() {
            let had_index = previous.0.is_some();
            (self.dimension, self.vectors, self.chunks) = previous;
            if had_index {
                self.restore_artifacts("rebuild");
            }
            return Err(e);
        }
        Ok(0..self.chunks.len())
    }

    /// Embed and append a batch, then persist. Either the whole batch is
    /// added or nothing is. Returns the ordinals assigned to the batch.
    pub async fn append(&mut self, texts: Vec<String>) -> Result<Range<usize>> {
        let Some(dimension) = self.dimension else {
            return Err(IndexError::NotLoaded);
        };
        let start = self.chunks.len();
        if texts.is_empty() {
            return Ok(start..start);
        }
        info!("Appending {} chunks to index of {}", texts.len(), start);
        let (_, staged) = self.embed_batch(&texts, Some(dimension)).await?;

        let previous_vectors = self.vectors.len();
        self.vectors.extend_from_slice(&staged);
        self.chunks.extend(texts);

        if let Err(e) = self.save() {
            self.vectors.truncate(previous_vectors);
            self.chunks.truncate(start);
            self.restore_artifacts("append");
            return Err(e);
        }
        Ok(start..self.chunks.len())
    }

    /// Embed `texts` and check every vector against `expected` (or against the
    /// first vector when no dimension is fixed yet). Returns the dimension and
    /// the flattened vectors.
    async fn embed_batch(
        &self,
        texts: &[String],
        expected: Option<usize>,
    ) -> Result<(usize, Vec<f32>)> {
        let result = self.embedder.embed_texts(texts).await?;
        if result.len() != texts.len() {
            return Err(EmbedError::invalid_response(format!(
                "{} returned {} embeddings for {} texts",
                self.embedder.provider_name(),
                result.len(),
                texts.len()
            ))
            .into());
        }

        let dimension = match expected.or(result.embeddings.first().map(Vec::len)) {
            Some(0) | None => {
                return Err(EmbedError::invalid_response("embedding vectors are empty").into());
            }
            Some(d) => d,
        };

        let mut flat = Vec::with_capacity(dimension * texts.len());
        for embedding in &result.embeddings {
            if embedding.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: dimension,
                    actual: embedding.len(),
                });
            }
            flat.extend_from_slice(embedding);
        }
        debug!("Embedded {} texts at dimension {}", texts.len(), dimension);
        Ok((dimension, flat))
    }

    /// Write both artifacts. Both are staged before either replaces the file
    /// on disk, so a failed write leaves the previous pair in place. The chunk
    /// file is committed first so that an interrupted first build leaves no
    /// vector file behind.
    pub fn save(&self) -> Result<()> {
        let Some(dimension) = self.dimension else {
            return Err(IndexError::NotLoaded);
        };
        let chunks = chunk_file::stage_chunks(&self.paths.chunks(), &self.chunks)?;
        let vectors =
            vector_file::stage_vectors(&self.paths.vectors(), dimension, &self.vectors)?;
        chunks.commit()?;
        vectors.commit()?;
        debug!(
            "Saved {} vectors to {}",
            self.chunks.len(),
            self.paths.vectors().display()
        );
        Ok(())
    }

    /// Best-effort rewrite of the in-memory state after a failed save, in case
    /// one of the two artifacts was already replaced.
    fn restore_artifacts(&self, operation: &str) {
        if let Err(restore) = self.save() {
            warn!(
                "Could not restore index artifacts at {} after failed {}: {}",
                self.paths.prefix().display(),
                operation,
                restore
            );
        }
    }

    /// Load persisted artifacts, replacing the in-memory contents.
    ///
    /// Returns `Ok(false)` when there is no vector file. A vector file without
    /// its chunk file, or with a different number of entries, is corrupt.
    pub fn load(&mut self) -> Result<bool> {
        let vectors_path = self.paths.vectors();
        let Some(stored) = vector_file::read_vectors(&vectors_path)? else {
            debug!("No index found at {}", vectors_path.display());
            return Ok(false);
        };

        let chunks_path = self.paths.chunks();
        let chunks = chunk_file::read_chunks(&chunks_path)?.ok_or_else(|| {
            IndexError::corrupt(&chunks_path, "chunk file is missing next to vector file")
        })?;
        if chunks.len() != stored.count {
            return Err(IndexError::corrupt(
                &vectors_path,
                format!(
                    "{} vectors but {} chunks in {}",
                    stored.count,
                    chunks.len(),
                    chunks_path.display()
                ),
            ));
        }

        info!(
            "Loaded index with {} chunks (dimension {}) from {}",
            chunks.len(),
            stored.dimension,
            self.paths.prefix().display()
        );
        self.dimension = Some(stored.dimension);
        self.vectors = stored.data;
        self.chunks = chunks;
        Ok(true)
    }

    /// The `k` nearest chunks to `query` by squared Euclidean distance,
    /// nearest first. Equal distances are ordered by ordinal.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let Some(dimension) = self.dimension else {
            return Err(IndexError::NotLoaded);
        };
        if query.len() != dimension {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, usize)> = self
            .vectors
            .chunks_exact(dimension)
            .enumerate()
            .map(|(ordinal, vector)| (squared_distance(query, vector), ordinal))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(distance, ordinal)| SearchHit {
                distance,
                chunk: Chunk {
                    ordinal,
                    text: self.chunks[ordinal].clone(),
                },
            })
            .collect())
    }

    /// Embed `text` and search with the result.
    pub async fn search_text(&self, text: &str, k: usize) -> Result<Vec<SearchHit>> {
        if self.dimension.is_none() {
            return Err(IndexError::NotLoaded);
        }
        let query = self.embedder.embed_text(text).await?;
        self.search(&query, k)
    }

    /// Drop the in-memory contents. Persisted artifacts are left untouched.
    pub fn clear(&mut self) {
        self.dimension = None;
        self.vectors.clear();
        self.chunks.clear();
    }

    pub fn chunk(&self, ordinal: usize) -> Option<Chunk> {
        self.chunks.get(ordinal).map(|text| Chunk {
            ordinal,
            text: text.clone(),
        })
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn is_loaded(&self) -> bool {
        self.dimension.is_some()
    }

    /// Whether a vector artifact exists on disk.
    pub fn exists_on_disk(&self) -> bool {
        self.paths.vectors().exists()
    }

    pub fn prefix(&self) -> &Path {
        self.paths.prefix()
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sift_embed::HashingProvider;
    use std::collections::HashMap;
    use tempfile::tempdir;

    /// Returns fixed vectors for known texts.
    struct TableEmbedder {
        table: HashMap<String, Vec<f32>>,
    }

    impl TableEmbedder {
        fn new(entries: &[(&str, Vec<f32>)]) -> Arc<Self> {
            Arc::new(Self {
                table: entries
                    .iter()
                    .map(|(text, v)| (text.to_string(), v.clone()))
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl EmbeddingProvider for TableEmbedder {
        async fn embed_text(&self, text: &str) -> sift_embed::Result<Vec<f32>> {
            self.table
                .get(text)
                .cloned()
                .ok_or_else(|| EmbedError::invalid_response(format!("unknown text {text}")))
        }

        fn embedding_dimension(&self) -> Option<usize> {
            None
        }

        fn provider_name(&self) -> &str {
            "table"
        }
    }

    fn strings(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn test_search_orders_by_distance_then_ordinal() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let embedder = TableEmbedder::new(&[
            ("far", vec![10.0, 0.0]),
            ("near", vec![1.0, 0.0]),
            ("tie-a", vec![0.0, 2.0]),
            ("tie-b", vec![0.0, -2.0]),
        ]);
        let mut index = VectorIndex::new(dir.path().join("idx"), embedder);
        index
            .build(strings(&["far", "near", "tie-a", "tie-b"]))
            .await?;

        let hits = index.search(&[0.0, 0.0], 3)?;
        let ordinals: Vec<usize> = hits.iter().map(|h| h.chunk.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
        assert_eq!(hits[0].distance, 1.0);
        assert_eq!(hits[1].distance, 4.0);
        assert_eq!(hits[2].distance, 4.0);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));

        assert_eq!(index.search(&[0.0, 0.0], 10)?.len(), 4);
        assert!(index.search(&[0.0, 0.0], 0)?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_not_loaded_and_wrong_query_dimension() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let mut index = VectorIndex::new(
            dir.path().join("idx"),
            Arc::new(HashingProvider::new(8)?),
        );
        assert!(matches!(
            index.search(&[0.0; 8], 1),
            Err(IndexError::NotLoaded)
        ));
        assert!(matches!(
            index.search_text("anything", 1).await,
            Err(IndexError::NotLoaded)
        ));
        assert!(matches!(
            index.append(strings(&["x"])).await,
            Err(IndexError::NotLoaded)
        ));

        index.build(strings(&["alpha beta", "gamma"])).await?;
        assert!(matches!(
            index.search(&[0.0; 3], 1),
            Err(IndexError::DimensionMismatch {
                expected: 8,
                actual: 3
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_build_persists_and_load_restores() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let prefix = dir.path().join("data").join("idx");
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashingProvider::new(16)?);

        let mut index = VectorIndex::new(&prefix, embedder.clone());
        assert!(!index.exists_on_disk());
        let ordinals = index
            .build(strings(&["first chunk", "second chunk", "third chunk"]))
            .await?;
        assert_eq!(ordinals, 0..3);
        assert!(index.exists_on_disk());

        let mut reloaded = VectorIndex::new(&prefix, embedder);
        assert!(reloaded.load()?);
        assert_eq!(reloaded.len(), 3);
        assert_eq!(reloaded.dimension(), Some(16));
        assert_eq!(reloaded.chunks(), index.chunks());

        let hits = reloaded.search_text("second chunk", 1).await?;
        assert_eq!(hits[0].chunk.ordinal, 1);
        assert!(hits[0].distance.abs() < 1e-6);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_without_artifacts_is_false() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let mut index = VectorIndex::new(
            dir.path().join("idx"),
            Arc::new(HashingProvider::default()),
        );
        assert!(!index.load()?);
        assert!(!index.is_loaded());
        Ok(())
    }

    #[tokio::test]
    async fn test_count_mismatch_is_corrupt() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let prefix = dir.path().join("idx");
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashingProvider::new(4)?);

        let mut index = VectorIndex::new(&prefix, embedder.clone());
        index.build(strings(&["one", "two"])).await?;
        std::fs::write(index.paths().chunks(), "one\ntwo\nthree\n")?;

        let mut reloaded = VectorIndex::new(&prefix, embedder.clone());
        assert!(matches!(
            reloaded.load(),
            Err(IndexError::CorruptIndex { .. })
        ));

        std::fs::remove_file(index.paths().chunks())?;
        let mut reloaded = VectorIndex::new(&prefix, embedder);
        assert!(matches!(
            reloaded.load(),
            Err(IndexError::CorruptIndex { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_append_extends_and_keeps_ordinals() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let prefix = dir.path().join("idx");
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashingProvider::new(32)?);

        let mut index = VectorIndex::new(&prefix, embedder.clone());
        index.build(strings(&["alpha", "beta"])).await?;
        let before = index.search_text("beta", 1).await?;

        let added = index.append(strings(&["gamma", "delta"])).await?;
        assert_eq!(added, 2..4);
        assert_eq!(index.append(Vec::new()).await?, 4..4);

        let after = index.search_text("beta", 1).await?;
        assert_eq!(before[0].chunk, after[0].chunk);
        assert_eq!(index.chunk(3).map(|c| c.text), Some("delta".to_string()));

        let mut reloaded = VectorIndex::new(&prefix, embedder);
        assert!(reloaded.load()?);
        assert_eq!(reloaded.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_dimension_drift_leaves_index_unchanged() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let embedder = TableEmbedder::new(&[
            ("a", vec![1.0, 0.0]),
            ("b", vec![0.0, 1.0]),
            ("wide", vec![1.0, 1.0, 1.0]),
            ("ragged-1", vec![1.0, 2.0]),
            ("ragged-2", vec![1.0]),
        ]);
        let mut index = VectorIndex::new(dir.path().join("idx"), embedder);

        assert!(matches!(
            index.build(strings(&["ragged-1", "ragged-2"])).await,
            Err(IndexError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
        assert!(!index.is_loaded());
        assert!(!index.exists_on_disk());

        index.build(strings(&["a", "b"])).await?;
        let bytes_before = std::fs::read(index.paths().vectors())?;

        let err = index.append(strings(&["a", "wide"])).await.unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert_eq!(index.len(), 2);
        assert_eq!(std::fs::read(index.paths().vectors())?, bytes_before);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_save_rolls_back_append() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashingProvider::new(4)?);
        let prefix = dir.path().join("idx");
        let mut index = VectorIndex::new(&prefix, embedder);
        index.build(strings(&["kept"])).await?;

        // A directory where the chunk file should be makes the write fail.
        std::fs::remove_file(index.paths().chunks())?;
        std::fs::create_dir(index.paths().chunks())?;

        assert!(index.append(strings(&["lost"])).await.is_err());
        assert_eq!(index.len(), 1);
        assert_eq!(index.chunks(), &["kept".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_artifacts() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashingProvider::new(4)?);
        let prefix = dir.path().join("idx");
        let mut index = VectorIndex::new(&prefix, embedder.clone());
        index.build(strings(&["one", "two", "three"])).await?;
        let chunk_bytes = std::fs::read(index.paths().chunks())?;
        let vector_bytes = std::fs::read(index.paths().vectors())?;

        vector_file::failpoint::fail_next_write();
        let err = index
            .build(strings(&["a", "b", "c", "d", "e"]))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Io { .. }), "{err}");
        assert_eq!(index.chunks(), strings(&["one", "two", "three"]).as_slice());
        assert_eq!(std::fs::read(index.paths().chunks())?, chunk_bytes);
        assert_eq!(std::fs::read(index.paths().vectors())?, vector_bytes);

        let mut reloaded = VectorIndex::new(&prefix, embedder);
        assert!(reloaded.load()?);
        assert_eq!(reloaded.chunks(), index.chunks());
        Ok(())
    }

    #[tokio::test]
    async fn test_build_empty_and_clear() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let mut index = VectorIndex::new(
            dir.path().join("idx"),
            Arc::new(HashingProvider::default()),
        );
        assert!(matches!(
            index.build(Vec::new()).await,
            Err(IndexError::EmptyCorpus)
        ));

        index.build(strings(&["something"])).await?;
        index.clear();
        assert!(!index.is_loaded());
        assert!(index.is_empty());
        assert!(index.exists_on_disk());
        Ok(())
    }
}
