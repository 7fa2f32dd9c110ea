//! Orchestration of incremental indexing and question answering.
//!
//! [`IndexManager`] ties the pieces together:
//!
//! ```text
//! listing → ChangeTracker → TextExtractor → ChunkingStrategy → VectorIndex → ledger
//!                                                                  ↓
//!                            question → embed → search → prompt → CompletionProvider
//! ```
//!
//! Only new or modified documents are extracted, chunked and embedded. Their
//! fingerprints are committed strictly after the index artifacts have been
//! written, so an interrupted run is repeated rather than skipped.
//!
//! Chunks of a modified or deleted document stay in the index after an
//! incremental update; [`IndexManager::rebuild`] compacts them away.

use super::change_tracker::{ChangeTracker, ChangedDocument};
use super::chunking_strategy::ChunkingStrategy;
use super::corpus::{CorpusEntry, PlainTextExtractor, TextExtractor};
use super::prompt::build_prompt;
use super::vector_index::{SearchHit, VectorIndex};
use crate::config::{AnswerConfig, RetrieverConfig};
use crate::error::{IndexError, Result};
use serde::Serialize;
use sift_embed::{CompletionError, CompletionProvider, EmbeddingProvider};
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What a [`IndexManager::build_or_update`] or [`IndexManager::rebuild`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildOutcome {
    /// Nothing changed; the persisted index was loaded as-is
    Unchanged,
    /// A new index was written from scratch
    Built,
    /// Chunks of changed documents were appended to the existing index
    Appended,
}

/// Summary of an indexing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub outcome: BuildOutcome,
    /// Ids of new or modified documents that were processed
    pub changed_documents: Vec<String>,
    /// Ids in the ledger that are no longer listed
    pub missing_documents: Vec<String>,
    /// Ordinals assigned to the chunks written by this run
    pub added: Range<usize>,
    /// Chunks in the index after the run
    pub total_chunks: usize,
}

impl BuildReport {
    pub fn chunks_added(&self) -> usize {
        self.added.len()
    }
}

/// Snapshot of the index state, for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStatus {
    pub loaded: bool,
    pub exists_on_disk: bool,
    pub chunk_count: usize,
    pub dimension: Option<usize>,
    pub tracked_documents: usize,
    pub vectors_path: PathBuf,
    pub chunks_path: PathBuf,
    pub ledger_path: PathBuf,
    pub embedding_provider: String,
    pub completion_provider: Option<String>,
}

/// Owns the change tracker and vector index for one corpus.
pub struct IndexManager {
    tracker: ChangeTracker,
    index: VectorIndex,
    chunking: ChunkingStrategy,
    extractor: Arc<dyn TextExtractor>,
    completion: Option<Arc<dyn CompletionProvider>>,
    answer: AnswerConfig,
}

impl std::fmt::Debug for IndexManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexManager")
            .field("tracker", &self.tracker)
            .field("index", &self.index)
            .field("chunking", &self.chunking)
            .field(
                "completion",
                &self.completion.as_ref().map(|c| c.provider_name()),
            )
            .field("answer", &self.answer)
            .finish()
    }
}

impl IndexManager {
    /// Create a manager for the index and ledger named in `config`.
    ///
    /// Nothing is loaded yet; the ledger is read eagerly so that a malformed
    /// ledger is reported up front. Text is extracted with
    /// [`PlainTextExtractor`] unless [`with_extractor`](Self::with_extractor)
    /// is used.
    pub fn new(config: &RetrieverConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        Ok(Self {
            tracker: ChangeTracker::open(&config.index.ledger)?,
            index: VectorIndex::new(&config.index.prefix, embedder),
            chunking: ChunkingStrategy::new(&config.chunking)?,
            extractor: Arc::new(PlainTextExtractor),
            completion: None,
            answer: config.answer.clone(),
        })
    }

    /// Use `completion` to answer questions.
    pub fn with_completion(mut self, completion: Arc<dyn CompletionProvider>) -> Self {
        self.completion = Some(completion);
        self
    }

    /// Use `extractor` to turn documents into text.
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Bring the index up to date with `listing`.
    ///
    /// - No changes and an index on disk: the index is loaded, nothing is embedded.
    /// - No index yet: every changed document is chunked and a new index is built.
    /// - Otherwise the chunks of changed documents are appended.
    ///
    /// A ledger without an index (for example after the artifacts were deleted)
    /// is discarded and every listed document is reprocessed. An index without
    /// a ledger is rebuilt rather than appended to, so no chunk is stored twice.
    pub async fn build_or_update(&mut self, listing: &[CorpusEntry]) -> Result<BuildReport> {
        let start_time = Instant::now();
        info!("Checking {} documents for changes", listing.len());

        if !self.index.is_loaded() {
            self.index.load()?;
        }
        if !self.index.is_loaded() && !self.tracker.is_empty() {
            warn!(
                "Ledger {} lists {} documents but no index exists at {}; reprocessing everything",
                self.tracker.ledger_path().display(),
                self.tracker.len(),
                self.index.prefix().display()
            );
            self.tracker.reset();
        }

        let missing_documents = self.tracker.missing(listing);
        for id in &missing_documents {
            warn!("{} is no longer in the corpus; its chunks remain until rebuild", id);
        }

        let changed = self.tracker.detect_changes(listing)?;
        if changed.is_empty() && self.index.is_loaded() {
            info!(
                "No new or modified documents; using existing index of {} chunks",
                self.index.len()
            );
            return Ok(BuildReport {
                outcome: BuildOutcome::Unchanged,
                changed_documents: Vec::new(),
                missing_documents,
                added: self.index.len()..self.index.len(),
                total_chunks: self.index.len(),
            });
        }

        let untracked =
            self.index.is_loaded() && self.tracker.is_empty() && !self.index.is_empty();
        if untracked {
            warn!(
                "Index at {} holds {} chunks but ledger {} is empty; rebuilding instead of appending",
                self.index.prefix().display(),
                self.index.len(),
                self.tracker.ledger_path().display()
            );
        }

        info!("Processing {} new or modified documents", changed.len());
        let texts = self.chunk_documents(&changed).await?;

        let (outcome, added) = if self.index.is_loaded() && !untracked {
            (BuildOutcome::Appended, self.index.append(texts).await?)
        } else {
            (BuildOutcome::Built, self.index.build(texts).await?)
        };
        if self.index.is_empty() {
            return Err(IndexError::EmptyCorpus);
        }

        let changed_documents = commit_all(&mut self.tracker, changed)?;

        info!(
            "Index {:?}: {} chunks added, {} total, took {:?}",
            outcome,
            added.len(),
            self.index.len(),
            start_time.elapsed()
        );
        Ok(BuildReport {
            outcome,
            changed_documents,
            missing_documents,
            added,
            total_chunks: self.index.len(),
        })
    }

    /// Rebuild the index from every document in `listing`, dropping chunks of
    /// modified or removed documents. The previous index and ledger stay in
    /// place until the new index has been written.
    pub async fn rebuild(&mut self, listing: &[CorpusEntry]) -> Result<BuildReport> {
        let start_time = Instant::now();
        info!("Rebuilding index from {} documents", listing.len());

        let mut fresh = self.tracker.emptied();
        let changed = fresh.detect_changes(listing)?;
        let texts = self.chunk_documents(&changed).await?;
        let added = self.index.build(texts).await?;

        let changed_documents = commit_all(&mut fresh, changed)?;
        self.tracker = fresh;

        info!(
            "Rebuilt index with {} chunks in {:?}",
            self.index.len(),
            start_time.elapsed()
        );
        Ok(BuildReport {
            outcome: BuildOutcome::Built,
            changed_documents,
            missing_documents: Vec::new(),
            added,
            total_chunks: self.index.len(),
        })
    }

    /// Open the persisted index for queries. Returns `false` when no index has
    /// been built yet.
    pub fn load(&mut self) -> Result<bool> {
        self.index.load()
    }

    /// The `k` chunks nearest to `query`.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        self.index.search_text(query, k).await
    }

    /// Answer `question` from the `k` most relevant chunks.
    ///
    /// Completion errors are returned as they are; nothing is retried or
    /// cached at this level.
    pub async fn answer(&self, question: &str, k: usize) -> Result<String> {
        let completion = self.completion.as_ref().ok_or_else(|| {
            IndexError::Completion(CompletionError::invalid_config(
                "no completion provider configured",
            ))
        })?;

        let hits = self.retrieve(question, k).await?;
        let prompt = build_prompt(
            &self.answer.instructions,
            question,
            &hits,
            self.answer.max_context_chars,
        );
        debug!(
            "Prompt built from {} chunks ({} chars)",
            hits.len(),
            prompt.chars().count()
        );

        Ok(completion.complete(&prompt).await?)
    }

    pub fn status(&self) -> IndexStatus {
        IndexStatus {
            loaded: self.index.is_loaded(),
            exists_on_disk: self.index.exists_on_disk(),
            chunk_count: self.index.len(),
            dimension: self.index.dimension(),
            tracked_documents: self.tracker.len(),
            vectors_path: self.index.paths().vectors(),
            chunks_path: self.index.paths().chunks(),
            ledger_path: self.tracker.ledger_path().to_path_buf(),
            embedding_provider: self.index.embedder().provider_name().to_string(),
            completion_provider: self
                .completion
                .as_ref()
                .map(|c| c.provider_name().to_string()),
        }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    pub fn default_top_k(&self) -> usize {
        self.answer.top_k
    }

    /// Extract and chunk `documents`, returning chunk texts in document order.
    async fn chunk_documents(&self, documents: &[ChangedDocument]) -> Result<Vec<String>> {
        let mut texts = Vec::new();
        for doc in documents {
            let text = self.extractor.extract(&doc.path).await?;
            let chunks = self.chunking.chunk_document(&doc.document_id, &text);
            if chunks.is_empty() {
                debug!("{} produced no text", doc.document_id);
            }
            texts.extend(chunks.into_iter().map(|c| c.text));
        }
        Ok(texts)
    }
}

/// Record the fingerprints of `changed` and persist the ledger.
fn commit_all(tracker: &mut ChangeTracker, changed: Vec<ChangedDocument>) -> Result<Vec<String>> {
    let mut ids = Vec::with_capacity(changed.len());
    for doc in changed {
        tracker.commit(doc.document_id.clone(), doc.fingerprint);
        ids.push(doc.document_id);
    }
    tracker.save()?;
    Ok(ids)
}
