//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use sift_embed::{
    CompletionError, CompletionProvider, EmbedConfig, EmbeddingProvider, EmbeddingResult,
    HashingProvider,
};
use sift_retriever::config::RetrieverConfig;
use sift_retriever::retrieval::corpus::{CorpusEntry, DirectoryCorpus};
use sift_retriever::retrieval::index_manager::IndexManager;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::{TempDir, tempdir};

pub const DIMENSION: usize = 32;

/// Hashing embedder that counts how many texts it was asked to embed.
#[derive(Debug)]
pub struct CountingEmbedder {
    inner: HashingProvider,
    texts: AtomicUsize,
    calls: AtomicUsize,
}

impl CountingEmbedder {
    pub fn new(dimension: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: HashingProvider::new(dimension).expect("non-zero dimension"),
            texts: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn texts_embedded(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.texts.store(0, Ordering::SeqCst);
        self.calls.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    async fn embed_text(&self, text: &str) -> sift_embed::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(1, Ordering::SeqCst);
        self.inner.embed_text(text).await
    }

    async fn embed_texts(&self, texts: &[String]) -> sift_embed::Result<EmbeddingResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        self.inner.embed_texts(texts).await
    }

    fn embedding_dimension(&self) -> Option<usize> {
        self.inner.embedding_dimension()
    }

    fn provider_name(&self) -> &str {
        "counting"
    }
}

/// Completion provider that replays a fixed reply, or fails, and records prompts.
pub struct ScriptedCompletion {
    reply: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply
            .clone()
            .ok_or_else(|| CompletionError::invalid_response("model returned no choices"))
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}

/// A temporary corpus folder plus index directory.
pub struct Workspace {
    pub dir: TempDir,
    pub config: RetrieverConfig,
}

impl Workspace {
    pub fn new() -> anyhow::Result<Self> {
        let dir = tempdir()?;
        std::fs::create_dir(dir.path().join("docs"))?;
        let config = RetrieverConfig::default()
            .with_corpus_folder(dir.path().join("docs"))
            .with_index_dir(dir.path().join("index"))
            .with_chunking(60, 10)
            .with_embedding(EmbedConfig::hashing(DIMENSION));
        Ok(Self { dir, config })
    }

    pub fn write_doc(&self, name: &str, contents: &str) -> anyhow::Result<()> {
        std::fs::write(self.config.corpus.folder.join(name), contents)?;
        Ok(())
    }

    pub fn remove_doc(&self, name: &str) -> anyhow::Result<()> {
        std::fs::remove_file(self.config.corpus.folder.join(name))?;
        Ok(())
    }

    pub fn listing(&self) -> anyhow::Result<Vec<CorpusEntry>> {
        Ok(DirectoryCorpus::new(&self.config.corpus.folder)
            .with_extensions(&self.config.corpus.extensions)
            .list()?)
    }

    pub fn manager(&self, embedder: Arc<dyn EmbeddingProvider>) -> anyhow::Result<IndexManager> {
        Ok(IndexManager::new(&self.config, embedder)?)
    }

    pub fn index_dir(&self) -> &Path {
        self.config
            .index
            .prefix
            .parent()
            .unwrap_or_else(|| self.dir.path())
    }
}
