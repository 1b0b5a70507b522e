//! Collaborator seams. The pipeline never talks to a model server or an
//! index directly; it goes through these traits so callers can inject
//! real clients, offline stand-ins, or test doubles.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::ModelError;
use crate::types::{DocumentCorpus, PassageId};

/// Query-time dense embedding. Passage embeddings are precomputed at
/// ingestion with the same embedder.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError>;
}

/// Sparse lexical ranking over the session corpus. Pure and synchronous;
/// the default BM25 implementation lives in paperground-retrieval.
pub trait LexicalScorer: Send + Sync {
    /// Top-k `(passage id, score)` pairs, best first. Higher is better.
    fn score(&self, query: &str, corpus: &DocumentCorpus, k: usize) -> Vec<(PassageId, f32)>;
}

#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub max_tokens: usize,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.2,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Text completion used for query enhancement, reranking and answer
/// synthesis.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str, opts: &CompletionOptions)
        -> Result<String, ModelError>;
}
