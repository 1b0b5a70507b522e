#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Hybrid retrieval: per query variant, dense and sparse rankings are
//! produced independently and fused; variants are then merged by taking
//! each passage's best fused score, deduplicated, and floored.

pub mod dense;
pub mod fusion;
pub mod sparse;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use paperground_core::config::RetrievalConfig;
use paperground_core::error::{Error, Result};
use paperground_core::retry::RetryPolicy;
use paperground_core::traits::{Embedder, LexicalScorer};
use paperground_core::types::{DocumentCorpus, ScoredPassage};

use fusion::FusedHit;

/// Candidates plus the telemetry the orchestrator folds into the trace.
#[derive(Debug)]
pub struct RetrievalOutcome {
    pub candidates: Vec<ScoredPassage>,
    pub embed_calls: u32,
    /// Variants that actually contributed rankings; fewer than requested
    /// when a paraphrase embedding fails after retries.
    pub variants_used: usize,
}

pub struct HybridRetriever {
    embedder: Arc<dyn Embedder>,
    lexical: Arc<dyn LexicalScorer>,
    config: RetrievalConfig,
    retry: RetryPolicy,
}

impl HybridRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        lexical: Arc<dyn LexicalScorer>,
        config: RetrievalConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            embedder,
            lexical,
            config,
            retry,
        }
    }

    /// Retrieve the fused top-`depth` for every variant and merge.
    ///
    /// `variants[0]` must be the original query; if its embedding fails
    /// after retries the request fails, while a failing paraphrase is
    /// skipped with a warning.
    pub async fn retrieve(
        &self,
        variants: &[String],
        corpus: &DocumentCorpus,
        depth: usize,
    ) -> Result<RetrievalOutcome> {
        if corpus.is_empty() {
            return Err(Error::EmptyCorpus);
        }

        // A dimension mismatch zeroes every cosine score, leaving only
        // the sparse signal; surface it instead of failing silently.
        let dim = self.embedder.dim();
        if let Some(p) = corpus
            .passages()
            .iter()
            .find(|p| p.embedding.len() != dim)
        {
            warn!(
                passage = %p.id,
                expected = dim,
                actual = p.embedding.len(),
                "passage embedding dimension does not match the embedder"
            );
        }

        let mut merged: HashMap<String, FusedHit> = HashMap::new();
        let mut embed_calls = 0u32;
        let mut variants_used = 0usize;

        for (i, variant) in variants.iter().enumerate() {
            // Dense and sparse rank independently; only the dense side
            // suspends (query embedding), so they are joined here.
            let dense_ranked = async {
                self.retry
                    .run("embed_query", || self.embedder.embed(variant))
                    .await
                    .map(|vec| dense::rank(&vec, corpus, depth))
            };
            let sparse_ranked = async { self.lexical.score(variant, corpus, depth) };
            let (dense_result, sparse_list) = tokio::join!(dense_ranked, sparse_ranked);
            embed_calls += 1;

            let dense_list = match dense_result {
                Ok(list) => list,
                Err(e) if i == 0 => return Err(Error::Embedding(e)),
                Err(e) => {
                    warn!(variant = i, error = %e, "skipping variant, embedding failed");
                    continue;
                }
            };

            let mut fused = fusion::fuse(&dense_list, &sparse_list, self.config.fusion);
            fused.truncate(depth);
            debug!(variant = i, hits = fused.len(), "variant fused");
            variants_used += 1;

            // Cross-variant merge keeps each passage's best fused score.
            for hit in fused {
                match merged.get_mut(&hit.id) {
                    Some(existing) if existing.fused_score >= hit.fused_score => {}
                    Some(existing) => *existing = hit,
                    None => {
                        merged.insert(hit.id.clone(), hit);
                    }
                }
            }
        }

        let floor = self.config.similarity_floor;
        let mut hits: Vec<FusedHit> = merged
            .into_values()
            .filter(|h| h.fused_score >= floor)
            .collect();
        hits.sort_by(|a, b| {
            b.fused_score
                .partial_cmp(&a.fused_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        let candidates = hits
            .into_iter()
            .filter_map(|h| {
                corpus.get(&h.id).map(|p| ScoredPassage {
                    passage: Arc::clone(p),
                    dense_score: h.dense_score,
                    sparse_score: h.sparse_score,
                    fused_score: h.fused_score,
                    rerank_score: None,
                })
            })
            .collect();

        Ok(RetrievalOutcome {
            candidates,
            embed_calls,
            variants_used,
        })
    }
}
