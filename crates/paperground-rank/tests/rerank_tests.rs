use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use paperground_core::error::ModelError;
use paperground_core::retry::RetryPolicy;
use paperground_core::traits::{CompletionOptions, LanguageModel};
use paperground_core::types::{Passage, ScoredPassage};
use paperground_rank::LlmReranker;

struct ScriptedModel {
    response: Result<&'static str, &'static str>,
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(
        &self,
        _prompt: &str,
        _opts: &CompletionOptions,
    ) -> Result<String, ModelError> {
        match self.response {
            Ok(text) => Ok(text.to_string()),
            Err(msg) => Err(ModelError::Transport(msg.to_string())),
        }
    }
}

fn candidate(id: &str, fused: f32) -> ScoredPassage {
    ScoredPassage {
        passage: Arc::new(Passage {
            id: id.to_string(),
            doc_id: id.to_string(),
            doc_title: id.to_string(),
            page: 1,
            text: format!("passage text for {id}"),
            token_count: 4,
            embedding: vec![1.0, 0.0],
            term_counts: HashMap::new(),
        }),
        dense_score: fused,
        sparse_score: 0.0,
        fused_score: fused,
        rerank_score: None,
    }
}

fn policy() -> RetryPolicy {
    RetryPolicy::new(2, Duration::ZERO, Duration::from_secs(1))
}

#[tokio::test]
async fn model_judgment_reorders_candidates() {
    // Retrieval liked "a" best, the judge prefers "c".
    let reranker = LlmReranker::new(
        Arc::new(ScriptedModel {
            response: Ok("1: 3\n2: 6\n3: 9\n"),
        }),
        policy(),
    );
    let candidates = vec![candidate("a", 0.9), candidate("b", 0.8), candidate("c", 0.7)];
    let out = reranker.rerank("query", candidates, 3).await;
    assert!(!out.degraded);
    let ids: Vec<&str> = out.ranked.iter().map(|c| c.passage.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "b", "a"]);
    assert_eq!(out.ranked[0].rerank_score, Some(0.9));
}

#[tokio::test]
async fn failure_falls_back_to_fused_order() {
    let reranker = LlmReranker::new(
        Arc::new(ScriptedModel {
            response: Err("model offline"),
        }),
        policy(),
    );
    let candidates = vec![candidate("a", 0.9), candidate("b", 0.8), candidate("c", 0.7)];
    let out = reranker.rerank("query", candidates, 2).await;
    assert!(out.degraded);
    let ids: Vec<&str> = out.ranked.iter().map(|c| c.passage.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"], "fused order truncated to depth");
}

#[tokio::test]
async fn unparseable_response_degrades() {
    let reranker = LlmReranker::new(
        Arc::new(ScriptedModel {
            response: Ok("I cannot rate these passages."),
        }),
        policy(),
    );
    let candidates = vec![candidate("a", 0.9), candidate("b", 0.8)];
    let out = reranker.rerank("query", candidates, 2).await;
    assert!(out.degraded);
    assert_eq!(out.ranked[0].passage.id, "a");
}

#[tokio::test]
async fn empty_candidate_set_is_a_no_op() {
    let reranker = LlmReranker::new(
        Arc::new(ScriptedModel { response: Ok("") }),
        policy(),
    );
    let out = reranker.rerank("query", Vec::new(), 5).await;
    assert!(out.ranked.is_empty());
    assert_eq!(out.llm_calls, 0);
}
