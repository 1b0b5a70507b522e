use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use paperground_core::error::{Error, ModelError};
use paperground_core::retry::RetryPolicy;
use paperground_core::traits::{CompletionOptions, LanguageModel};
use paperground_core::types::{Citation, Passage, ScoredPassage, TaskKind};
use paperground_context::{AnswerSynthesizer, ContextAssembler};

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
            Err(msg) => Err(ModelError::Failed(msg.to_string())),
        }
    }
}

fn scored(id: &str, doc: &str, page: u32, text: &str) -> ScoredPassage {
    ScoredPassage {
        passage: Arc::new(Passage {
            id: id.to_string(),
            doc_id: doc.to_string(),
            doc_title: doc.to_string(),
            page,
            text: text.to_string(),
            token_count: text.split_whitespace().count(),
            embedding: Vec::new(),
            term_counts: HashMap::new(),
        }),
        dense_score: 0.9,
        sparse_score: 0.0,
        fused_score: 0.9,
        rerank_score: None,
    }
}

fn synthesizer(response: Result<&'static str, &'static str>) -> AnswerSynthesizer {
    AnswerSynthesizer::new(
        Arc::new(ScriptedModel { response }),
        RetryPolicy::new(2, Duration::ZERO, Duration::from_secs(1)),
    )
}

#[tokio::test]
async fn citations_are_validated_against_the_context() {
    let ctx = ContextAssembler::new(1000).assemble(&[
        scored("attn:1", "Attn", 3, "transformers use self attention"),
        scored("rnn:1", "RNN", 5, "rnns use recurrence"),
    ]);
    // One valid marker, one pointing at a page never selected.
    let s = synthesizer(Ok(
        "Attention weighs tokens against each other [Attn, p.3]. \
         Convolutions differ [CNN, p.9].",
    ));
    let out = s
        .synthesize("how does attention work?", TaskKind::Qa, &ctx)
        .await
        .unwrap();

    assert_eq!(
        out.citations,
        vec![Citation {
            doc_title: "Attn".into(),
            page: 3
        }]
    );
    assert_eq!(out.dropped_citations, 1);
    // The answer text is returned as generated, dangling marker and all.
    assert!(out.answer_text.contains("[CNN, p.9]"));
}

#[tokio::test]
async fn repeated_valid_markers_collapse_to_one_citation() {
    let ctx = ContextAssembler::new(1000)
        .assemble(&[scored("attn:1", "Attn", 3, "self attention")]);
    let s = synthesizer(Ok("First [Attn, p.3]. Again [Attn, p.3]."));
    let out = s.synthesize("q", TaskKind::Qa, &ctx).await.unwrap();
    assert_eq!(out.citations.len(), 1);
    assert_eq!(out.dropped_citations, 0);
}

#[tokio::test]
async fn synthesis_failure_fails_the_request() {
    let ctx = ContextAssembler::new(1000)
        .assemble(&[scored("attn:1", "Attn", 3, "self attention")]);
    let s = synthesizer(Err("model exploded"));
    let out = s.synthesize("q", TaskKind::Qa, &ctx).await;
    assert!(matches!(out, Err(Error::Synthesis(_))));
}
