use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;

use paperground_core::config::PipelineConfig;
use paperground_core::error::{Error, ModelError};
use paperground_core::traits::{CompletionOptions, Embedder, LanguageModel};
use paperground_core::types::{term_tokens, Citation, DocumentCorpus, Passage, StageStatus};
use paperground_pipeline::{cancel_flag, Pipeline};
use paperground_retrieval::sparse::Bm25Scorer;

fn keyword_vec(text: &str) -> Vec<f32> {
    let terms = term_tokens(text);
    let hit = |needle: &str| {
        if terms.iter().any(|t| t == needle) {
            1.0
        } else {
            0.0
        }
    };
    vec![hit("attention"), hit("recurrence"), 0.1]
}

struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn dim(&self) -> usize {
        3
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        Ok(keyword_vec(text))
    }
}

/// Routes each pipeline prompt to a scripted response. Failure toggles
/// let one stage's call be broken at a time.
struct FakeLlm {
    fail_enhance: bool,
    fail_rerank: bool,
    fail_synthesize: bool,
    answer: &'static str,
}

impl FakeLlm {
    fn answering(answer: &'static str) -> Self {
        Self {
            fail_enhance: false,
            fail_rerank: false,
            fail_synthesize: false,
            answer,
        }
    }
}

#[async_trait]
impl LanguageModel for FakeLlm {
    async fn complete(
        &self,
        prompt: &str,
        _opts: &CompletionOptions,
    ) -> Result<String, ModelError> {
        if prompt.starts_with("Restate the question") {
            return if self.fail_enhance {
                Err(ModelError::Transport("enhancer down".into()))
            } else {
                Ok("How is self attention computed?\nWhat does the attention mechanism do?".into())
            };
        }
        if prompt.starts_with("Rate how relevant") {
            return if self.fail_rerank {
                Err(ModelError::Transport("judge down".into()))
            } else {
                // Count the candidates and score them in given order.
                let count = prompt.matches("Passage ").count();
                Ok((1..=count)
                    .map(|i| format!("{i}: {}", 10 - i.min(9)))
                    .collect::<Vec<_>>()
                    .join("\n"))
            };
        }
        if self.fail_synthesize {
            Err(ModelError::Failed("generation refused".into()))
        } else {
            Ok(self.answer.to_string())
        }
    }
}

fn passage(id: &str, doc: &str, page: u32, text: &str) -> Passage {
    let mut term_counts: HashMap<String, u32> = HashMap::new();
    for t in term_tokens(text) {
        *term_counts.entry(t).or_default() += 1;
    }
    Passage {
        id: id.to_string(),
        doc_id: doc.to_string(),
        doc_title: doc.to_string(),
        page,
        text: text.to_string(),
        token_count: text.split_whitespace().count(),
        embedding: keyword_vec(text),
        term_counts,
    }
}

fn two_paper_corpus() -> DocumentCorpus {
    let mut corpus = DocumentCorpus::new();
    corpus.add_passages(vec![
        passage("attn:1", "Attn", 3, "transformers use self attention over all tokens"),
        passage("rnn:1", "RNN", 5, "rnns use recurrence over time steps"),
    ]);
    corpus
}

fn pipeline(model: FakeLlm) -> Pipeline {
    let config = PipelineConfig::default();
    Pipeline::new(
        Arc::new(KeywordEmbedder),
        Arc::new(Bm25Scorer::default()),
        Arc::new(model),
        &config,
    )
}

#[tokio::test]
async fn qa_scenario_cites_the_selected_source() {
    let p = pipeline(FakeLlm::answering(
        "Attention lets every token weigh every other token [Attn, p.3].",
    ));
    let out = p
        .answer(&two_paper_corpus(), "How does attention work?", &cancel_flag())
        .await
        .unwrap();

    assert_eq!(
        out.citations,
        vec![Citation {
            doc_title: "Attn".into(),
            page: 3
        }]
    );
    assert!(!out.citations.contains(&Citation {
        doc_title: "RNN".into(),
        page: 5
    }));
    let stages: Vec<&str> = out.trace.iter().map(|r| r.stage.as_str()).collect();
    assert_eq!(
        stages,
        vec!["classify", "enhance", "retrieve", "rerank", "select", "assemble", "synthesize"]
    );
    assert!(out.summary.llm_calls >= 3, "enhance, rerank, synthesize");
}

#[tokio::test]
async fn empty_corpus_fails_before_synthesis() {
    let p = pipeline(FakeLlm::answering("unused"));
    let failure = p
        .answer(&DocumentCorpus::new(), "How does attention work?", &cancel_flag())
        .await
        .unwrap_err();

    assert!(matches!(failure.error, Error::EmptyCorpus));
    let retrieve = failure
        .trace
        .iter()
        .find(|r| r.stage == "retrieve")
        .expect("retrieve stage traced");
    assert_eq!(retrieve.status, StageStatus::Failed);
    assert!(retrieve.detail.contains("0 candidates"));
    assert!(failure.trace.iter().all(|r| r.stage != "synthesize"));
}

#[tokio::test]
async fn enhancer_failure_degrades_but_still_answers() {
    let mut model = FakeLlm::answering("Self attention compares tokens pairwise [Attn, p.3].");
    model.fail_enhance = true;
    let p = pipeline(model);
    let out = p
        .answer(&two_paper_corpus(), "How does attention work?", &cancel_flag())
        .await
        .unwrap();

    let enhance = out.trace.iter().find(|r| r.stage == "enhance").unwrap();
    assert_eq!(enhance.status, StageStatus::Degraded);
    assert!(!out.citations.is_empty(), "retrieval ran on the original query");
}

#[tokio::test]
async fn rerank_failure_keeps_fused_order() {
    let mut model = FakeLlm::answering("Attention is pairwise token weighting [Attn, p.3].");
    model.fail_rerank = true;
    let p = pipeline(model);
    let out = p
        .answer(&two_paper_corpus(), "How does attention work?", &cancel_flag())
        .await
        .unwrap();

    let rerank = out.trace.iter().find(|r| r.stage == "rerank").unwrap();
    assert_eq!(rerank.status, StageStatus::Degraded);
    assert_eq!(out.citations[0].doc_title, "Attn");
}

#[tokio::test]
async fn synthesis_failure_is_fatal() {
    let mut model = FakeLlm::answering("unused");
    model.fail_synthesize = true;
    let p = pipeline(model);
    let failure = p
        .answer(&two_paper_corpus(), "How does attention work?", &cancel_flag())
        .await
        .unwrap_err();
    assert!(matches!(failure.error, Error::Synthesis(_)));
    let synth = failure.trace.iter().find(|r| r.stage == "synthesize").unwrap();
    assert_eq!(synth.status, StageStatus::Failed);
}

#[tokio::test]
async fn dangling_citation_is_dropped_and_traced() {
    let p = pipeline(FakeLlm::answering(
        "Attention weighs tokens [Attn, p.3]. Recurrence is sequential [Unknown Paper, p.9].",
    ));
    let out = p
        .answer(&two_paper_corpus(), "How does attention work?", &cancel_flag())
        .await
        .unwrap();

    assert_eq!(out.citations.len(), 1);
    assert!(out
        .trace
        .iter()
        .any(|r| r.stage == "synthesize" && r.status == StageStatus::Degraded));
    assert!(out.answer_text.contains("[Unknown Paper, p.9]"));
}

#[tokio::test]
async fn cancellation_stops_at_a_stage_boundary() {
    let p = pipeline(FakeLlm::answering("unused"));
    let cancel = cancel_flag();
    cancel.store(true, Ordering::Relaxed);
    let failure = p
        .answer(&two_paper_corpus(), "How does attention work?", &cancel)
        .await
        .unwrap_err();
    assert!(matches!(failure.error, Error::Cancelled));
    assert!(failure.trace.iter().all(|r| r.stage != "retrieve"));
}

#[tokio::test]
async fn compare_query_selects_from_both_documents() {
    let p = pipeline(FakeLlm::answering(
        "Transformers attend globally [Attn, p.3]; RNNs step through time [RNN, p.5].",
    ));
    let out = p
        .answer(
            &two_paper_corpus(),
            "compare attention versus recurrence models",
            &cancel_flag(),
        )
        .await
        .unwrap();

    let select = out.trace.iter().find(|r| r.stage == "select").unwrap();
    assert!(
        select.detail.contains("2 documents"),
        "compare selection spans both papers: {}",
        select.detail
    );
    assert_eq!(out.citations.len(), 2);
}
