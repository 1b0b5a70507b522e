//! The straight-line request pipeline:
//! Classify → Enhance → Retrieve → Rerank → Select → Assemble →
//! Synthesize. No stage re-enters an earlier one; any stage can move the
//! request to the terminal failed state. Cancellation is honored at
//! stage boundaries only, so an in-flight model call is never torn down
//! mid-request.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use paperground_context::{AnswerSynthesizer, ContextAssembler};
use paperground_core::config::PipelineConfig;
use paperground_core::error::Error;
use paperground_core::retry::RetryPolicy;
use paperground_core::traits::{Embedder, LanguageModel, LexicalScorer};
use paperground_core::types::{
    DocumentCorpus, GroundedAnswer, StageStatus, TraceRecord, TraceSummary,
};
use paperground_rank::{mmr, LlmReranker};
use paperground_retrieval::HybridRetriever;

use crate::classify;
use crate::enhance::QueryEnhancer;
use crate::trace::TraceBuilder;

/// Set by the caller to abort between stages.
pub type CancelFlag = Arc<AtomicBool>;

pub fn cancel_flag() -> CancelFlag {
    Arc::new(AtomicBool::new(false))
}

/// A failed request still carries the trace accumulated up to the
/// failing stage.
#[derive(Debug)]
pub struct PipelineFailure {
    pub error: Error,
    pub trace: Vec<TraceRecord>,
    pub summary: TraceSummary,
}

impl std::fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for PipelineFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

pub struct Pipeline {
    enhancer: QueryEnhancer,
    retriever: HybridRetriever,
    reranker: LlmReranker,
    assembler: ContextAssembler,
    synthesizer: AnswerSynthesizer,
    tie_epsilon: f32,
}

impl Pipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        lexical: Arc<dyn LexicalScorer>,
        model: Arc<dyn LanguageModel>,
        config: &PipelineConfig,
    ) -> Self {
        let retry = RetryPolicy::from_config(&config.retry);
        // Enhancement degrades instead of retrying; one attempt is
        // enough before falling back to the original query.
        let enhancer_retry = RetryPolicy::once(retry.timeout());
        Self {
            enhancer: QueryEnhancer::new(
                Arc::clone(&model),
                enhancer_retry,
                config.retrieval.query_variants,
            ),
            retriever: HybridRetriever::new(
                embedder,
                lexical,
                config.retrieval.clone(),
                retry.clone(),
            ),
            reranker: LlmReranker::new(Arc::clone(&model), retry.clone()),
            assembler: ContextAssembler::new(config.context.token_budget),
            synthesizer: AnswerSynthesizer::new(model, retry),
            tie_epsilon: config.selection.tie_epsilon,
        }
    }

    /// Answer `query` over the session corpus. The corpus is read-only
    /// for the duration of the call; no cross-request state is held, so
    /// pipelines for different sessions may run fully in parallel.
    pub async fn answer(
        &self,
        corpus: &DocumentCorpus,
        query: &str,
        cancel: &CancelFlag,
    ) -> Result<GroundedAnswer, PipelineFailure> {
        let mut trace = TraceBuilder::new();

        // Classify: pure, cannot fail the request.
        trace.begin("classify");
        let profile = classify::classify(query);
        trace.complete(format!(
            "task={:?} depth={} lambda={:.2}",
            profile.kind, profile.retrieval_depth, profile.lambda
        ));

        trace = check_cancel(cancel, trace)?;

        // Enhance: degraded on model failure, never fatal.
        trace.begin("enhance");
        let enhanced = self.enhancer.enhance(query).await;
        trace.add_llm_call(enhanced.llm_calls, enhanced.input_tokens, enhanced.output_tokens);
        if enhanced.degraded {
            trace.degrade("paraphrase call failed, original query only");
        } else {
            trace.complete(format!("{} query variants", enhanced.variants.len()));
        }

        trace = check_cancel(cancel, trace)?;

        // Retrieve.
        trace.begin("retrieve");
        let retrieval = match self
            .retriever
            .retrieve(&enhanced.variants, corpus, profile.retrieval_depth)
            .await
        {
            Ok(outcome) => outcome,
            Err(error) => {
                trace.fail("0 candidates");
                return Err(failure(error, trace));
            }
        };
        trace.add_embed_calls(retrieval.embed_calls);
        if retrieval.candidates.is_empty() {
            trace.fail("0 candidates above similarity floor");
            return Err(failure(Error::NoRelevantPassages, trace));
        }
        trace.complete(format!(
            "{} candidates from {} variants",
            retrieval.candidates.len(),
            retrieval.variants_used
        ));

        trace = check_cancel(cancel, trace)?;

        // Rerank: falls back to fused order on failure.
        trace.begin("rerank");
        let reranked = self
            .reranker
            .rerank(query, retrieval.candidates, profile.rerank_depth)
            .await;
        trace.add_llm_call(reranked.llm_calls, reranked.input_tokens, reranked.output_tokens);
        if reranked.degraded {
            trace.degrade(format!(
                "judge unavailable, fused order kept ({} candidates)",
                reranked.ranked.len()
            ));
        } else {
            trace.complete(format!("top {} by model judgment", reranked.ranked.len()));
        }

        trace = check_cancel(cancel, trace)?;

        // Select: paper-aware MMR.
        trace.begin("select");
        let selection = mmr::select(
            &reranked.ranked,
            profile.lambda,
            profile.select_size,
            self.tie_epsilon,
        );
        let doc_spread: HashSet<&str> = selection
            .iter()
            .map(|sp| sp.passage.doc_id.as_str())
            .collect();
        trace.complete(format!(
            "{} passages across {} documents",
            selection.len(),
            doc_spread.len()
        ));

        // Assemble: pure, bounded by the token budget.
        trace.begin("assemble");
        let context = self.assembler.assemble(&selection);
        trace.complete(format!(
            "{} passages, {} tokens",
            context.passages.len(),
            context.used_tokens
        ));
        if context.truncated {
            trace.note(
                "assemble",
                StageStatus::Degraded,
                "oversized passage truncated at token boundary",
            );
        }

        trace = check_cancel(cancel, trace)?;

        // Synthesize: fatal on failure, no placeholder answers.
        trace.begin("synthesize");
        let synthesis = match self
            .synthesizer
            .synthesize(query, profile.kind, &context)
            .await
        {
            Ok(outcome) => outcome,
            Err(error) => {
                trace.add_llm_call(1, 0, 0);
                trace.fail("answer generation failed");
                return Err(failure(error, trace));
            }
        };
        trace.add_llm_call(1, synthesis.input_tokens, synthesis.output_tokens);
        trace.complete(format!("{} citations", synthesis.citations.len()));
        if synthesis.dropped_citations > 0 {
            trace.note(
                "synthesize",
                StageStatus::Degraded,
                format!(
                    "{} citation markers did not resolve to selected passages",
                    synthesis.dropped_citations
                ),
            );
        }

        let (records, summary) = trace.into_parts();
        info!(
            citations = synthesis.citations.len(),
            llm_calls = summary.llm_calls,
            "request complete"
        );
        Ok(GroundedAnswer {
            answer_text: synthesis.answer_text,
            citations: synthesis.citations,
            trace: records,
            summary,
        })
    }
}

fn check_cancel(cancel: &CancelFlag, mut trace: TraceBuilder) -> Result<TraceBuilder, PipelineFailure> {
    if cancel.load(Ordering::Relaxed) {
        trace.note("cancel", StageStatus::Failed, "cancelled by caller");
        return Err(failure(Error::Cancelled, trace));
    }
    Ok(trace)
}

fn failure(error: Error, trace: TraceBuilder) -> PipelineFailure {
    let (records, summary) = trace.into_parts();
    PipelineFailure {
        error,
        trace: records,
        summary,
    }
}
