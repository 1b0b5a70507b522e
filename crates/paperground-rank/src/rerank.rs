//! Second-pass relevance judgment by the language model.
//!
//! All candidates go into one batched prompt; the model returns one
//! `index: score` line per candidate. Any failure, transport or parse,
//! degrades to the fused retrieval order rather than failing the
//! request.

use std::sync::Arc;

use tracing::{debug, warn};

use paperground_core::retry::RetryPolicy;
use paperground_core::traits::{CompletionOptions, LanguageModel};
use paperground_core::types::{approx_tokens, ScoredPassage};

/// Characters of passage text shown to the judge per candidate. Keeps
/// the batch inside one model call for typical candidate counts.
const EXCERPT_CHARS: usize = 600;

#[derive(Debug)]
pub struct RerankOutcome {
    pub ranked: Vec<ScoredPassage>,
    /// True when the fused order was kept because the model call or its
    /// parse failed.
    pub degraded: bool,
    pub llm_calls: u32,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

pub struct LlmReranker {
    model: Arc<dyn LanguageModel>,
    retry: RetryPolicy,
}

impl LlmReranker {
    pub fn new(model: Arc<dyn LanguageModel>, retry: RetryPolicy) -> Self {
        Self { model, retry }
    }

    /// Rescore `candidates` against `query`, returning the top `depth`.
    pub async fn rerank(
        &self,
        query: &str,
        mut candidates: Vec<ScoredPassage>,
        depth: usize,
    ) -> RerankOutcome {
        if candidates.is_empty() {
            return RerankOutcome {
                ranked: candidates,
                degraded: false,
                llm_calls: 0,
                input_tokens: 0,
                output_tokens: 0,
            };
        }

        let prompt = build_prompt(query, &candidates);
        let input_tokens = approx_tokens(&prompt);
        let opts = CompletionOptions {
            max_tokens: 16 * candidates.len(),
            temperature: 0.0,
            timeout: self.retry.timeout(),
        };

        let response = self
            .retry
            .run("rerank", || self.model.complete(&prompt, &opts))
            .await;

        match response {
            Ok(text) => {
                let output_tokens = approx_tokens(&text);
                let scores = parse_scores(&text, candidates.len());
                if scores.iter().all(Option::is_none) {
                    warn!("reranker response contained no usable scores, keeping fused order");
                    candidates.truncate(depth);
                    return RerankOutcome {
                        ranked: candidates,
                        degraded: true,
                        llm_calls: 1,
                        input_tokens,
                        output_tokens,
                    };
                }
                for (candidate, score) in candidates.iter_mut().zip(&scores) {
                    candidate.rerank_score = *score;
                }
                candidates.sort_by(|a, b| {
                    b.relevance()
                        .partial_cmp(&a.relevance())
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.passage.id.cmp(&b.passage.id))
                });
                candidates.truncate(depth);
                debug!(kept = candidates.len(), "rerank complete");
                RerankOutcome {
                    ranked: candidates,
                    degraded: false,
                    llm_calls: 1,
                    input_tokens,
                    output_tokens,
                }
            }
            Err(e) => {
                warn!(error = %e, "rerank call failed, keeping fused order");
                candidates.truncate(depth);
                RerankOutcome {
                    ranked: candidates,
                    degraded: true,
                    llm_calls: 1,
                    input_tokens,
                    output_tokens: 0,
                }
            }
        }
    }
}

fn build_prompt(query: &str, candidates: &[ScoredPassage]) -> String {
    let mut prompt = format!(
        "Rate how relevant each passage is to the question on a 0-10 scale.\n\
         Question: {query}\n\n\
         Respond with one line per passage, formatted exactly as `<number>: <score>`,\n\
         nothing else.\n\n"
    );
    for (i, candidate) in candidates.iter().enumerate() {
        let excerpt: String = candidate.passage.text.chars().take(EXCERPT_CHARS).collect();
        prompt.push_str(&format!(
            "Passage {} (from \"{}\", p.{}): {}\n\n",
            i + 1,
            candidate.passage.doc_title,
            candidate.passage.page,
            excerpt
        ));
    }
    prompt
}

/// Parse `index: score` lines into per-candidate scores normalized to
/// [0, 1]. Indexes are 1-based; out-of-range or garbled lines are
/// ignored.
fn parse_scores(text: &str, count: usize) -> Vec<Option<f32>> {
    let mut scores = vec![None; count];
    for line in text.lines() {
        let Some((idx_part, score_part)) = line.split_once(':') else {
            continue;
        };
        let idx_digits: String = idx_part.chars().filter(char::is_ascii_digit).collect();
        let Ok(idx) = idx_digits.parse::<usize>() else {
            continue;
        };
        if idx == 0 || idx > count {
            continue;
        }
        let Ok(raw) = score_part.trim().trim_end_matches(|c: char| !c.is_ascii_digit() && c != '.').parse::<f32>() else {
            continue;
        };
        scores[idx - 1] = Some((raw / 10.0).clamp(0.0, 1.0));
    }
    scores
}
