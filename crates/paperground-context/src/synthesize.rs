//! Citation-grounded answer synthesis.
//!
//! The prompt restricts the model to the assembled evidence block and
//! requires a `[Title, p.N]` marker on every factual claim. Markers are
//! parsed back out of the generation and checked against the selected
//! context; a marker that does not resolve is dropped from the citation
//! list while the answer text is left as generated.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use paperground_core::error::Error;
use paperground_core::retry::RetryPolicy;
use paperground_core::traits::{CompletionOptions, LanguageModel};
use paperground_core::types::{approx_tokens, Citation, SelectedContext, TaskKind};

#[derive(Debug)]
pub struct SynthesisOutcome {
    pub answer_text: String,
    pub citations: Vec<Citation>,
    /// Markers parsed from the answer that pointed outside the selected
    /// context.
    pub dropped_citations: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

pub struct AnswerSynthesizer {
    model: Arc<dyn LanguageModel>,
    retry: RetryPolicy,
}

impl AnswerSynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>, retry: RetryPolicy) -> Self {
        Self { model, retry }
    }

    /// Generate and ground the answer. Synthesis failure after retries
    /// fails the request; an answer without grounding has no value.
    pub async fn synthesize(
        &self,
        query: &str,
        kind: TaskKind,
        context: &SelectedContext,
    ) -> Result<SynthesisOutcome, Error> {
        let prompt = build_prompt(query, kind, context);
        let input_tokens = approx_tokens(&prompt);
        let opts = CompletionOptions {
            max_tokens: 1024,
            temperature: 0.2,
            timeout: self.retry.timeout(),
        };

        let answer_text = self
            .retry
            .run("synthesize", || self.model.complete(&prompt, &opts))
            .await
            .map_err(Error::Synthesis)?;
        let output_tokens = approx_tokens(&answer_text);

        let mut seen = HashSet::new();
        let mut citations: Vec<Citation> = Vec::new();
        let mut dropped_citations = 0usize;
        for citation in parse_citations(&answer_text) {
            if context.contains(&citation.doc_title, citation.page) {
                // Repeated markers for the same passage collapse to one
                // citation; they resolved, so they are not "dropped".
                if seen.insert((citation.doc_title.to_lowercase(), citation.page)) {
                    citations.push(citation);
                }
            } else {
                dropped_citations += 1;
            }
        }

        if dropped_citations > 0 {
            warn!(dropped = dropped_citations, "dropped ungroundable citation markers");
        }
        debug!(citations = citations.len(), "synthesis complete");

        Ok(SynthesisOutcome {
            answer_text,
            citations,
            dropped_citations,
            input_tokens,
            output_tokens,
        })
    }
}

fn build_prompt(query: &str, kind: TaskKind, context: &SelectedContext) -> String {
    format!(
        "You are answering from the provided sources only.\n\
         {style}\n\
         Rules:\n\
         - Use only the passages below; if they do not contain the answer, say so.\n\
         - Mark every factual claim with a citation of the form [Title, p.N]\n\
           matching a source header below exactly.\n\n\
         Sources:\n{sources}\n\
         Question: {query}\n\n\
         Answer:",
        style = kind.style_instruction(),
        sources = context.serialized,
    )
}

/// Parse `[Title, p.N]` markers. Tolerates `p. N` spacing and trailing
/// punctuation inside the page number; anything else inside brackets is
/// ignored.
pub fn parse_citations(text: &str) -> Vec<Citation> {
    let mut citations = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find('[') {
        rest = &rest[start + 1..];
        let Some(end) = rest.find(']') else { break };
        let inner = &rest[..end];
        rest = &rest[end + 1..];

        if let Some(citation) = parse_marker(inner) {
            citations.push(citation);
        }
    }
    citations
}

fn parse_marker(inner: &str) -> Option<Citation> {
    // Split on the last ", p." so titles containing commas survive.
    let idx = inner.rfind(", p.")?;
    let title = inner[..idx].trim();
    let page_part = inner[idx + 4..].trim();
    let digits: String = page_part
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    if title.is_empty() || digits.is_empty() {
        return None;
    }
    let page = digits.parse().ok()?;
    Some(Citation {
        doc_title: title.to_string(),
        page,
    })
}
