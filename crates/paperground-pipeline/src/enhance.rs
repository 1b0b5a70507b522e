//! Query enhancement: lexically diverse paraphrases to lift recall on
//! both retrieval indexes.
//!
//! Best-effort by design. If the model call fails the pipeline continues
//! with the original query alone; only the recall improvement is lost.

use std::sync::Arc;

use tracing::{debug, warn};

use paperground_core::retry::RetryPolicy;
use paperground_core::traits::{CompletionOptions, LanguageModel};
use paperground_core::types::approx_tokens;

#[derive(Debug)]
pub struct EnhanceOutcome {
    /// Original query first, then up to N paraphrases.
    pub variants: Vec<String>,
    pub degraded: bool,
    pub llm_calls: u32,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

pub struct QueryEnhancer {
    model: Arc<dyn LanguageModel>,
    retry: RetryPolicy,
    paraphrases: usize,
}

impl QueryEnhancer {
    pub fn new(model: Arc<dyn LanguageModel>, retry: RetryPolicy, paraphrases: usize) -> Self {
        Self {
            model,
            retry,
            paraphrases,
        }
    }

    pub async fn enhance(&self, query: &str) -> EnhanceOutcome {
        if self.paraphrases == 0 {
            return EnhanceOutcome {
                variants: vec![query.to_string()],
                degraded: false,
                llm_calls: 0,
                input_tokens: 0,
                output_tokens: 0,
            };
        }

        let prompt = build_prompt(query, self.paraphrases);
        let input_tokens = approx_tokens(&prompt);
        let opts = CompletionOptions {
            max_tokens: 64 * self.paraphrases,
            temperature: 0.7,
            timeout: self.retry.timeout(),
        };

        match self
            .retry
            .run("enhance", || self.model.complete(&prompt, &opts))
            .await
        {
            Ok(text) => {
                let output_tokens = approx_tokens(&text);
                let mut variants = vec![query.to_string()];
                for line in text.lines() {
                    let cleaned = clean_variant(line);
                    if cleaned.is_empty() {
                        continue;
                    }
                    if variants.iter().any(|v| v.eq_ignore_ascii_case(&cleaned)) {
                        continue;
                    }
                    variants.push(cleaned);
                    if variants.len() > self.paraphrases {
                        break;
                    }
                }
                debug!(variants = variants.len(), "query enhanced");
                EnhanceOutcome {
                    variants,
                    degraded: false,
                    llm_calls: 1,
                    input_tokens,
                    output_tokens,
                }
            }
            Err(e) => {
                warn!(error = %e, "enhancement failed, using original query only");
                EnhanceOutcome {
                    variants: vec![query.to_string()],
                    degraded: true,
                    llm_calls: 1,
                    input_tokens,
                    output_tokens: 0,
                }
            }
        }
    }
}

fn build_prompt(query: &str, n: usize) -> String {
    format!(
        "Restate the question below in {n} lexically different ways that keep\n\
         its meaning. Use technical synonyms where they exist. Output one\n\
         restatement per line, nothing else.\n\n\
         Question: {query}"
    )
}

/// Strip list numbering, bullets and surrounding quotes from one line.
fn clean_variant(line: &str) -> String {
    line.trim()
        .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')' || c == '-')
        .trim()
        .trim_matches('"')
        .trim()
        .to_string()
}
