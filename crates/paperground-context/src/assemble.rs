//! Token-budgeted context assembly.
//!
//! Passages are admitted in selection (MMR) order until one would push
//! the running total past the budget; a passage is never split across
//! the boundary. The retained set is then serialized ordered by
//! (document, page) so the evidence block reads like the sources do,
//! which keeps the generator's citations consistent.

use tracing::{debug, warn};

use paperground_core::types::{approx_tokens, ScoredPassage, SelectedContext};

pub struct ContextAssembler {
    budget: usize,
}

impl ContextAssembler {
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }

    pub fn assemble(&self, selection: &[ScoredPassage]) -> SelectedContext {
        let mut retained: Vec<ScoredPassage> = Vec::new();
        let mut used_tokens = 0usize;
        let mut truncated = false;

        for candidate in selection {
            if used_tokens + candidate.passage.token_count > self.budget {
                if retained.is_empty() {
                    // Even the top pick is over budget on its own: keep
                    // a prefix cut at a token boundary.
                    let (clipped, clipped_tokens) =
                        truncate_passage(candidate, self.budget);
                    warn!(
                        id = %candidate.passage.id,
                        tokens = candidate.passage.token_count,
                        budget = self.budget,
                        "truncating oversized passage"
                    );
                    used_tokens = clipped_tokens;
                    retained.push(clipped);
                    truncated = true;
                }
                break;
            }
            used_tokens += candidate.passage.token_count;
            retained.push(candidate.clone());
        }

        // Citation order, not score order.
        retained.sort_by(|a, b| {
            a.passage
                .doc_title
                .cmp(&b.passage.doc_title)
                .then(a.passage.page.cmp(&b.passage.page))
                .then(a.passage.id.cmp(&b.passage.id))
        });

        let serialized = serialize(&retained);
        debug!(
            passages = retained.len(),
            used_tokens, truncated, "context assembled"
        );
        SelectedContext {
            passages: retained,
            serialized,
            used_tokens,
            truncated,
        }
    }
}

/// Clip a passage's text to at most `budget` tokens, cutting on a
/// whitespace token boundary, never mid-word.
fn truncate_passage(candidate: &ScoredPassage, budget: usize) -> (ScoredPassage, usize) {
    // token_count uses the words/0.75 heuristic; invert it for the word
    // allowance so the clipped text stays within budget.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let max_words = (budget as f32 * 0.75) as usize;
    let clipped_text: String = candidate
        .passage
        .text
        .split_whitespace()
        .take(max_words.max(1))
        .collect::<Vec<_>>()
        .join(" ");
    let clipped_tokens = approx_tokens(&clipped_text).min(budget);

    let mut passage = (*candidate.passage).clone();
    passage.text = clipped_text;
    passage.token_count = clipped_tokens;

    let mut clipped = candidate.clone();
    clipped.passage = std::sync::Arc::new(passage);
    (clipped, clipped_tokens)
}

fn serialize(passages: &[ScoredPassage]) -> String {
    let mut out = String::new();
    for sp in passages {
        out.push_str(&format!(
            "[Source: {}, p.{}]\n{}\n\n",
            sp.passage.doc_title, sp.passage.page, sp.passage.text
        ));
    }
    out
}
