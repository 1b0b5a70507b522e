//! Paper-aware maximal marginal relevance selection.
//!
//! Greedy MMR over the reranked candidates:
//! `λ·relevance(p) − (1−λ)·max_sim(p, selected)`, with one refinement:
//! when the top marginal scores are within a small epsilon, a passage
//! from a document not yet represented in the selection wins the tie.
//! This keeps one document from crowding out the rest, which matters
//! most for Compare tasks (their lower λ).

use paperground_core::types::ScoredPassage;
use paperground_retrieval::dense::cosine_similarity;

/// Select an ordered subset of at most `select_size` candidates.
/// Deterministic: greedy order, absolute near-tie rule, id tiebreak.
pub fn select(
    candidates: &[ScoredPassage],
    lambda: f32,
    select_size: usize,
    tie_epsilon: f32,
) -> Vec<ScoredPassage> {
    let mut remaining: Vec<&ScoredPassage> = candidates.iter().collect();
    let mut selected: Vec<ScoredPassage> = Vec::new();

    while selected.len() < select_size && !remaining.is_empty() {
        let marginals: Vec<f32> = remaining
            .iter()
            .map(|c| marginal_relevance(c, &selected, lambda))
            .collect();
        let best = marginals.iter().copied().fold(f32::MIN, f32::max);

        // Near ties prefer an unrepresented document, then the higher
        // score, then the smaller id.
        let mut pick: Option<(usize, bool, f32)> = None;
        for (i, &score) in marginals.iter().enumerate() {
            if score < best - tie_epsilon {
                continue;
            }
            let novel = !selected
                .iter()
                .any(|s| s.passage.doc_id == remaining[i].passage.doc_id);
            let better = match pick {
                None => true,
                Some((j, picked_novel, picked_score)) => match (novel, picked_novel) {
                    (true, false) => true,
                    (false, true) => false,
                    _ => {
                        score > picked_score
                            || (score == picked_score
                                && remaining[i].passage.id < remaining[j].passage.id)
                    }
                },
            };
            if better {
                pick = Some((i, novel, score));
            }
        }

        let Some((idx, _, _)) = pick else { break };
        selected.push(remaining.remove(idx).clone());
    }

    selected
}

fn marginal_relevance(candidate: &ScoredPassage, selected: &[ScoredPassage], lambda: f32) -> f32 {
    let max_sim = selected
        .iter()
        .map(|s| cosine_similarity(&candidate.passage.embedding, &s.passage.embedding))
        .fold(0.0f32, f32::max);
    lambda * candidate.relevance() - (1.0 - lambda) * max_sim
}
