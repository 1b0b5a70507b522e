//! Dense scoring: cosine similarity between the query embedding and the
//! precomputed passage embeddings.

use paperground_core::types::{DocumentCorpus, PassageId};

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Top-k passages by cosine similarity, best first. Ties break on
/// passage id so the ranking is a total order.
pub fn rank(query_vec: &[f32], corpus: &DocumentCorpus, k: usize) -> Vec<(PassageId, f32)> {
    let mut scored: Vec<(PassageId, f32)> = corpus
        .passages()
        .iter()
        .map(|p| (p.id.clone(), cosine_similarity(query_vec, &p.embedding)))
        .collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orthogonal_is_zero_identical_is_one() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[0.5, 0.5], &[0.5, 0.5]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mismatched_or_zero_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }
}
