//! Fusing the dense and sparse rankings for one query variant.
//!
//! Two schemes, both config-selectable: a weighted linear combination of
//! min-max normalized scores, and reciprocal-rank fusion
//! (score = Σ 1/(k + rank)). Either way the fused score is normalized to
//! [0, 1] so the similarity floor means the same thing under both.

use std::collections::HashMap;

use paperground_core::config::FusionScheme;
use paperground_core::types::PassageId;

/// One passage's scores after fusing the two rankings of a variant.
#[derive(Debug, Clone)]
pub struct FusedHit {
    pub id: PassageId,
    pub dense_score: f32,
    pub sparse_score: f32,
    pub fused_score: f32,
}

/// Fuse the dense and sparse rankings (both best-first). The result is
/// sorted by fused score descending, ties broken by passage id, so the
/// output order is total and reproducible.
pub fn fuse(
    dense: &[(PassageId, f32)],
    sparse: &[(PassageId, f32)],
    scheme: FusionScheme,
) -> Vec<FusedHit> {
    let mut hits: HashMap<&str, FusedHit> = HashMap::new();
    for (id, score) in dense {
        hits.entry(id.as_str()).or_insert_with(|| blank(id)).dense_score = *score;
    }
    for (id, score) in sparse {
        hits.entry(id.as_str()).or_insert_with(|| blank(id)).sparse_score = *score;
    }

    match scheme {
        FusionScheme::Linear { dense_weight } => {
            let dense_norm = minmax(dense);
            let sparse_norm = minmax(sparse);
            for hit in hits.values_mut() {
                let d = dense_norm.get(hit.id.as_str()).copied().unwrap_or(0.0);
                let s = sparse_norm.get(hit.id.as_str()).copied().unwrap_or(0.0);
                hit.fused_score = dense_weight * d + (1.0 - dense_weight) * s;
            }
        }
        FusionScheme::ReciprocalRank { k } => {
            #[allow(clippy::cast_precision_loss)]
            let k = k as f32;
            // Best reachable score: rank 1 in both lists.
            let ceiling = 2.0 / (k + 1.0);
            for list in [dense, sparse] {
                for (rank, (id, _)) in list.iter().enumerate() {
                    #[allow(clippy::cast_precision_loss)]
                    let rrf = 1.0 / (k + rank as f32 + 1.0);
                    if let Some(hit) = hits.get_mut(id.as_str()) {
                        hit.fused_score += rrf / ceiling;
                    }
                }
            }
        }
    }

    let mut fused: Vec<FusedHit> = hits.into_values().collect();
    fused.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    fused
}

fn blank(id: &str) -> FusedHit {
    FusedHit {
        id: id.to_string(),
        dense_score: 0.0,
        sparse_score: 0.0,
        fused_score: 0.0,
    }
}

/// Min-max normalize a ranked list into id → [0, 1]. A single-element or
/// constant list maps to 1.0 rather than dividing by zero.
///
/// The worst-ranked entry of each list pins to 0.0, so a passage last in
/// both lists fuses to 0.0 under the linear scheme and any positive
/// similarity floor will discard it regardless of its raw scores.
fn minmax(list: &[(PassageId, f32)]) -> HashMap<&str, f32> {
    let mut out = HashMap::new();
    if list.is_empty() {
        return out;
    }
    let max = list.iter().map(|(_, s)| *s).fold(f32::MIN, f32::max);
    let min = list.iter().map(|(_, s)| *s).fold(f32::MAX, f32::min);
    let range = max - min;
    for (id, score) in list {
        let norm = if range <= f32::EPSILON {
            1.0
        } else {
            (score - min) / range
        };
        out.insert(id.as_str(), norm);
    }
    out
}
