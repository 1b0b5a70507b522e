//! Sparse scoring: BM25 over the term statistics precomputed at
//! ingestion. The corpus is per-session and already chunked, so scoring
//! is an in-memory scan rather than an on-disk inverted index.

use paperground_core::traits::LexicalScorer;
use paperground_core::types::{term_tokens, DocumentCorpus, Passage, PassageId};

#[derive(Debug, Clone)]
pub struct Bm25Scorer {
    k1: f32,
    b: f32,
}

impl Default for Bm25Scorer {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

impl Bm25Scorer {
    pub fn new(k1: f32, b: f32) -> Self {
        Self { k1, b }
    }

    fn score_passage(&self, terms: &[String], passage: &Passage, corpus: &DocumentCorpus) -> f32 {
        let avg_len = corpus.avg_term_len().max(1.0);
        #[allow(clippy::cast_precision_loss)]
        let n = corpus.len() as f32;
        #[allow(clippy::cast_precision_loss)]
        let passage_len = passage.term_len() as f32;

        let mut score = 0.0;
        for term in terms {
            let tf = passage.term_counts.get(term).copied().unwrap_or(0);
            if tf == 0 {
                continue;
            }
            #[allow(clippy::cast_precision_loss)]
            let tf = tf as f32;
            #[allow(clippy::cast_precision_loss)]
            let df = corpus.doc_freq(term) as f32;
            let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
            let norm = self.k1 * (1.0 - self.b + self.b * passage_len / avg_len);
            score += idf * tf * (self.k1 + 1.0) / (tf + norm);
        }
        score
    }
}

impl LexicalScorer for Bm25Scorer {
    fn score(&self, query: &str, corpus: &DocumentCorpus, k: usize) -> Vec<(PassageId, f32)> {
        let terms = term_tokens(query);
        if terms.is_empty() {
            return Vec::new();
        }
        let mut scored: Vec<(PassageId, f32)> = corpus
            .passages()
            .iter()
            .filter_map(|p| {
                let s = self.score_passage(&terms, p, corpus);
                (s > 0.0).then(|| (p.id.clone(), s))
            })
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn passage(id: &str, text: &str) -> Passage {
        let mut term_counts: HashMap<String, u32> = HashMap::new();
        for t in term_tokens(text) {
            *term_counts.entry(t).or_default() += 1;
        }
        Passage {
            id: id.to_string(),
            doc_id: id.to_string(),
            doc_title: id.to_string(),
            page: 1,
            text: text.to_string(),
            token_count: text.split_whitespace().count(),
            embedding: Vec::new(),
            term_counts,
        }
    }

    fn corpus() -> DocumentCorpus {
        let mut c = DocumentCorpus::new();
        c.add_passages(vec![
            passage("attn:1", "transformers use self attention for sequence modeling"),
            passage("rnn:1", "recurrent networks use recurrence for sequence modeling"),
            passage("cook:1", "slow cooking beans requires soaking overnight"),
        ]);
        c
    }

    #[test]
    fn matching_terms_rank_first() {
        let hits = Bm25Scorer::default().score("how does self attention work", &corpus(), 10);
        assert_eq!(hits[0].0, "attn:1");
        assert!(hits.iter().all(|(id, _)| id != "cook:1"));
    }

    #[test]
    fn rare_term_outweighs_common_term() {
        let c = corpus();
        let scorer = Bm25Scorer::default();
        let rare = scorer.score("attention", &c, 10);
        let common = scorer.score("sequence", &c, 10);
        assert_eq!(rare.len(), 1);
        assert_eq!(common.len(), 2);
        assert!(rare[0].1 > common[0].1);
    }

    #[test]
    fn empty_query_returns_nothing() {
        assert!(Bm25Scorer::default().score("? !", &corpus(), 10).is_empty());
    }
}
