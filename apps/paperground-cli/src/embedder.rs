//! Feature-hashing embedder: deterministic, offline, and the same at
//! ingestion and query time, which is all hybrid retrieval requires of
//! it. Each term hashes to a dimension and a sign; vectors are
//! L2-normalized so cosine similarity behaves.

use async_trait::async_trait;
use std::hash::Hasher;
use twox_hash::XxHash64;

use paperground_core::error::ModelError;
use paperground_core::traits::Embedder;
use paperground_core::types::term_tokens;

pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(8) }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dim];
        for term in term_tokens(text) {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(term.as_bytes());
            let hash = hasher.finish();
            #[allow(clippy::cast_possible_truncation)]
            let idx = (hash % self.dim as u64) as usize;
            let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vec[idx] += sign;
        }
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vec {
                *x /= norm;
            }
        }
        vec
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        Ok(self.embed_sync(text))
    }
}
