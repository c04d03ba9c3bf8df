//! Last-resort embedding path: SHA-256-derived pseudo-random vectors.
//!
//! Seeds `"{text}_{i}"` are hashed in sequence and the first eight bytes of each digest
//! become eight components in `[0, 1]`. Deterministic for identical text, carries no
//! semantics. Components are non-negative, so cosine similarity between two hash
//! vectors is never negative.

use anyhow::Result;
use sha2::{Digest, Sha256};

use super::{l2_normalize, EmbeddingProvider};

const BYTES_PER_SEED: usize = 8;

pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Infallible variant used by the fallback chain.
    pub fn embed_vector(&self, text: &str) -> Vec<f32> {
        let mut v = Vec::with_capacity(self.dimension);
        let mut seed = 0usize;
        while v.len() < self.dimension {
            let digest = Sha256::digest(format!("{text}_{seed}").as_bytes());
            v.extend(
                digest
                    .iter()
                    .take(BYTES_PER_SEED)
                    .map(|b| f32::from(*b) / 255.0),
            );
            seed += 1;
        }
        v.truncate(self.dimension);
        l2_normalize(&v)
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_dimension_for_uneven_sizes() {
        for dim in [1, 7, 192, 384, 385] {
            assert_eq!(HashEmbedder::new(dim).embed_vector("kopi").len(), dim);
        }
    }

    #[test]
    fn deterministic_and_distinct() {
        let e = HashEmbedder::new(384);
        assert_eq!(e.embed_vector("nasi goreng"), e.embed_vector("nasi goreng"));
        assert_ne!(e.embed_vector("nasi goreng"), e.embed_vector("mie goreng"));
    }

    #[test]
    fn unit_norm() {
        let v = HashEmbedder::new(384).embed_vector("bakso");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
}
