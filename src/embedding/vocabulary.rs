//! Degraded embedding path: bag of food-domain vocabulary.
//!
//! Each dimension counts one vocabulary term; the vector is padded (or truncated) to the
//! configured dimension and L2-normalized. Text sharing no term with the vocabulary
//! cannot be represented and is reported as an error so the caller can fall back.

use anyhow::Result;

use super::{l2_normalize, EmbeddingProvider};

/// Food-domain terms, one per dimension. Order is part of the vector layout.
pub const FOOD_VOCABULARY: &[&str] = &[
    "nasi", "ayam", "goreng", "mie", "soto", "bakso", "geprek", "pedas", "manis", "asam",
    "gurih", "kenyang", "berat", "ringan", "sarapan", "siang", "malam", "cemilan", "minuman",
    "pagi", "sore", "sambal", "sayur", "telur", "tempe", "tahu", "ikan", "seafood", "steak",
    "dimsum", "batagor", "gado", "pecel", "rawon", "gulai", "penyet", "bakar", "rebus",
    "kuah", "kering", "porsi", "besar", "makan", "makanan", "lapar", "enak", "biasa",
    "hangat", "segar", "es", "teh", "kopi", "jus", "roti",
];

pub struct VocabularyEmbedder {
    dimension: usize,
}

impl VocabularyEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Raw term counts over [`FOOD_VOCABULARY`], before padding.
    fn term_counts(text: &str) -> Vec<f32> {
        let mut counts = vec![0.0f32; FOOD_VOCABULARY.len()];
        for token in tokenize(text) {
            if let Some(idx) = FOOD_VOCABULARY.iter().position(|t| *t == token) {
                counts[idx] += 1.0;
            }
        }
        counts
    }
}

impl EmbeddingProvider for VocabularyEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = Self::term_counts(text);
        v.resize(self.dimension, 0.0);
        // Checked after truncation: terms past the last dimension do not count.
        anyhow::ensure!(
            v.iter().any(|c| *c > 0.0),
            "no overlap with food vocabulary"
        );
        Ok(l2_normalize(&v))
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_dimension() {
        let e = VocabularyEmbedder::new(384);
        let v = e.embed("Nasi Goreng pedas").unwrap();
        assert_eq!(v.len(), 384);
        assert!(v[FOOD_VOCABULARY.len()..].iter().all(|x| *x == 0.0));
    }

    #[test]
    fn truncates_small_dimension() {
        let e = VocabularyEmbedder::new(4);
        // "nasi" and "ayam" are the first two terms
        let v = e.embed("nasi ayam").unwrap();
        assert_eq!(v.len(), 4);
        assert!((v[0] - v[1]).abs() < 1e-6);
    }

    #[test]
    fn terms_cut_off_by_small_dimension_are_no_overlap() {
        let e = VocabularyEmbedder::new(4);
        // "roti" is the last term, far past dimension 4
        assert!(e.embed("roti").is_err());

        let chain = crate::embedding::ResilientEmbedder::degraded(4).unwrap();
        let (v, path) = chain.embed_traced("roti");
        assert_eq!(path, crate::embedding::EmbeddingPath::Hash);
        assert!(v.iter().any(|x| *x != 0.0));
    }

    #[test]
    fn counts_repeated_terms() {
        let v = VocabularyEmbedder::term_counts("gado-gado pedas pedas");
        let gado = FOOD_VOCABULARY.iter().position(|t| *t == "gado").unwrap();
        let pedas = FOOD_VOCABULARY.iter().position(|t| *t == "pedas").unwrap();
        assert_eq!(v[gado], 2.0);
        assert_eq!(v[pedas], 2.0);
    }

    #[test]
    fn no_overlap_is_error() {
        let e = VocabularyEmbedder::new(384);
        assert!(e.embed("hello world").is_err());
        assert!(e.embed("").is_err());
    }

    #[test]
    fn deterministic() {
        let e = VocabularyEmbedder::new(384);
        assert_eq!(e.embed("soto ayam").unwrap(), e.embed("soto ayam").unwrap());
    }
}
