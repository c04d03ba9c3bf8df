//! Cosine similarity and threshold ranking.

/// Cosine similarity in `[-1, 1]`. Zero vectors and mismatched lengths score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

/// Score one query against many vectors, preserving input order.
pub fn batch_similarity<V: AsRef<[f32]>>(query: &[f32], vectors: &[V]) -> Vec<f32> {
    vectors
        .iter()
        .map(|v| cosine_similarity(query, v.as_ref()))
        .collect()
}

/// Indices and scores sorted by score descending, ties by index ascending,
/// keeping only scores `>= threshold`.
pub fn rank_above_threshold(scores: &[f32], threshold: f32) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, s)| *s >= threshold)
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
}
