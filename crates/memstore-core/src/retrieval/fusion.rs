//! Reciprocal Rank Fusion (§4.3): combines a dense ranking and a sparse
//! ranking into one fused score per id. `k = 60` per spec.

use std::collections::HashMap;

pub const RRF_K: f32 = 60.0;

/// `rankings` is one ranked id list per signal (already sorted best-first).
/// Returns `(id, fused_score)` sorted by fused score descending.
pub fn reciprocal_rank_fusion(rankings: &[Vec<String>], k: f32) -> Vec<(String, f32)> {
    let mut scores: HashMap<String, f32> = HashMap::new();

    for ranking in rankings {
        for (rank, id) in ranking.iter().enumerate() {
            let contribution = 1.0 / (k + (rank + 1) as f32);
            *scores.entry(id.clone()).or_insert(0.0) += contribution;
        }
    }

    let mut fused: Vec<(String, f32)> = scores.into_iter().collect();
    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    fused
}
