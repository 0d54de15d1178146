//! Composite embedding pipeline (§4.2): weighted mean of three sub-view
//! dense embeddings, L2-normalized. Disabled via `Config::composite_embedding`
//! to fall back to a single-shot embedding of the full enriched text.

use crate::config::CompositeWeights;
use crate::embeddings::client::{EmbedResult, EmbeddingClient};
use crate::error::EmbeddingError;
use crate::model::MemoryRecord;

pub async fn embed_record(
    client: &dyn EmbeddingClient,
    record: &MemoryRecord,
    composite_enabled: bool,
    weights: CompositeWeights,
    include_sparse: bool,
) -> Result<EmbedResult, EmbeddingError> {
    let enriched = record.embedding_text();

    if !composite_enabled {
        return client.embed_document(&enriched, include_sparse).await;
    }

    let full = client.embed_document(&enriched, false).await?;
    let content_only = client.embed_document(&record.content, false).await?;

    let slot_text = record.solution_or_error_slot();
    let slot = if slot_text.is_empty() {
        None
    } else {
        Some(client.embed_document(&slot_text, false).await?)
    };

    let dense = weighted_mean(&full.dense, &content_only.dense, slot.as_ref().map(|s| s.dense.as_slice()), weights);

    // The sparse vector is computed once from the enriched text, not
    // composited across sub-views (§4.2).
    let sparse = if include_sparse {
        client.embed_document(&enriched, true).await?.sparse
    } else {
        None
    };

    Ok(EmbedResult { dense, sparse })
}

fn weighted_mean(
    full: &[f32],
    content_only: &[f32],
    slot: Option<&[f32]>,
    weights: CompositeWeights,
) -> Vec<f32> {
    let dims = full.len();
    let mut out = vec![0.0_f32; dims];

    // Renormalize weights when the solution/error slot is absent so the
    // two remaining views still sum to 1.0 instead of silently losing mass.
    let (w_full, w_content, w_slot) = match slot {
        Some(_) => (weights.full_text, weights.content_only, weights.solution_or_error),
        None => {
            let denom = weights.full_text + weights.content_only;
            (weights.full_text / denom, weights.content_only / denom, 0.0)
        }
    };

    for i in 0..dims {
        out[i] = full[i] * w_full + content_only.get(i).copied().unwrap_or(0.0) * w_content;
        if let Some(s) = slot {
            out[i] += s.get(i).copied().unwrap_or(0.0) * w_slot;
        }
    }

    l2_normalize(&mut out);
    out
}

fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_mean_output_is_unit_norm() {
        let full = vec![1.0, 0.0, 0.0];
        let content = vec![0.0, 1.0, 0.0];
        let slot = vec![0.0, 0.0, 1.0];
        let out = weighted_mean(&full, &content, Some(&slot), CompositeWeights::default());
        let norm: f32 = out.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn missing_slot_renormalizes_remaining_weights() {
        let full = vec![1.0, 0.0];
        let content = vec![0.0, 1.0];
        let out = weighted_mean(&full, &content, None, CompositeWeights::default());
        let norm: f32 = out.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
}
