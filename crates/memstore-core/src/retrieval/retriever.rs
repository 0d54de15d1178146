//! Hybrid Retriever (§4.3): embeds the query, searches dense (+ optional
//! sparse), fuses via RRF, optionally reranks, and reports degradation
//! when a requested capability wasn't available.

use super::fusion::{reciprocal_rank_fusion, RRF_K};
use super::planner::{self, StrategyHit};
use super::reranker::{apply_scores, bm25_term_overlap_scores};
use crate::embeddings::EmbeddingClient;
use crate::error::ServiceError;
use crate::stores::{Filter, VectorStoreClient};
use std::collections::HashMap;
use std::sync::Arc;

const OVERSAMPLE_FACTOR: usize = 3;
const MAX_CONCURRENT_STRATEGY_SEARCHES: usize = 8;
/// Largest `limit` a caller may request before it's silently clamped
/// (§4.3 step 1 — oversized limits clamp and annotate rather than error).
const MAX_SEARCH_LIMIT: usize = 200;

/// Clamps a requested result limit to `MAX_SEARCH_LIMIT`, reporting whether
/// clamping occurred. Callers are expected to have already handled
/// `requested == 0` as an early empty return.
fn clamp_limit(requested: usize) -> (usize, bool) {
    if requested > MAX_SEARCH_LIMIT {
        (MAX_SEARCH_LIMIT, true)
    } else {
        (requested, false)
    }
}

/// Caller-supplied search parameters (§4.3 step 1 + §4.4 planner inputs).
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub text: String,
    pub filter: Filter,
    pub limit: usize,
    /// Dense/sparse blend: `1.0` dense-only, `0.0` sparse-only, otherwise
    /// both rankings are fused with RRF (§9 resolution — the spec's
    /// `alpha` input selects among these three modes rather than weighting
    /// the RRF formula itself).
    pub alpha: f32,
    pub rerank: bool,
    pub use_planner: bool,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub payload: HashMap<String, serde_json::Value>,
    pub score: f32,
    pub strategy: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    /// `true` when sparse search or reranking was requested but the active
    /// `EmbeddingClient` didn't support it, so the result fell back to a
    /// degraded mode rather than failing outright (§4.3 step 5).
    pub degraded: bool,
    /// `true` when the requested `limit` exceeded `MAX_SEARCH_LIMIT` and
    /// was reduced.
    pub limit_clamped: bool,
}

pub struct HybridRetriever {
    embeddings: Arc<dyn EmbeddingClient>,
    vectors: Arc<dyn VectorStoreClient>,
}

impl HybridRetriever {
    pub fn new(embeddings: Arc<dyn EmbeddingClient>, vectors: Arc<dyn VectorStoreClient>) -> Self {
        Self { embeddings, vectors }
    }

    /// Runs the full retrieval pipeline for one query. When `use_planner`
    /// is set, fans out across the strategies derived from the query's
    /// filters (§4.4) with bounded concurrency and merges the results;
    /// otherwise runs a single semantic search. `limit=0` returns no hits
    /// without touching the embedding client or the store; a `limit` above
    /// `MAX_SEARCH_LIMIT` is clamped and reported via `limit_clamped`.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchOutcome, ServiceError> {
        if query.limit == 0 {
            return Ok(SearchOutcome { hits: vec![], degraded: false, limit_clamped: false });
        }
        let (limit, limit_clamped) = clamp_limit(query.limit);
        let mut query = query.clone();
        query.limit = limit;
        let query = &query;

        if !query.use_planner {
            let mut outcome = self.search_single(&query.text, &query.filter, query).await?;
            outcome.limit_clamped |= limit_clamped;
            return Ok(outcome);
        }

        let strategies = planner::plan_strategies(
            &query.text,
            query.filter.memory_type.as_deref(),
            &query.filter.tags_all,
            query.filter.project.as_deref(),
        );

        let semaphore = Arc::new(tokio::sync::Semaphore::new(MAX_CONCURRENT_STRATEGY_SEARCHES));
        let mut handles = Vec::with_capacity(strategies.len());

        for strategy in strategies {
            let embeddings = self.embeddings.clone();
            let vectors = self.vectors.clone();
            let semaphore = semaphore.clone();
            let text = match &strategy {
                super::planner::Strategy::Expanded(expanded) => expanded.clone(),
                _ => query.text.clone(),
            };
            let filter = strategy_filter(&strategy, &query.filter);
            let label = strategy.label();
            let strategy_query = query.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                let outcome = search_with(embeddings, vectors, &text, &filter, &strategy_query).await?;
                Ok::<_, ServiceError>((label, outcome))
            }));
        }

        let mut per_strategy = Vec::with_capacity(handles.len());
        let mut degraded_any = false;
        let mut limit_clamped_any = limit_clamped;

        for handle in handles {
            let (label, outcome) = handle
                .await
                .map_err(|e| ServiceError::Internal(format!("strategy search task panicked: {e}")))??;
            degraded_any |= outcome.degraded;
            limit_clamped_any |= outcome.limit_clamped;
            per_strategy.push(
                outcome
                    .hits
                    .into_iter()
                    .map(|h| StrategyHit { id: h.id, score: h.score, strategy: label.clone() })
                    .collect::<Vec<_>>(),
            );
        }

        let merged = planner::merge_strategy_hits(per_strategy);
        let by_id: HashMap<String, StrategyHit> =
            merged.into_iter().map(|h| (h.id.clone(), h)).collect();

        // Re-run the base semantic search once more to recover payloads for
        // the merged id set (strategies only carry id/score/label).
        let base = self.search_single(&query.text, &Filter::default(), query).await?;
        let payload_by_id: HashMap<String, HashMap<String, serde_json::Value>> =
            base.hits.into_iter().map(|h| (h.id, h.payload)).collect();

        let mut hits: Vec<SearchHit> = by_id
            .into_values()
            .map(|h| SearchHit {
                payload: payload_by_id.get(&h.id).cloned().unwrap_or_default(),
                id: h.id,
                score: h.score,
                strategy: Some(h.strategy),
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(query.limit);

        self.bump_access_counts(&hits);
        Ok(SearchOutcome { hits, degraded: degraded_any, limit_clamped: limit_clamped_any })
    }

    async fn search_single(
        &self,
        text: &str,
        filter: &Filter,
        query: &SearchQuery,
    ) -> Result<SearchOutcome, ServiceError> {
        let outcome = search_with(self.embeddings.clone(), self.vectors.clone(), text, filter, query).await?;
        self.bump_access_counts(&outcome.hits);
        Ok(outcome)
    }

    /// Best-effort, non-blocking: a failed bump never fails the search
    /// that triggered it (§4.3 step 6).
    fn bump_access_counts(&self, hits: &[SearchHit]) {
        for hit in hits {
            let vectors = self.vectors.clone();
            let id = hit.id.clone();
            tokio::spawn(async move {
                if let Err(err) = vectors.bump_access_count(&id).await {
                    tracing::debug!(memory_id = %id, error = %err, "access count bump failed");
                }
            });
        }
    }
}

/// Narrows a strategy's filter beyond the caller's base filter so
/// `Type`/`Tags`/`Project` strategies actually constrain results rather
/// than repeating the base semantic search (§4.4).
fn strategy_filter(strategy: &planner::Strategy, base: &Filter) -> Filter {
    let mut filter = base.clone();
    match strategy {
        planner::Strategy::Type(t) => filter.memory_type = Some(t.clone()),
        planner::Strategy::Tags(tags) => filter.tags_all = tags.clone(),
        planner::Strategy::Project(p) => filter.project = Some(p.clone()),
        planner::Strategy::Semantic | planner::Strategy::Expanded(_) => {}
    }
    filter
}

/// The single-strategy search engine, free of `&self` so it can run inside
/// a spawned task: embeds the query, searches dense (+ optional sparse),
/// fuses via RRF, and optionally reranks. Assumes `query.limit` is already
/// nonzero and clamped by the caller.
async fn search_with(
    embeddings: Arc<dyn EmbeddingClient>,
    vectors: Arc<dyn VectorStoreClient>,
    text: &str,
    filter: &Filter,
    query: &SearchQuery,
) -> Result<SearchOutcome, ServiceError> {
    let embed_config = embeddings.config();
    let want_sparse = query.alpha < 1.0;
    let sparse_unavailable = want_sparse && !embed_config.sparse_available;
    let mut degraded = sparse_unavailable;

    let embedded = embeddings.embed_query(text, want_sparse && !sparse_unavailable).await?;

    let oversample = query.limit * OVERSAMPLE_FACTOR;

    let dense_hits = vectors.dense_search(&embedded.dense, filter, oversample).await?;
    let dense_ranking: Vec<String> = dense_hits.iter().map(|h| h.id.clone()).collect();

    let fused_ids: Vec<(String, f32)> = if query.alpha >= 1.0 || sparse_unavailable {
        dense_hits
            .iter()
            .map(|h| (h.id.clone(), h.dense_score.unwrap_or(0.0)))
            .collect()
    } else if query.alpha <= 0.0 {
        let sparse = embedded
            .sparse
            .clone()
            .ok_or_else(|| ServiceError::Internal("sparse embedding requested but missing".to_string()))?;
        let sparse_hits = vectors.sparse_search(&sparse, filter, oversample).await?;
        sparse_hits
            .iter()
            .map(|h| (h.id.clone(), h.sparse_score.unwrap_or(0.0)))
            .collect()
    } else {
        let sparse = embedded.sparse.clone();
        let sparse_ranking = match sparse {
            Some(s) => {
                let sparse_hits = vectors.sparse_search(&s, filter, oversample).await?;
                sparse_hits.into_iter().map(|h| h.id).collect::<Vec<_>>()
            }
            None => Vec::new(),
        };
        reciprocal_rank_fusion(&[dense_ranking, sparse_ranking], RRF_K)
    };

    let mut payload_by_id: HashMap<String, HashMap<String, serde_json::Value>> =
        dense_hits.into_iter().map(|h| (h.id, h.payload)).collect();

    let mut candidates: Vec<(String, f32)> = fused_ids;
    candidates.truncate(oversample);

    let rerank_unavailable = query.rerank && !embed_config.reranker_available;
    degraded |= rerank_unavailable;

    let hits: Vec<SearchHit> = if query.rerank {
        let texts: Vec<String> = candidates
            .iter()
            .map(|(id, _)| {
                payload_by_id
                    .get(id)
                    .and_then(|p| p.get("content"))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string()
            })
            .collect();

        let scores = if rerank_unavailable {
            bm25_term_overlap_scores(text, &texts)
        } else {
            embeddings.rerank(text, &texts).await?
        };

        let ranked = apply_scores(candidates.clone(), &scores);
        ranked
            .into_iter()
            .map(|r| SearchHit {
                payload: payload_by_id.remove(&r.item.0).unwrap_or_default(),
                id: r.item.0,
                score: r.score,
                strategy: None,
            })
            .collect()
    } else {
        candidates
            .into_iter()
            .map(|(id, score)| SearchHit {
                payload: payload_by_id.remove(&id).unwrap_or_default(),
                id,
                score,
                strategy: None,
            })
            .collect()
    };

    let mut hits = hits;
    hits.truncate(query.limit);
    Ok(SearchOutcome { hits, degraded, limit_clamped: false })
}
