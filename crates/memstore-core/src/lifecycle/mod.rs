//! Lifecycle Engine (§4.6): staleness scoring, pruning, duplicate
//! detection, and bulk re-embedding.

use crate::config::Config;
use crate::embeddings::{embed_record, EmbeddingClient};
use crate::error::ServiceError;
use crate::model::{MemoryRecord, MemoryType};
use crate::records::payload_to_record;
use crate::stores::{Filter, GraphStoreClient, Point, VectorStoreClient};
use chrono::{DateTime, Utc};
use std::sync::Arc;

const REEMBED_BATCH_SIZE: usize = 50;
const DUPLICATE_SIMILARITY_THRESHOLD: f32 = 0.85;

/// Staleness score in `[0, 100]` (§4.6). Higher means more stale.
pub fn staleness_score(record: &MemoryRecord, now: DateTime<Utc>) -> f32 {
    let age_days = record.age(now).num_days().max(0) as f32;
    let age_component = (age_days / 10.0).min(40.0);

    let access_component = if record.access_count == 0 {
        30.0
    } else if record.access_count < 3 {
        20.0
    } else if record.access_count < 10 {
        10.0
    } else {
        0.0
    };

    let type_risk = match record.memory_type {
        MemoryType::Docs => 20.0,
        MemoryType::Error => 10.0,
        MemoryType::Decision => 5.0,
        _ => 0.0,
    };

    let usefulness_component = if record.usefulness_score < 0.3 {
        10.0
    } else if record.usefulness_score < 0.5 {
        5.0
    } else {
        0.0
    };

    (age_component + access_component + type_risk + usefulness_component).min(100.0)
}

/// Evaluates the pruning predicate for a single record (§4.6). `now` is
/// passed in explicitly rather than read via `Utc::now()` so sweeps are
/// reproducible against a fixed instant.
pub fn should_prune(record: &MemoryRecord, threshold_days: i64, now: DateTime<Utc>) -> bool {
    let age_days = record.age(now).num_days();
    let resolved_error = record.memory_type == MemoryType::Error && record.resolved;

    let general_rule = !record.pinned
        && !resolved_error
        && record.access_count <= 5
        && record.usefulness_score <= 0.7
        && record.relations.is_empty()
        && !matches!(record.memory_type, MemoryType::Decision | MemoryType::Pattern)
        && age_days > threshold_days;

    let stale_context = record.memory_type == MemoryType::Context
        && record.access_count == 0
        && age_days > threshold_days;

    let unused_low_value = record.usefulness_score < 0.3 && record.access_count == 0;

    general_rule || stale_context || unused_low_value
}

#[derive(Debug, Clone)]
pub struct PruneReport {
    pub candidate_ids: Vec<String>,
    pub deleted_ids: Vec<String>,
    pub dry_run: bool,
}

pub struct LifecycleEngine {
    embeddings: Arc<dyn EmbeddingClient>,
    vectors: Arc<dyn VectorStoreClient>,
    graph: Option<Arc<dyn GraphStoreClient>>,
    config: Config,
}

impl LifecycleEngine {
    pub fn new(
        embeddings: Arc<dyn EmbeddingClient>,
        vectors: Arc<dyn VectorStoreClient>,
        graph: Option<Arc<dyn GraphStoreClient>>,
        config: Config,
    ) -> Self {
        Self { embeddings, vectors, graph, config }
    }

    /// Scans every record via scroll, applying `should_prune`. Dry-run by
    /// default (§4.6); real deletion requires `dry_run = false` and is
    /// capped at `Config::prune_max_per_run`. Records updated after the
    /// sweep started are never deleted, even if a scroll page lands on
    /// them after a concurrent write. The matching graph node is deleted
    /// best-effort alongside the vector point, same as `RecordManager::delete`.
    pub async fn prune(&self, threshold_days: Option<i64>, dry_run: bool) -> Result<PruneReport, ServiceError> {
        let sweep_started_at = Utc::now();
        let threshold = threshold_days.unwrap_or(self.config.prune_default_days);

        let mut candidate_ids = Vec::new();
        let mut deleted_ids = Vec::new();
        let mut cursor = None;

        loop {
            let page = self.vectors.scroll(200, cursor).await?;
            for point in &page.points {
                let Some(record) = payload_to_record(point) else { continue };
                if record.updated_at > sweep_started_at {
                    continue;
                }
                if should_prune(&record, threshold, sweep_started_at) {
                    candidate_ids.push(record.id.clone());
                    if !dry_run && deleted_ids.len() < self.config.prune_max_per_run {
                        self.vectors.delete(&record.id).await?;
                        if let Some(graph) = &self.graph {
                            if let Err(err) = graph.delete_node(&record.id).await {
                                tracing::warn!(memory_id = %record.id, error = %err, "graph node delete failed during prune");
                            }
                        }
                        deleted_ids.push(record.id);
                    }
                }
            }
            cursor = page.next_offset;
            if cursor.is_none() {
                break;
            }
        }

        Ok(PruneReport { candidate_ids, deleted_ids, dry_run })
    }

    /// Runs a semantic search on `record`'s own content and reports any
    /// other record created after it with similarity at or above
    /// [`DUPLICATE_SIMILARITY_THRESHOLD`]. Report-only: nothing is deleted.
    pub async fn find_duplicates(&self, record: &MemoryRecord) -> Result<Vec<String>, ServiceError> {
        let embedded = self.embeddings.embed_query(&record.content, false).await?;
        let hits = self
            .vectors
            .dense_search(&embedded.dense, &Filter::default(), 20)
            .await?;

        let mut superseders = Vec::new();
        for hit in hits {
            if hit.id == record.id {
                continue;
            }
            let similarity = hit.dense_score.unwrap_or(0.0);
            if similarity < DUPLICATE_SIMILARITY_THRESHOLD {
                continue;
            }
            let Some(other) = payload_to_record(&Point {
                id: hit.id.clone(),
                dense: Vec::new(),
                sparse: None,
                payload: hit.payload,
            }) else {
                continue;
            };
            if other.created_at > record.created_at {
                superseders.push(other.id);
            }
        }
        Ok(superseders)
    }

    /// Re-computes vectors for every record with the current embedding
    /// pipeline, in batches, leaving payloads untouched. Idempotent on
    /// repeat (§4.6).
    pub async fn reembed_all(&self, use_composite: bool) -> Result<usize, ServiceError> {
        let mut cursor = None;
        let mut updated = 0usize;

        loop {
            let page = self.vectors.scroll(REEMBED_BATCH_SIZE as u32, cursor).await?;
            for point in &page.points {
                let Some(record) = payload_to_record(point) else { continue };
                let embedded = embed_record(
                    self.embeddings.as_ref(),
                    &record,
                    use_composite,
                    self.config.composite_weights,
                    self.config.sparse_enabled,
                )
                .await?;
                self.vectors.update_vectors(&record.id, embedded.dense, embedded.sparse).await?;
                updated += 1;
            }
            cursor = page.next_offset;
            if cursor.is_none() {
                break;
            }
        }

        Ok(updated)
    }
}
