//! Memory Record Manager (§4.2): validates, embeds, and persists memory
//! records, keeping the Vector Store and Graph Store in sync.

use crate::config::Config;
use crate::embeddings::{embed_record, EmbeddingClient};
use crate::error::ServiceError;
use crate::model::{CreateMemoryInput, MemoryRecord, MemoryType, PatchMemoryInput};
use crate::quality;
use crate::stores::{GraphStoreClient, Point, VectorStoreClient};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

pub struct RecordManager {
    embeddings: Arc<dyn EmbeddingClient>,
    vectors: Arc<dyn VectorStoreClient>,
    graph: Option<Arc<dyn GraphStoreClient>>,
    config: Config,
}

impl RecordManager {
    pub fn new(
        embeddings: Arc<dyn EmbeddingClient>,
        vectors: Arc<dyn VectorStoreClient>,
        graph: Option<Arc<dyn GraphStoreClient>>,
        config: Config,
    ) -> Self {
        Self { embeddings, vectors, graph, config }
    }

    /// Validates, embeds, and writes a new memory record. The vector write
    /// is the commit point: a graph-mirror failure afterward is logged and
    /// swallowed rather than rolled back (§4.2 failure semantics) so a
    /// flaky Graph Store can never cause a memory to silently vanish.
    pub async fn upsert(&self, input: CreateMemoryInput) -> Result<MemoryRecord, ServiceError> {
        let memory_type = MemoryType::parse_name(&input.memory_type)
            .ok_or_else(|| ServiceError::Validation(format!("unknown memory type: {}", input.memory_type)))?;

        quality::passes_quality_gate(&input.content, &self.config.junk_fingerprints)
            .map_err(ServiceError::Validation)?;

        let now = Utc::now();
        let record = MemoryRecord {
            id: MemoryRecord::new_id(),
            memory_type,
            content: input.content,
            context: input.context,
            error_message: input.error_message,
            solution: input.solution,
            project: input.project,
            tags: input.tags,
            created_at: now,
            updated_at: now,
            pinned: input.pinned,
            resolved: false,
            access_count: 0,
            usefulness_score: 0.5,
            relations: input.relations,
            source: input.source,
            content_hash: input.content_hash,
            extra: HashMap::new(),
        };

        let embedded = embed_record(
            self.embeddings.as_ref(),
            &record,
            self.config.composite_embedding,
            self.config.composite_weights,
            self.config.sparse_enabled,
        )
        .await?;

        self.vectors
            .upsert(Point {
                id: record.id.clone(),
                dense: embedded.dense,
                sparse: embedded.sparse,
                payload: record_to_payload(&record),
            })
            .await?;

        self.mirror_to_graph(&record).await;

        Ok(record)
    }

    /// Metadata-only update: tags, pinned, resolved, usefulness, access
    /// count delta, relations. Vectors are left untouched — content
    /// changes are expressed as delete+insert (§4.2).
    pub async fn patch(&self, id: &str, patch: PatchMemoryInput) -> Result<MemoryRecord, ServiceError> {
        let mut record = self.get(id).await?;

        if let Some(tags) = patch.tags {
            record.tags = tags;
        }
        if let Some(pinned) = patch.pinned {
            record.pinned = pinned;
        }
        if let Some(resolved) = patch.resolved {
            record.resolved = resolved;
        }
        if let Some(score) = patch.usefulness_score {
            record.usefulness_score = score;
        }
        if let Some(delta) = patch.access_count_delta {
            record.access_count = record.access_count.saturating_add_signed(delta);
        }
        let relations_changed = patch.relations.is_some();
        if let Some(relations) = patch.relations {
            record.relations = relations;
        }
        record.updated_at = Utc::now();

        self.vectors.update_payload(&record.id, record_to_payload(&record)).await?;

        if relations_changed {
            self.mirror_to_graph(&record).await;
        }

        Ok(record)
    }

    /// Deletes a record from both stores. The graph node is deleted
    /// best-effort; a failure there is logged, not propagated, since the
    /// vector deletion is what actually removes the memory from retrieval.
    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        self.vectors.delete(id).await?;
        if let Some(graph) = &self.graph {
            if let Err(err) = graph.delete_node(id).await {
                tracing::warn!(memory_id = %id, error = %err, "graph node delete failed");
            }
        }
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<MemoryRecord, ServiceError> {
        let point = self
            .vectors
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("memory not found: {id}")))?;
        payload_to_record(&point).ok_or_else(|| ServiceError::Internal(format!("malformed record payload: {id}")))
    }

    /// Pages through records in creation order. `cursor` is the point id to
    /// resume after; `None` starts from the beginning.
    pub async fn list(&self, limit: u32, cursor: Option<String>) -> Result<(Vec<MemoryRecord>, Option<String>), ServiceError> {
        let page = self.vectors.scroll(limit, cursor).await?;
        let records = page
            .points
            .iter()
            .filter_map(payload_to_record)
            .collect();
        Ok((records, page.next_offset))
    }

    async fn mirror_to_graph(&self, record: &MemoryRecord) {
        let Some(graph) = &self.graph else { return };

        if let Err(err) = graph.upsert_node(&record.into()).await {
            tracing::warn!(memory_id = %record.id, error = %err, "graph node mirror failed");
        }
        for relation in &record.relations {
            if let Err(err) = graph
                .upsert_edge(&record.id, &relation.target_id, relation.relation_type)
                .await
            {
                tracing::warn!(
                    memory_id = %record.id,
                    target = %relation.target_id,
                    error = %err,
                    "relation edge mirror failed"
                );
            }
        }
    }

    /// Full scan filtered by `source`, used by the ingestor to find a
    /// file's previously-indexed chunks for atomic replacement (§4.7).
    pub async fn list_by_source(&self, source: &str) -> Result<Vec<MemoryRecord>, ServiceError> {
        let mut cursor = None;
        let mut matches = Vec::new();
        loop {
            let page = self.vectors.scroll(200, cursor).await?;
            for point in &page.points {
                if let Some(record) = payload_to_record(point) {
                    if record.source.as_deref() == Some(source) {
                        matches.push(record);
                    }
                }
            }
            cursor = page.next_offset;
            if cursor.is_none() {
                break;
            }
        }
        Ok(matches)
    }
}

/// Flattens a `MemoryRecord` into the JSON payload stored alongside its
/// vectors. `content` is kept in full (needed for reranking and previews);
/// `relations` round-trip through JSON so `payload_to_record` can recover
/// them without a second store round-trip. A synthetic `createdAtUnix`
/// field is added alongside the RFC3339 `createdAt` string so the Vector
/// Store can translate time-range filters into a numeric range condition;
/// `MemoryRecord` has no such field and ignores it on read-back.
pub fn record_to_payload(record: &MemoryRecord) -> HashMap<String, serde_json::Value> {
    let mut payload: HashMap<String, serde_json::Value> = serde_json::to_value(record)
        .ok()
        .and_then(|v| v.as_object().cloned())
        .map(|obj| obj.into_iter().collect())
        .unwrap_or_default();
    payload.insert("createdAtUnix".to_string(), serde_json::Value::from(record.created_at.timestamp()));
    payload
}

pub(crate) fn payload_to_record(point: &Point) -> Option<MemoryRecord> {
    let mut value = serde_json::to_value(&point.payload).ok()?;
    value.as_object_mut()?.entry("id").or_insert_with(|| point.id.clone().into());
    serde_json::from_value(value).ok()
}
