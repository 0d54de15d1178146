//! Relationship Engine (§4.5): explicit typed links between memories, the
//! cascading auto-linking rules applied after each new record, and BFS
//! traversal of the resulting subgraph.

use crate::config::Config;
use crate::embeddings::EmbeddingClient;
use crate::error::ServiceError;
use crate::model::{MemoryRecord, MemoryType, RelationType};
use crate::records::payload_to_record;
use crate::stores::{Filter, GraphStoreClient, TraversalEdge, TraversalResult, VectorStoreClient};
use chrono::Utc;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// Creates an explicit `(source, target, type)` link. Self-loops and links
/// to a non-existent target are both rejected; creation never
/// auto-materialises the target (§4.5).
pub async fn link(
    graph: &dyn GraphStoreClient,
    source: &str,
    target: &str,
    relation: RelationType,
) -> Result<(), ServiceError> {
    if source == target {
        return Err(ServiceError::Validation("cannot link a memory to itself".to_string()));
    }
    if !graph.node_exists(target).await? {
        return Err(ServiceError::NotFound(format!("link target does not exist: {target}")));
    }
    graph.upsert_edge(source, target, relation).await?;
    Ok(())
}

/// Returns the subgraph reachable from `id` within `max_hops`, in BFS
/// order, tie-broken by `RelationType::traversal_priority` (§4.5).
pub async fn related(
    graph: &dyn GraphStoreClient,
    id: &str,
    max_hops: u32,
    limit: usize,
) -> Result<TraversalResult, ServiceError> {
    let raw = graph.traverse(id, max_hops, limit).await?;

    let mut edges = raw.edges;
    edges.sort_by_key(|e| e.relation.traversal_priority());

    let mut visited = HashSet::new();
    visited.insert(id.to_string());
    let mut queue: VecDeque<TraversalEdge> = edges.clone().into();
    let mut ordered_edges = Vec::with_capacity(edges.len());

    while let Some(edge) = queue.pop_front() {
        if visited.insert(edge.target.clone()) {
            ordered_edges.push(edge);
        }
        if ordered_edges.len() >= limit {
            break;
        }
    }

    Ok(TraversalResult { nodes: raw.nodes, edges: ordered_edges })
}

/// Cascading relationship classifier (§4.5). `a` is the newly-created
/// record, `b` a candidate neighbour; first matching rule wins.
pub fn determine_relationship_type(a: &MemoryRecord, b: &MemoryRecord) -> RelationType {
    let a_error = a.error_message.as_deref().unwrap_or("").to_lowercase();
    let b_error = b.error_message.as_deref().unwrap_or("").to_lowercase();
    let a_content = a.content.to_lowercase();
    let b_content = b.content.to_lowercase();

    if a.memory_type == MemoryType::Error
        && b.memory_type == MemoryType::Learning
        && !a_error.is_empty()
        && b_content.contains(&a_error)
    {
        return RelationType::Fixes;
    }
    if a.memory_type == MemoryType::Learning
        && b.memory_type == MemoryType::Error
        && !b_error.is_empty()
        && a_content.contains(&b_error)
    {
        return RelationType::Fixes;
    }
    if a.memory_type == MemoryType::Decision && b.memory_type == MemoryType::Pattern {
        return RelationType::Supports;
    }
    if a.memory_type == MemoryType::Pattern && b.memory_type == MemoryType::Decision {
        return RelationType::Supports;
    }

    let same_project = match (&a.project, &b.project) {
        (Some(pa), Some(pb)) => !pa.is_empty() && pa == pb,
        _ => false,
    };
    if same_project {
        let shared_tags = a.tags.iter().filter(|t| b.tags.contains(t)).count();
        if shared_tags >= 2 {
            return RelationType::Related;
        }
    }

    if a.memory_type == MemoryType::Learning
        && b.memory_type == MemoryType::Learning
        && (a.created_at - b.created_at).num_minutes().abs() < 5
    {
        return RelationType::Follows;
    }

    if a.memory_type == b.memory_type
        && same_project
        && a.created_at > b.created_at
        && (a.created_at - b.created_at) > chrono::Duration::hours(24)
    {
        return RelationType::Supersedes;
    }

    RelationType::Related
}

pub struct AutoLinker {
    embeddings: Arc<dyn EmbeddingClient>,
    vectors: Arc<dyn VectorStoreClient>,
    graph: Arc<dyn GraphStoreClient>,
    config: Config,
}

impl AutoLinker {
    pub fn new(
        embeddings: Arc<dyn EmbeddingClient>,
        vectors: Arc<dyn VectorStoreClient>,
        graph: Arc<dyn GraphStoreClient>,
        config: Config,
    ) -> Self {
        Self { embeddings, vectors, graph, config }
    }

    /// Finds `record`'s nearest neighbours from the last `auto_link_window_hours`,
    /// classifies each pair, and upserts the resulting edges. Returns the
    /// relations created so callers can mirror them onto the record.
    pub async fn auto_link(&self, record: &MemoryRecord) -> Result<Vec<(String, RelationType)>, ServiceError> {
        let embedded = self
            .embeddings
            .embed_document(&record.embedding_text(), false)
            .await?;

        let window_start = Utc::now() - chrono::Duration::hours(self.config.auto_link_window_hours);
        let filter = Filter {
            created_after: Some(window_start),
            ..Default::default()
        };

        // Oversample by one to account for the record finding itself.
        let candidates = self
            .vectors
            .dense_search(&embedded.dense, &filter, self.config.auto_link_top_k + 1)
            .await?;

        let mut created = Vec::new();
        for hit in candidates {
            if hit.id == record.id {
                continue;
            }
            let similarity = hit.dense_score.unwrap_or(0.0);
            if similarity < self.config.auto_link_min_similarity {
                continue;
            }
            let Some(neighbour) = payload_to_record(&crate::stores::Point {
                id: hit.id.clone(),
                dense: Vec::new(),
                sparse: None,
                payload: hit.payload,
            }) else {
                continue;
            };

            let relation = determine_relationship_type(record, &neighbour);
            if let Err(err) = self.graph.upsert_edge(&record.id, &neighbour.id, relation).await {
                tracing::warn!(memory_id = %record.id, target = %neighbour.id, error = %err, "auto-link edge failed");
                continue;
            }
            created.push((neighbour.id, relation));

            if created.len() >= self.config.auto_link_top_k {
                break;
            }
        }

        Ok(created)
    }
}
