//! Shared in-process fakes for the Embedding Service, Vector Store, and
//! Graph Store, letting the scenario/invariant suites exercise the full
//! core library without a live Qdrant or graph HTTP dependency.

#![allow(dead_code)]

use async_trait::async_trait;
use memstore_core::embeddings::{cosine_similarity, EmbedResult, EmbeddingClient, EmbeddingConfig, SparseVector};
use memstore_core::error::{EmbeddingError, GraphStoreError, VectorStoreError};
use memstore_core::model::{GraphNode, RelationType};
use memstore_core::retrieval::bm25_term_overlap_scores;
use memstore_core::stores::{Filter, GraphStats, GraphStoreClient, HybridSearchHit, Point, ScrollPage, TraversalEdge, TraversalResult, VectorStoreClient};
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

const DENSE_DIMS: usize = 64;

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn bucket(token: &str, modulus: u64) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    token.hash(&mut hasher);
    hasher.finish() % modulus
}

fn dense_embed(text: &str) -> Vec<f32> {
    let mut v = vec![0.0_f32; DENSE_DIMS];
    for token in tokenize(text) {
        v[bucket(&token, DENSE_DIMS as u64) as usize] += 1.0;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    v
}

fn sparse_embed(text: &str) -> SparseVector {
    let mut counts: HashMap<u32, f32> = HashMap::new();
    for token in tokenize(text) {
        *counts.entry(bucket(&token, 997) as u32).or_insert(0.0) += 1.0;
    }
    let mut indices: Vec<u32> = counts.keys().copied().collect();
    indices.sort_unstable();
    let values = indices.iter().map(|i| counts[i]).collect();
    SparseVector { indices, values }
}

fn sparse_dot(a: &SparseVector, b: &SparseVector) -> f32 {
    let lookup: HashMap<u32, f32> = a.indices.iter().copied().zip(a.values.iter().copied()).collect();
    b.indices
        .iter()
        .zip(b.values.iter())
        .map(|(idx, val)| lookup.get(idx).copied().unwrap_or(0.0) * val)
        .sum()
}

/// Builds a minimal JSON payload matching `MemoryRecord`'s on-wire schema,
/// for seeding a `Point` directly into a fake store without going through
/// `MemoryRecord`'s struct literal (the type is `#[non_exhaustive]`, so
/// downstream crates can only ever build one by deserializing).
pub fn memory_payload(
    memory_type: &str,
    content: &str,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    access_count: u64,
    usefulness_score: f32,
) -> HashMap<String, serde_json::Value> {
    let value = serde_json::json!({
        "type": memory_type,
        "content": content,
        "createdAt": created_at.to_rfc3339(),
        "updatedAt": updated_at.to_rfc3339(),
        "accessCount": access_count,
        "usefulnessScore": usefulness_score,
    });
    value.as_object().cloned().map(|o| o.into_iter().collect()).unwrap_or_default()
}

/// Deterministic hashing-bag embedding client: no network, no model
/// download. `sparse_available`/`reranker_available` are toggled per test
/// to exercise the retriever's degraded-mode fallbacks.
pub struct FakeEmbeddingClient {
    pub sparse_available: bool,
    pub reranker_available: bool,
}

impl FakeEmbeddingClient {
    pub fn new() -> Self {
        Self { sparse_available: true, reranker_available: true }
    }

    pub fn degraded() -> Self {
        Self { sparse_available: false, reranker_available: false }
    }
}

impl Default for FakeEmbeddingClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingClient for FakeEmbeddingClient {
    async fn embed_document(&self, text: &str, include_sparse: bool) -> Result<EmbedResult, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("text cannot be empty".to_string()));
        }
        Ok(EmbedResult {
            dense: dense_embed(text),
            sparse: if include_sparse && self.sparse_available { Some(sparse_embed(text)) } else { None },
        })
    }

    async fn embed_query(&self, text: &str, include_sparse: bool) -> Result<EmbedResult, EmbeddingError> {
        self.embed_document(text, include_sparse).await
    }

    async fn embed_batch(&self, texts: &[String], include_sparse: bool) -> Result<Vec<EmbedResult>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts {
            out.push(self.embed_document(t, include_sparse).await?);
        }
        Ok(out)
    }

    async fn rerank(&self, query: &str, texts: &[String]) -> Result<Vec<f32>, EmbeddingError> {
        Ok(bm25_term_overlap_scores(query, texts))
    }

    fn config(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            dimensions: DENSE_DIMS,
            sparse_available: self.sparse_available,
            reranker_available: self.reranker_available,
        }
    }
}

#[derive(Default)]
struct VectorInner {
    points: HashMap<String, Point>,
    order: Vec<String>,
}

/// In-memory stand-in for the Qdrant-backed Vector Store, exposing the
/// same filter/scroll/hybrid-search contract so the retriever, lifecycle
/// engine, and record manager can run unmodified against it.
pub struct InMemoryVectorStore {
    inner: Mutex<VectorInner>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self { inner: Mutex::new(VectorInner::default()) }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().points.len()
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_filter(payload: &HashMap<String, serde_json::Value>, filter: &Filter) -> bool {
    if let Some(project) = &filter.project {
        if payload.get("project").and_then(|v| v.as_str()) != Some(project.as_str()) {
            return false;
        }
    }
    if let Some(memory_type) = &filter.memory_type {
        if payload.get("type").and_then(|v| v.as_str()) != Some(memory_type.as_str()) {
            return false;
        }
    }
    if !filter.tags_all.is_empty() {
        let tags: Vec<String> = payload
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|x| x.as_str().map(String::from)).collect())
            .unwrap_or_default();
        if !filter.tags_all.iter().all(|t| tags.contains(t)) {
            return false;
        }
    }
    if let Some(source) = &filter.source {
        if payload.get("source").and_then(|v| v.as_str()) != Some(source.as_str()) {
            return false;
        }
    }
    let created_at = payload
        .get("createdAt")
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&chrono::Utc));
    if let Some(after) = filter.created_after {
        match created_at {
            Some(c) if c > after => {}
            _ => return false,
        }
    }
    if let Some(before) = filter.created_before {
        match created_at {
            Some(c) if c < before => {}
            _ => return false,
        }
    }
    true
}

#[async_trait]
impl VectorStoreClient for InMemoryVectorStore {
    async fn ensure_collection(&self, _dimensions: usize, _sparse_enabled: bool) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn upsert(&self, point: Point) -> Result<(), VectorStoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.points.contains_key(&point.id) {
            inner.order.push(point.id.clone());
        }
        inner.points.insert(point.id.clone(), point);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), VectorStoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.points.remove(id);
        inner.order.retain(|x| x != id);
        Ok(())
    }

    async fn scroll(&self, limit: u32, offset: Option<String>) -> Result<ScrollPage, VectorStoreError> {
        let inner = self.inner.lock().unwrap();
        let start = match &offset {
            Some(off) => inner.order.iter().position(|id| id == off).map(|i| i + 1).unwrap_or(inner.order.len()),
            None => 0,
        };
        let page_ids: Vec<String> = inner.order.iter().skip(start).take(limit as usize).cloned().collect();
        let points: Vec<Point> = page_ids.iter().filter_map(|id| inner.points.get(id).cloned()).collect();
        let next_offset = if start + page_ids.len() < inner.order.len() { page_ids.last().cloned() } else { None };
        Ok(ScrollPage { points, next_offset })
    }

    async fn get(&self, id: &str) -> Result<Option<Point>, VectorStoreError> {
        Ok(self.inner.lock().unwrap().points.get(id).cloned())
    }

    async fn dense_search(&self, dense: &[f32], filter: &Filter, limit: usize) -> Result<Vec<HybridSearchHit>, VectorStoreError> {
        let inner = self.inner.lock().unwrap();
        let mut scored: Vec<(String, f32, HashMap<String, serde_json::Value>)> = inner
            .points
            .values()
            .filter(|p| matches_filter(&p.payload, filter))
            .map(|p| (p.id.clone(), cosine_similarity(dense, &p.dense), p.payload.clone()))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored
            .into_iter()
            .map(|(id, score, payload)| HybridSearchHit { id, payload, dense_score: Some(score), sparse_score: None })
            .collect())
    }

    async fn sparse_search(&self, sparse: &SparseVector, filter: &Filter, limit: usize) -> Result<Vec<HybridSearchHit>, VectorStoreError> {
        let inner = self.inner.lock().unwrap();
        let mut scored: Vec<(String, f32, HashMap<String, serde_json::Value>)> = inner
            .points
            .values()
            .filter(|p| matches_filter(&p.payload, filter))
            .filter_map(|p| p.sparse.as_ref().map(|s| (p.id.clone(), sparse_dot(sparse, s), p.payload.clone())))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored
            .into_iter()
            .map(|(id, score, payload)| HybridSearchHit { id, payload, dense_score: None, sparse_score: Some(score) })
            .collect())
    }

    async fn update_vectors(&self, id: &str, dense: Vec<f32>, sparse: Option<SparseVector>) -> Result<(), VectorStoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(p) = inner.points.get_mut(id) {
            p.dense = dense;
            p.sparse = sparse;
        }
        Ok(())
    }

    async fn bump_access_count(&self, id: &str) -> Result<(), VectorStoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(p) = inner.points.get_mut(id) {
            let current = p.payload.get("accessCount").and_then(|v| v.as_u64()).unwrap_or(0);
            p.payload.insert("accessCount".to_string(), serde_json::Value::from(current + 1));
        }
        Ok(())
    }

    async fn update_payload(&self, id: &str, payload: HashMap<String, serde_json::Value>) -> Result<(), VectorStoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(p) = inner.points.get_mut(id) {
            for (k, v) in payload {
                p.payload.insert(k, v);
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct GraphInner {
    nodes: HashMap<String, GraphNode>,
    edges: Vec<(String, String, RelationType)>,
}

/// In-memory stand-in for the HTTP-fronted Graph Store.
pub struct InMemoryGraphStore {
    inner: Mutex<GraphInner>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self { inner: Mutex::new(GraphInner::default()) }
    }

    pub fn edge_count(&self) -> usize {
        self.inner.lock().unwrap().edges.len()
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStoreClient for InMemoryGraphStore {
    async fn upsert_node(&self, node: &GraphNode) -> Result<(), GraphStoreError> {
        self.inner.lock().unwrap().nodes.insert(node.id.clone(), node.clone());
        Ok(())
    }

    async fn delete_node(&self, id: &str) -> Result<(), GraphStoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.nodes.remove(id);
        inner.edges.retain(|(s, t, _)| s != id && t != id);
        Ok(())
    }

    async fn node_exists(&self, id: &str) -> Result<bool, GraphStoreError> {
        Ok(self.inner.lock().unwrap().nodes.contains_key(id))
    }

    async fn upsert_edge(&self, source: &str, target: &str, relation: RelationType) -> Result<(), GraphStoreError> {
        if source == target {
            return Err(GraphStoreError::Request("self-loops are rejected".to_string()));
        }
        let mut inner = self.inner.lock().unwrap();
        if !inner.edges.iter().any(|(s, t, r)| s == source && t == target && *r == relation) {
            inner.edges.push((source.to_string(), target.to_string(), relation));
        }
        Ok(())
    }

    async fn traverse(&self, id: &str, max_hops: u32, limit: usize) -> Result<TraversalResult, GraphStoreError> {
        let inner = self.inner.lock().unwrap();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(id.to_string());
        let mut frontier = vec![id.to_string()];
        let mut edges = Vec::new();
        let mut nodes = Vec::new();

        for _ in 0..max_hops {
            if edges.len() >= limit {
                break;
            }
            let mut next_frontier = Vec::new();
            for current in &frontier {
                for (s, t, r) in inner.edges.iter().filter(|(s, _, _)| s == current) {
                    if edges.len() >= limit {
                        break;
                    }
                    edges.push(TraversalEdge { source: s.clone(), target: t.clone(), relation: *r });
                    if visited.insert(t.clone()) {
                        if let Some(n) = inner.nodes.get(t) {
                            nodes.push(n.clone());
                        }
                        next_frontier.push(t.clone());
                    }
                }
            }
            if next_frontier.is_empty() {
                break;
            }
            frontier = next_frontier;
        }

        Ok(TraversalResult { nodes, edges })
    }

    async fn stats(&self) -> Result<GraphStats, GraphStoreError> {
        let inner = self.inner.lock().unwrap();
        let projects: HashSet<&str> = inner.nodes.values().filter_map(|n| n.project.as_deref()).collect();
        Ok(GraphStats {
            total_nodes: inner.nodes.len() as u64,
            total_relationships: inner.edges.len() as u64,
            project_count: projects.len() as u64,
        })
    }
}
