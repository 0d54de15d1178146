//! Graph Store client (§6): a typed labelled property graph fronted by an
//! HTTP API, matching the shape the upstream deployment uses to reach its
//! graph database (a thin internal service, not an embedded driver) — so
//! the concrete graph database stays swappable behind this trait.

use crate::error::GraphStoreError;
use crate::model::{GraphNode, RelationType};
use crate::retry::{with_retry, RetryConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

fn is_retryable(err: &GraphStoreError) -> bool {
    matches!(err, GraphStoreError::Transport(_))
}

#[async_trait]
pub trait GraphStoreClient: Send + Sync {
    async fn upsert_node(&self, node: &GraphNode) -> Result<(), GraphStoreError>;
    async fn delete_node(&self, id: &str) -> Result<(), GraphStoreError>;
    async fn node_exists(&self, id: &str) -> Result<bool, GraphStoreError>;
    async fn upsert_edge(
        &self,
        source: &str,
        target: &str,
        relation: RelationType,
    ) -> Result<(), GraphStoreError>;
    async fn traverse(
        &self,
        id: &str,
        max_hops: u32,
        limit: usize,
    ) -> Result<TraversalResult, GraphStoreError>;
    async fn stats(&self) -> Result<GraphStats, GraphStoreError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalEdge {
    pub source: String,
    pub target: String,
    pub relation: RelationType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraversalResult {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<TraversalEdge>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_nodes: u64,
    pub total_relationships: u64,
    pub project_count: u64,
}

/// `None` base URL disables graph features entirely (`GRAPH_STORE_URL`
/// unset, §6): callers hold an `Option<HttpGraphStoreClient>` and skip
/// graph-mirror work when it's `None`, rather than this type internally
/// no-op'ing every call.
pub struct HttpGraphStoreClient {
    base_url: String,
    http: reqwest::Client,
    retry: RetryConfig,
}

impl HttpGraphStoreClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            http: reqwest::Client::new(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Serialize)]
struct UpsertNodeRequest<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    memory_type: &'a str,
    content_preview: &'a str,
    project: Option<&'a str>,
    tags: &'a [String],
    created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
struct UpsertEdgeRequest<'a> {
    source_id: &'a str,
    target_id: &'a str,
    relation: &'a str,
}

#[derive(Deserialize)]
struct ExistsResponse {
    exists: bool,
}

#[async_trait]
impl GraphStoreClient for HttpGraphStoreClient {
    async fn upsert_node(&self, node: &GraphNode) -> Result<(), GraphStoreError> {
        with_retry(&self.retry, is_retryable, || async {
            self.http
                .post(format!("{}/graph/nodes", self.base_url))
                .json(&UpsertNodeRequest {
                    id: &node.id,
                    memory_type: node.memory_type.as_str(),
                    content_preview: &node.content_preview,
                    project: node.project.as_deref(),
                    tags: &node.tags,
                    created_at: node.created_at,
                })
                .send()
                .await?
                .error_for_status()?;
            Ok(())
        })
        .await
    }

    async fn delete_node(&self, id: &str) -> Result<(), GraphStoreError> {
        with_retry(&self.retry, is_retryable, || async {
            let resp = self.http.delete(format!("{}/graph/nodes/{}", self.base_url, id)).send().await?;
            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                return Ok(());
            }
            resp.error_for_status()?;
            Ok(())
        })
        .await
    }

    async fn node_exists(&self, id: &str) -> Result<bool, GraphStoreError> {
        with_retry(&self.retry, is_retryable, || async {
            let resp = self
                .http
                .get(format!("{}/graph/nodes/{}/exists", self.base_url, id))
                .send()
                .await?
                .error_for_status()?;
            let body: ExistsResponse = resp.json().await?;
            Ok(body.exists)
        })
        .await
    }

    async fn upsert_edge(
        &self,
        source: &str,
        target: &str,
        relation: RelationType,
    ) -> Result<(), GraphStoreError> {
        if source == target {
            return Err(GraphStoreError::Request("self-loops are rejected".to_string()));
        }
        with_retry(&self.retry, is_retryable, || async {
            self.http
                .post(format!("{}/graph/edges", self.base_url))
                .json(&UpsertEdgeRequest {
                    source_id: source,
                    target_id: target,
                    relation: relation.as_str(),
                })
                .send()
                .await?
                .error_for_status()?;
            Ok(())
        })
        .await
    }

    async fn traverse(
        &self,
        id: &str,
        max_hops: u32,
        limit: usize,
    ) -> Result<TraversalResult, GraphStoreError> {
        with_retry(&self.retry, is_retryable, || async {
            let resp = self
                .http
                .get(format!("{}/graph/nodes/{}/related", self.base_url, id))
                .query(&[("max_hops", max_hops.to_string()), ("limit", limit.to_string())])
                .send()
                .await?
                .error_for_status()?;
            resp.json().await.map_err(GraphStoreError::from)
        })
        .await
    }

    async fn stats(&self) -> Result<GraphStats, GraphStoreError> {
        with_retry(&self.retry, is_retryable, || async {
            let resp = self.http.get(format!("{}/graph/stats", self.base_url)).send().await?.error_for_status()?;
            resp.json().await.map_err(GraphStoreError::from)
        })
        .await
    }
}
