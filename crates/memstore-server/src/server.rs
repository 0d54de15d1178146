//! HTTP surface (§4.8): axum routes over the core's service objects. One
//! uniform response envelope for every endpoint; mutating DTOs reject
//! unknown fields at the deserialization boundary.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use memstore_core::config::Config;
use memstore_core::embeddings::EmbeddingClient;
use memstore_core::error::{ErrorKind, ServiceError};
use memstore_core::ingest::DocumentIngestor;
use memstore_core::lifecycle::LifecycleEngine;
use memstore_core::model::{CreateMemoryInput, MemoryRecord, PatchMemoryInput, RelationType};
use memstore_core::records::RecordManager;
use memstore_core::relationships::{self, AutoLinker};
use memstore_core::retrieval::{HybridRetriever, SearchQuery};
use memstore_core::stores::{Filter, GraphStoreClient};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub struct AppState {
    pub records: Arc<RecordManager>,
    pub retriever: Arc<HybridRetriever>,
    pub graph: Option<Arc<dyn GraphStoreClient>>,
    pub auto_linker: Option<Arc<AutoLinker>>,
    pub lifecycle: Arc<LifecycleEngine>,
    pub embeddings: Arc<dyn EmbeddingClient>,
    pub config: Config,
    pub started_at: DateTime<Utc>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/memories", post(create_memory).get(list_memories))
        .route("/memories/search", post(search_memories))
        .route("/memories/link", post(link_memories))
        .route("/memories/{id}", get(get_memory).patch(patch_memory).delete(delete_memory))
        .route("/memories/{id}/related", get(related_memories))
        .route("/health", get(health))
        .route("/config", get(config_summary))
        .route("/stats", get(stats))
        .route("/graph/stats", get(graph_stats))
        .with_state(state)
}

/// One error entry in the envelope's `errors` array: a stable `type` tag
/// plus a human-readable `message` (§4.8).
#[derive(Serialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: ErrorKind,
    message: String,
}

/// Service identification carried on every response so a caller juggling
/// several tools can tell which one answered (§4.8, §7).
#[derive(Serialize)]
struct ResponseMeta {
    service: &'static str,
    version: &'static str,
    timestamp: DateTime<Utc>,
}

impl Default for ResponseMeta {
    fn default() -> Self {
        Self {
            service: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            timestamp: Utc::now(),
        }
    }
}

/// Uniform response envelope (§4.8): `data` is present on success,
/// `errors` on failure; never both populated.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<ErrorDetail>,
    meta: ResponseMeta,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), errors: vec![], meta: ResponseMeta::default() }
    }
}

struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::DependencyUnavailable => StatusCode::BAD_GATEWAY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            errors: vec![ErrorDetail { kind: self.0.kind(), message: self.0.to_string() }],
            meta: ResponseMeta::default(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Serialize)]
struct CreatedMemory {
    id: String,
    memory: MemoryRecord,
    auto_linked: Vec<AutoLinkedRelation>,
}

#[derive(Serialize)]
struct AutoLinkedRelation {
    target_id: String,
    relation_type: RelationType,
}

async fn create_memory(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreateMemoryInput>,
) -> ApiResult<CreatedMemory> {
    let record = state.records.upsert(input).await?;

    let auto_linked = match &state.auto_linker {
        Some(linker) => linker
            .auto_link(&record)
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|(target_id, relation_type)| AutoLinkedRelation { target_id, relation_type })
            .collect(),
        None => vec![],
    };

    Ok(Json(ApiResponse::ok(CreatedMemory { id: record.id.clone(), memory: record, auto_linked })))
}

async fn patch_memory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<PatchMemoryInput>,
) -> ApiResult<MemoryRecord> {
    let record = state.records.patch(&id, patch).await?;
    Ok(Json(ApiResponse::ok(record)))
}

async fn delete_memory(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<()> {
    state.records.delete(&id).await?;
    Ok(Json(ApiResponse::ok(())))
}

async fn get_memory(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<MemoryRecord> {
    let record = state.records.get(&id).await?;
    Ok(Json(ApiResponse::ok(record)))
}

#[derive(Deserialize)]
struct ListQuery {
    limit: Option<u32>,
    offset: Option<String>,
}

#[derive(Serialize)]
struct ListPage {
    memories: Vec<MemoryRecord>,
    next_offset: Option<String>,
}

async fn list_memories(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<ListPage> {
    let limit = query.limit.unwrap_or(50).min(500);
    let (memories, next_offset) = state.records.list(limit, query.offset).await?;
    Ok(Json(ApiResponse::ok(ListPage { memories, next_offset })))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SearchInput {
    query: String,
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    memory_type: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default = "default_alpha")]
    alpha: f32,
    #[serde(default = "default_true")]
    rerank: bool,
    #[serde(default = "default_true")]
    use_planner: bool,
}

fn default_limit() -> usize {
    10
}
fn default_alpha() -> f32 {
    0.5
}
fn default_true() -> bool {
    true
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchResultItem>,
    degraded: bool,
    limit_clamped: bool,
}

#[derive(Serialize)]
struct SearchResultItem {
    id: String,
    score: f32,
    strategy: Option<String>,
    payload: serde_json::Value,
}

async fn search_memories(
    State(state): State<Arc<AppState>>,
    Json(input): Json<SearchInput>,
) -> ApiResult<SearchResponse> {
    let query = SearchQuery {
        text: input.query,
        filter: Filter {
            project: input.project,
            memory_type: input.memory_type,
            tags_all: input.tags,
            source: input.source,
            created_after: None,
            created_before: None,
        },
        limit: input.limit,
        alpha: input.alpha,
        rerank: input.rerank,
        use_planner: input.use_planner,
    };

    let outcome = state.retriever.search(&query).await?;
    let results = outcome
        .hits
        .into_iter()
        .map(|h| SearchResultItem {
            id: h.id,
            score: h.score,
            strategy: h.strategy,
            payload: serde_json::to_value(h.payload).unwrap_or_default(),
        })
        .collect();

    Ok(Json(ApiResponse::ok(SearchResponse {
        results,
        degraded: outcome.degraded,
        limit_clamped: outcome.limit_clamped,
    })))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct LinkInput {
    source_id: String,
    target_id: String,
    relation_type: RelationType,
}

async fn link_memories(State(state): State<Arc<AppState>>, Json(input): Json<LinkInput>) -> ApiResult<()> {
    let graph = state
        .graph
        .as_ref()
        .ok_or_else(|| ServiceError::Validation("graph store not configured".to_string()))?;
    relationships::link(graph.as_ref(), &input.source_id, &input.target_id, input.relation_type).await?;
    Ok(Json(ApiResponse::ok(())))
}

#[derive(Deserialize)]
struct RelatedQuery {
    max_hops: Option<u32>,
    limit: Option<usize>,
}

async fn related_memories(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<RelatedQuery>,
) -> ApiResult<memstore_core::stores::TraversalResult> {
    let graph = state
        .graph
        .as_ref()
        .ok_or_else(|| ServiceError::Validation("graph store not configured".to_string()))?;
    let result = relationships::related(
        graph.as_ref(),
        &id,
        query.max_hops.unwrap_or(2),
        query.limit.unwrap_or(50),
    )
    .await?;
    Ok(Json(ApiResponse::ok(result)))
}

#[derive(Serialize)]
struct HealthStatus {
    status: &'static str,
    uptime_seconds: i64,
    graph_store_configured: bool,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthStatus>> {
    let uptime_seconds = (Utc::now() - state.started_at).num_seconds();
    Json(ApiResponse::ok(HealthStatus {
        status: "ok",
        uptime_seconds,
        graph_store_configured: state.graph.is_some(),
    }))
}

#[derive(Serialize)]
struct ConfigSummary {
    composite_embedding: bool,
    sparse_enabled: bool,
    prune_default_days: i64,
    auto_link_top_k: usize,
    embedding: memstore_core::embeddings::EmbeddingConfig,
}

async fn config_summary(State(state): State<Arc<AppState>>) -> Json<ApiResponse<ConfigSummary>> {
    Json(ApiResponse::ok(ConfigSummary {
        composite_embedding: state.config.composite_embedding,
        sparse_enabled: state.config.sparse_enabled,
        prune_default_days: state.config.prune_default_days,
        auto_link_top_k: state.config.auto_link_top_k,
        embedding: state.embeddings.config(),
    }))
}

#[derive(Serialize)]
struct ServiceStats {
    memory_count: usize,
}

async fn stats(State(state): State<Arc<AppState>>) -> ApiResult<ServiceStats> {
    let (page, mut next) = state.records.list(500, None).await?;
    let mut memory_count = page.len();
    while let Some(cursor) = next {
        let (page, more) = state.records.list(500, Some(cursor)).await?;
        memory_count += page.len();
        next = more;
    }
    Ok(Json(ApiResponse::ok(ServiceStats { memory_count })))
}

async fn graph_stats(
    State(state): State<Arc<AppState>>,
) -> ApiResult<memstore_core::stores::GraphStats> {
    let graph = state
        .graph
        .as_ref()
        .ok_or_else(|| ServiceError::Validation("graph store not configured".to_string()))?;
    let stats = graph.stats().await?;
    Ok(Json(ApiResponse::ok(stats)))
}

/// Spawns the background lifecycle sweep and ingestor poll loops. Both are
/// best-effort: a panic-free failure in either never brings down the HTTP
/// surface serving requests (§5 concurrency model).
pub fn spawn_background_tasks(
    lifecycle: Arc<LifecycleEngine>,
    ingestor: Option<Arc<DocumentIngestor>>,
    sweep_interval: std::time::Duration,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            match lifecycle.prune(None, true).await {
                Ok(report) => tracing::info!(
                    candidates = report.candidate_ids.len(),
                    "lifecycle sweep complete (dry run)"
                ),
                Err(err) => tracing::warn!(error = %err, "lifecycle sweep failed"),
            }
        }
    });

    if let Some(ingestor) = ingestor {
        tokio::spawn(async move {
            ingestor.run_poll_loop().await;
        });
    }
}
