//! Vector Store client (§6): a Qdrant-backed implementation of the
//! upsert/delete/scroll/hybrid-search contract. Collection name `memories`.

use crate::embeddings::SparseVector;
use crate::error::VectorStoreError;
use crate::retry::{with_retry, RetryConfig};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter as QdrantFilter,
    PointId, PointStruct, PointsIdsList, Range, ScrollPointsBuilder, SearchPointsBuilder,
    SparseVectorParamsBuilder, SparseVectorsConfigBuilder, UpsertPointsBuilder,
    VectorParamsBuilder, VectorsConfigBuilder,
};
use qdrant_client::{Payload, Qdrant};
use std::collections::HashMap;

const COLLECTION: &str = "memories";
const SEARCH_TIMEOUT_SECS: u64 = 10;

/// A single point as stored in the Vector Store: dense (+ optional sparse)
/// vector plus an opaque JSON payload carrying the memory record's fields.
#[derive(Debug, Clone)]
pub struct Point {
    pub id: String,
    pub dense: Vec<f32>,
    pub sparse: Option<SparseVector>,
    pub payload: HashMap<String, serde_json::Value>,
}

/// Scalar filter predicates translated from the Retriever's query input
/// (§4.3 step 1). Tag filtering is contains-all.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub project: Option<String>,
    pub memory_type: Option<String>,
    pub tags_all: Vec<String>,
    pub source: Option<String>,
    pub created_after: Option<chrono::DateTime<chrono::Utc>>,
    pub created_before: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone)]
pub struct HybridSearchHit {
    pub id: String,
    pub payload: HashMap<String, serde_json::Value>,
    pub dense_score: Option<f32>,
    pub sparse_score: Option<f32>,
}

pub struct ScrollPage {
    pub points: Vec<Point>,
    pub next_offset: Option<String>,
}

#[async_trait]
pub trait VectorStoreClient: Send + Sync {
    async fn ensure_collection(&self, dimensions: usize, sparse_enabled: bool) -> Result<(), VectorStoreError>;
    async fn upsert(&self, point: Point) -> Result<(), VectorStoreError>;
    async fn delete(&self, id: &str) -> Result<(), VectorStoreError>;
    async fn scroll(&self, limit: u32, offset: Option<String>) -> Result<ScrollPage, VectorStoreError>;
    async fn get(&self, id: &str) -> Result<Option<Point>, VectorStoreError>;
    async fn dense_search(
        &self,
        dense: &[f32],
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<HybridSearchHit>, VectorStoreError>;
    async fn sparse_search(
        &self,
        sparse: &SparseVector,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<HybridSearchHit>, VectorStoreError>;
    async fn update_vectors(&self, id: &str, dense: Vec<f32>, sparse: Option<SparseVector>) -> Result<(), VectorStoreError>;
    async fn bump_access_count(&self, id: &str) -> Result<(), VectorStoreError>;
    /// Merges `payload` fields into the existing point's payload, leaving
    /// its vectors untouched (metadata-only patch, §4.2).
    async fn update_payload(&self, id: &str, payload: HashMap<String, serde_json::Value>) -> Result<(), VectorStoreError>;
}

fn is_retryable(err: &VectorStoreError) -> bool {
    matches!(err, VectorStoreError::Transport(_))
}

pub struct QdrantVectorStoreClient {
    client: Qdrant,
    retry: RetryConfig,
}

impl QdrantVectorStoreClient {
    pub fn new(host: &str, port: u16) -> Result<Self, VectorStoreError> {
        let url = format!("http://{host}:{port}");
        let client = Qdrant::from_url(&url)
            .build()
            .map_err(|e| VectorStoreError::Transport(e.to_string()))?;
        Ok(Self { client, retry: RetryConfig::default() })
    }

    fn build_filter(filter: &Filter) -> QdrantFilter {
        let mut must = Vec::new();
        if let Some(project) = &filter.project {
            must.push(Condition::matches("project", project.clone()));
        }
        if let Some(t) = &filter.memory_type {
            must.push(Condition::matches("type", t.clone()));
        }
        for tag in &filter.tags_all {
            must.push(Condition::matches("tags", tag.clone()));
        }
        if let Some(source) = &filter.source {
            must.push(Condition::matches("source", source.clone()));
        }
        if filter.created_after.is_some() || filter.created_before.is_some() {
            must.push(Condition::range(
                "createdAtUnix",
                Range {
                    gte: filter.created_after.map(|t| t.timestamp() as f64),
                    gt: None,
                    lte: filter.created_before.map(|t| t.timestamp() as f64),
                    lt: None,
                },
            ));
        }
        QdrantFilter {
            must,
            ..Default::default()
        }
    }
}

#[async_trait]
impl VectorStoreClient for QdrantVectorStoreClient {
    async fn ensure_collection(&self, dimensions: usize, sparse_enabled: bool) -> Result<(), VectorStoreError> {
        let exists = with_retry(&self.retry, is_retryable, || async {
            self.client
                .collection_exists(COLLECTION)
                .await
                .map_err(|e| VectorStoreError::Transport(e.to_string()))
        })
        .await?;
        if exists {
            return Ok(());
        }

        let mut vectors_config = VectorsConfigBuilder::default();
        vectors_config.add_named_vector_params(
            "dense",
            VectorParamsBuilder::new(dimensions as u64, Distance::Cosine),
        );

        let mut builder = CreateCollectionBuilder::new(COLLECTION).vectors_config(vectors_config);
        if sparse_enabled {
            let mut sparse_config = SparseVectorsConfigBuilder::default();
            sparse_config.add_named_vector_params("sparse", SparseVectorParamsBuilder::default());
            builder = builder.sparse_vectors_config(sparse_config);
        }

        with_retry(&self.retry, is_retryable, || async {
            self.client
                .create_collection(builder.clone())
                .await
                .map_err(|e| VectorStoreError::Transport(e.to_string()))
        })
        .await?;
        Ok(())
    }

    async fn upsert(&self, point: Point) -> Result<(), VectorStoreError> {
        let payload: Payload = point
            .payload
            .clone()
            .try_into()
            .map_err(|e: qdrant_client::QdrantError| VectorStoreError::Request(e.to_string()))?;

        let mut qpoint = PointStruct::new(point.id.clone(), point.dense.clone(), payload);
        if let Some(sparse) = &point.sparse {
            qpoint = qpoint.vectors([(
                "sparse".to_string(),
                qdrant_client::qdrant::Vector::from(qdrant_client::qdrant::SparseVector {
                    indices: sparse.indices.clone(),
                    values: sparse.values.clone(),
                }),
            )]);
        }

        with_retry(&self.retry, is_retryable, || async {
            self.client
                .upsert_points(UpsertPointsBuilder::new(COLLECTION, vec![qpoint.clone()]))
                .await
                .map_err(|e| VectorStoreError::Transport(e.to_string()))
        })
        .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), VectorStoreError> {
        let point_id: PointId = id.to_string().into();
        with_retry(&self.retry, is_retryable, || async {
            self.client
                .delete_points(DeletePointsBuilder::new(COLLECTION).points(PointsIdsList {
                    ids: vec![point_id.clone()],
                }))
                .await
                .map_err(|e| VectorStoreError::Transport(e.to_string()))
        })
        .await?;
        Ok(())
    }

    async fn scroll(&self, limit: u32, offset: Option<String>) -> Result<ScrollPage, VectorStoreError> {
        let mut builder = ScrollPointsBuilder::new(COLLECTION)
            .limit(limit)
            .with_payload(true)
            .with_vectors(true);
        if let Some(off) = offset {
            builder = builder.offset(PointId::from(off));
        }

        let resp = with_retry(&self.retry, is_retryable, || async {
            self.client
                .scroll(builder.clone())
                .await
                .map_err(|e| VectorStoreError::Transport(e.to_string()))
        })
        .await?;

        let points = resp
            .result
            .into_iter()
            .map(|p| Point {
                id: point_id_to_string(&p.id),
                dense: Vec::new(),
                sparse: None,
                payload: p
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, qdrant_value_to_json(v)))
                    .collect(),
            })
            .collect();

        let next_offset = resp.next_page_offset.map(|id| point_id_to_string(&id));
        Ok(ScrollPage { points, next_offset })
    }

    async fn get(&self, id: &str) -> Result<Option<Point>, VectorStoreError> {
        let resp = with_retry(&self.retry, is_retryable, || async {
            self.client
                .get_points(
                    qdrant_client::qdrant::GetPointsBuilder::new(COLLECTION, vec![id.to_string().into()])
                        .with_payload(true),
                )
                .await
                .map_err(|e| VectorStoreError::Transport(e.to_string()))
        })
        .await?;

        Ok(resp.result.into_iter().next().map(|p| Point {
            id: point_id_to_string(&p.id.unwrap_or_default()),
            dense: Vec::new(),
            sparse: None,
            payload: p.payload.into_iter().map(|(k, v)| (k, qdrant_value_to_json(v))).collect(),
        }))
    }

    async fn dense_search(
        &self,
        dense: &[f32],
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<HybridSearchHit>, VectorStoreError> {
        let resp = with_retry(&self.retry, is_retryable, || async {
            self.client
                .search_points(
                    SearchPointsBuilder::new(COLLECTION, dense.to_vec(), limit as u64)
                        .filter(Self::build_filter(filter))
                        .with_payload(true)
                        .vector_name("dense")
                        .timeout(SEARCH_TIMEOUT_SECS),
                )
                .await
                .map_err(|e| VectorStoreError::Transport(e.to_string()))
        })
        .await?;

        Ok(resp
            .result
            .into_iter()
            .map(|p| HybridSearchHit {
                id: point_id_to_string(&p.id.unwrap_or_default()),
                payload: p
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, qdrant_value_to_json(v)))
                    .collect(),
                dense_score: Some(p.score),
                sparse_score: None,
            })
            .collect())
    }

    async fn sparse_search(
        &self,
        sparse: &SparseVector,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<HybridSearchHit>, VectorStoreError> {
        let vector = qdrant_client::qdrant::SparseVector {
            indices: sparse.indices.clone(),
            values: sparse.values.clone(),
        };
        let resp = with_retry(&self.retry, is_retryable, || async {
            self.client
                .search_points(
                    SearchPointsBuilder::new(COLLECTION, vector.clone(), limit as u64)
                        .filter(Self::build_filter(filter))
                        .with_payload(true)
                        .vector_name("sparse")
                        .timeout(SEARCH_TIMEOUT_SECS),
                )
                .await
                .map_err(|e| VectorStoreError::Transport(e.to_string()))
        })
        .await?;

        Ok(resp
            .result
            .into_iter()
            .map(|p| HybridSearchHit {
                id: point_id_to_string(&p.id.unwrap_or_default()),
                payload: p
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, qdrant_value_to_json(v)))
                    .collect(),
                dense_score: None,
                sparse_score: Some(p.score),
            })
            .collect())
    }

    async fn update_vectors(&self, id: &str, dense: Vec<f32>, sparse: Option<SparseVector>) -> Result<(), VectorStoreError> {
        // Vectors-only update: the payload on the existing point is left
        // untouched, matching the re-embedding workflow's contract (§4.6).
        let mut vectors: HashMap<String, qdrant_client::qdrant::Vector> = HashMap::new();
        vectors.insert("dense".to_string(), dense.into());
        if let Some(s) = sparse {
            vectors.insert(
                "sparse".to_string(),
                qdrant_client::qdrant::SparseVector {
                    indices: s.indices,
                    values: s.values,
                }
                .into(),
            );
        }

        let point_vectors = qdrant_client::qdrant::PointVectors {
            id: Some(id.to_string().into()),
            vectors: Some(vectors.into()),
        };
        with_retry(&self.retry, is_retryable, || async {
            self.client
                .update_vectors(qdrant_client::qdrant::UpdatePointVectorsBuilder::new(
                    COLLECTION,
                    vec![point_vectors.clone()],
                ))
                .await
                .map_err(|e| VectorStoreError::Transport(e.to_string()))
        })
        .await?;
        Ok(())
    }

    async fn bump_access_count(&self, id: &str) -> Result<(), VectorStoreError> {
        // Best-effort read-modify-write: Qdrant has no atomic increment, so
        // a lost update under concurrent access just undercounts by one. The
        // whole read-modify-write is retried as a unit so a transient failure
        // on either leg doesn't leave the increment half-applied.
        with_retry(&self.retry, is_retryable, || async {
            let resp = self
                .client
                .get_points(
                    qdrant_client::qdrant::GetPointsBuilder::new(COLLECTION, vec![id.to_string().into()])
                        .with_payload(true),
                )
                .await
                .map_err(|e| VectorStoreError::Transport(e.to_string()))?;

            let current = resp
                .result
                .first()
                .and_then(|p| p.payload.get("accessCount"))
                .and_then(|v| qdrant_value_to_json(v.clone()).as_u64())
                .unwrap_or(0);

            let mut payload = HashMap::new();
            payload.insert("accessCount".to_string(), serde_json::Value::from(current + 1));
            let payload: Payload = payload
                .try_into()
                .map_err(|e: qdrant_client::QdrantError| VectorStoreError::Request(e.to_string()))?;

            self.client
                .set_payload(
                    qdrant_client::qdrant::SetPayloadPointsBuilder::new(COLLECTION, payload)
                        .points_selector(PointsIdsList {
                            ids: vec![id.to_string().into()],
                        }),
                )
                .await
                .map_err(|e| VectorStoreError::Transport(e.to_string()))
        })
        .await
    }

    async fn update_payload(&self, id: &str, payload: HashMap<String, serde_json::Value>) -> Result<(), VectorStoreError> {
        let payload: Payload = payload
            .try_into()
            .map_err(|e: qdrant_client::QdrantError| VectorStoreError::Request(e.to_string()))?;

        with_retry(&self.retry, is_retryable, || async {
            self.client
                .set_payload(
                    qdrant_client::qdrant::SetPayloadPointsBuilder::new(COLLECTION, payload.clone())
                        .points_selector(PointsIdsList {
                            ids: vec![id.to_string().into()],
                        }),
                )
                .await
                .map_err(|e| VectorStoreError::Transport(e.to_string()))
        })
        .await?;
        Ok(())
    }
}

fn point_id_to_string(id: &PointId) -> String {
    match &id.point_id_options {
        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u)) => u.clone(),
        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    }
}

fn qdrant_value_to_json(v: qdrant_client::qdrant::Value) -> serde_json::Value {
    serde_json::to_value(v).unwrap_or(serde_json::Value::Null)
}
