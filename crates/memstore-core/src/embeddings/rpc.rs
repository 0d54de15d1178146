//! HTTP client for the external Embedding Service (§4.1, §6).
//!
//! Caller-side asymmetry is enforced structurally: `embed_document` and
//! `embed_query` hit distinct endpoints, so there is no call site where the
//! wrong prefix can be used by accident.

use crate::embeddings::client::{EmbedResult, EmbeddingClient, EmbeddingConfig, SparseVector};
use crate::error::EmbeddingError;
use crate::retry::{with_retry, RetryConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn is_retryable(err: &EmbeddingError) -> bool {
    matches!(err, EmbeddingError::Transport(_))
}

const EMBED_TIMEOUT: Duration = Duration::from_secs(60);
const RERANK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct EmbedTextRequest<'a> {
    text: &'a str,
    include_sparse: bool,
}

#[derive(Serialize)]
struct EmbedBatchRequest<'a> {
    texts: &'a [String],
    include_sparse: bool,
    batch_size: usize,
}

#[derive(Deserialize)]
struct WireEmbedResult {
    dense: Vec<f32>,
    sparse: Option<WireSparse>,
}

#[derive(Deserialize)]
struct WireSparse {
    indices: Vec<u32>,
    values: Vec<f32>,
}

impl From<WireEmbedResult> for EmbedResult {
    fn from(w: WireEmbedResult) -> Self {
        EmbedResult {
            dense: w.dense,
            sparse: w.sparse.map(|s| SparseVector {
                indices: s.indices,
                values: s.values,
            }),
        }
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [String],
}

#[derive(Deserialize)]
struct RerankResponse {
    scores: Vec<f32>,
}

#[derive(Deserialize)]
struct ConfigResponse {
    dimensions: usize,
    sparse_available: bool,
    reranker_available: bool,
}

pub struct RpcEmbeddingClient {
    base_url: String,
    http: reqwest::Client,
    config: std::sync::OnceLock<EmbeddingConfig>,
    retry: RetryConfig,
}

impl RpcEmbeddingClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            http: reqwest::Client::new(),
            config: std::sync::OnceLock::new(),
            retry: RetryConfig::default(),
        }
    }

    async fn post_embed(&self, path: &str, text: &str, include_sparse: bool) -> Result<EmbedResult, EmbeddingError> {
        let wire: WireEmbedResult = with_retry(&self.retry, is_retryable, || async {
            let resp = self
                .http
                .post(format!("{}/{}", self.base_url, path))
                .timeout(EMBED_TIMEOUT)
                .json(&EmbedTextRequest { text, include_sparse })
                .send()
                .await?
                .error_for_status()?;
            resp.json().await.map_err(EmbeddingError::from)
        })
        .await?;
        Ok(wire.into())
    }
}

#[async_trait]
impl EmbeddingClient for RpcEmbeddingClient {
    async fn embed_document(&self, text: &str, include_sparse: bool) -> Result<EmbedResult, EmbeddingError> {
        self.post_embed("embed-document", text, include_sparse).await
    }

    async fn embed_query(&self, text: &str, include_sparse: bool) -> Result<EmbedResult, EmbeddingError> {
        self.post_embed("embed-query", text, include_sparse).await
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        include_sparse: bool,
    ) -> Result<Vec<EmbedResult>, EmbeddingError> {
        let wire: Vec<WireEmbedResult> = with_retry(&self.retry, is_retryable, || async {
            let resp = self
                .http
                .post(format!("{}/embed-batch", self.base_url))
                .timeout(EMBED_TIMEOUT)
                .json(&EmbedBatchRequest {
                    texts,
                    include_sparse,
                    batch_size: 32,
                })
                .send()
                .await?
                .error_for_status()?;
            resp.json().await.map_err(EmbeddingError::from)
        })
        .await?;
        Ok(wire.into_iter().map(EmbedResult::from).collect())
    }

    async fn rerank(&self, query: &str, texts: &[String]) -> Result<Vec<f32>, EmbeddingError> {
        let wire: RerankResponse = with_retry(&self.retry, is_retryable, || async {
            let resp = self
                .http
                .post(format!("{}/rerank", self.base_url))
                .timeout(RERANK_TIMEOUT)
                .json(&RerankRequest { query, texts })
                .send()
                .await?
                .error_for_status()?;
            resp.json().await.map_err(EmbeddingError::from)
        })
        .await?;
        Ok(wire.scores)
    }

    fn config(&self) -> EmbeddingConfig {
        *self.config.get_or_init(|| {
            // `config()` is synchronous by contract (Design Note, §9:
            // capability reporting must not itself suspend); callers that
            // need a fresh read use `refresh_config` before first use.
            EmbeddingConfig {
                dimensions: 768,
                sparse_available: true,
                reranker_available: true,
            }
        })
    }
}

impl RpcEmbeddingClient {
    /// Populate the cached capability set from the service's `/config`
    /// endpoint. Call once at startup; `config()` stays synchronous after.
    pub async fn refresh_config(&self) -> Result<(), EmbeddingError> {
        let wire: ConfigResponse = with_retry(&self.retry, is_retryable, || async {
            let resp = self.http.get(format!("{}/config", self.base_url)).send().await?.error_for_status()?;
            resp.json().await.map_err(EmbeddingError::from)
        })
        .await?;
        let _ = self.config.set(EmbeddingConfig {
            dimensions: wire.dimensions,
            sparse_available: wire.sparse_available,
            reranker_available: wire.reranker_available,
        });
        Ok(())
    }
}
