//! The embedding service contract (§4.1) and its backend sum type (§9).

use crate::error::EmbeddingError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Lexical sparse vector: parallel index/value arrays.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct EmbedResult {
    pub dense: Vec<f32>,
    pub sparse: Option<SparseVector>,
}

/// Which optional capabilities the active backend reports as enabled.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EmbeddingConfig {
    pub dimensions: usize,
    pub sparse_available: bool,
    pub reranker_available: bool,
}

/// The embedding service's four operations (§4.1). Both `EmbeddingBackend`
/// variants implement this so callers never branch on which one is active.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed_document(&self, text: &str, include_sparse: bool) -> Result<EmbedResult, EmbeddingError>;
    async fn embed_query(&self, text: &str, include_sparse: bool) -> Result<EmbedResult, EmbeddingError>;
    async fn embed_batch(
        &self,
        texts: &[String],
        include_sparse: bool,
    ) -> Result<Vec<EmbedResult>, EmbeddingError>;
    async fn rerank(&self, query: &str, texts: &[String]) -> Result<Vec<f32>, EmbeddingError>;
    fn config(&self) -> EmbeddingConfig;
}

/// Sum type selected once at startup from `Config` (Design Note, §9):
/// either an HTTP RPC client against the external Embedding Service, or an
/// in-process local model used as a fallback when no URL is configured.
pub enum EmbeddingBackend {
    Rpc(crate::embeddings::rpc::RpcEmbeddingClient),
    InProcess(crate::embeddings::local::LocalEmbeddingClient),
}

#[async_trait]
impl EmbeddingClient for EmbeddingBackend {
    async fn embed_document(&self, text: &str, include_sparse: bool) -> Result<EmbedResult, EmbeddingError> {
        match self {
            EmbeddingBackend::Rpc(c) => c.embed_document(text, include_sparse).await,
            EmbeddingBackend::InProcess(c) => c.embed_document(text, include_sparse).await,
        }
    }

    async fn embed_query(&self, text: &str, include_sparse: bool) -> Result<EmbedResult, EmbeddingError> {
        match self {
            EmbeddingBackend::Rpc(c) => c.embed_query(text, include_sparse).await,
            EmbeddingBackend::InProcess(c) => c.embed_query(text, include_sparse).await,
        }
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        include_sparse: bool,
    ) -> Result<Vec<EmbedResult>, EmbeddingError> {
        match self {
            EmbeddingBackend::Rpc(c) => c.embed_batch(texts, include_sparse).await,
            EmbeddingBackend::InProcess(c) => c.embed_batch(texts, include_sparse).await,
        }
    }

    async fn rerank(&self, query: &str, texts: &[String]) -> Result<Vec<f32>, EmbeddingError> {
        match self {
            EmbeddingBackend::Rpc(c) => c.rerank(query, texts).await,
            EmbeddingBackend::InProcess(c) => c.rerank(query, texts).await,
        }
    }

    fn config(&self) -> EmbeddingConfig {
        match self {
            EmbeddingBackend::Rpc(c) => c.config(),
            EmbeddingBackend::InProcess(c) => c.config(),
        }
    }
}

impl EmbeddingBackend {
    pub fn from_config(config: &crate::config::Config) -> Self {
        match &config.embedding_service_url {
            Some(url) => EmbeddingBackend::Rpc(crate::embeddings::rpc::RpcEmbeddingClient::new(url.clone())),
            None => EmbeddingBackend::InProcess(crate::embeddings::local::LocalEmbeddingClient::new()),
        }
    }
}
