//! Error types for every subsystem boundary.
//!
//! Each subsystem owns a `thiserror` enum; `ServiceError` composes them via
//! `#[from]` so handlers can propagate with `?` regardless of which layer
//! failed. `ErrorKind` is the stable tag surfaced in the HTTP envelope.

use thiserror::Error;

/// Stable classification surfaced to callers. Never renamed once shipped —
/// clients match on this, not on the error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorKind {
    Validation,
    NotFound,
    DependencyUnavailable,
    Internal,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EmbeddingError {
    #[error("embedding model not initialized: {0}")]
    ModelInit(String),
    #[error("embedding request failed: {0}")]
    Failed(String),
    #[error("invalid embedding input: {0}")]
    InvalidInput(String),
    #[error("embedding RPC transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VectorStoreError {
    #[error("vector store request failed: {0}")]
    Request(String),
    #[error("point not found: {0}")]
    NotFound(String),
    #[error("vector store transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GraphStoreError {
    #[error("graph store request failed: {0}")]
    Request(String),
    #[error("node not found: {0}")]
    NotFound(String),
    #[error("graph store disabled")]
    Disabled,
    #[error("graph store transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    VectorStore(#[from] VectorStoreError),
    #[error(transparent)]
    GraphStore(#[from] GraphStoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Validation(_) => ErrorKind::Validation,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Embedding(_) | ServiceError::VectorStore(_) | ServiceError::GraphStore(_) => {
                ErrorKind::DependencyUnavailable
            }
            ServiceError::Internal(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
