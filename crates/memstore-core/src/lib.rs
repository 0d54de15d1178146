//! # memstore-core
//!
//! Long-term semantic memory store for AI coding agents: hybrid dense/sparse
//! retrieval with RRF fusion and reranking, a typed relationship graph with
//! auto-linking, a lifecycle engine (staleness, pruning, dedup, re-embedding),
//! and a continuous document ingestor. The Vector Store, Graph Store, and
//! Embedding Service are external dependencies reached through the traits in
//! [`stores`] and [`embeddings`]; this crate holds no authoritative state of
//! its own beyond the ingestor's state file.

pub mod config;
pub mod embeddings;
pub mod error;
pub mod ingest;
pub mod lifecycle;
pub mod model;
pub mod quality;
pub mod records;
pub mod relationships;
pub mod retrieval;
pub mod retry;
pub mod stores;

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::embeddings::{EmbeddingBackend, EmbeddingClient};
    pub use crate::error::{ErrorKind, ServiceError};
    pub use crate::model::{CreateMemoryInput, MemoryRecord, MemoryType, PatchMemoryInput, RelationType};
    pub use crate::records::RecordManager;
    pub use crate::retrieval::{HybridRetriever, SearchOutcome, SearchQuery};
    pub use crate::stores::{GraphStoreClient, VectorStoreClient};
}
