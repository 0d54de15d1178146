//! Embedding backend: the external Embedding Service contract (§4.1) and
//! its in-process fallback, selected once at startup via `EmbeddingBackend`.

mod cache;
mod client;
mod composite;
mod local;
mod rpc;

pub use cache::EmbeddingCache;
pub use client::{EmbedResult, EmbeddingBackend, EmbeddingClient, EmbeddingConfig, SparseVector};
pub use composite::embed_record;
pub use local::{cosine_similarity, LocalEmbeddingClient, EMBEDDING_DIMENSIONS};
pub use rpc::RpcEmbeddingClient;
