//! External store contracts (§6): Vector Store and Graph Store. Both are
//! treated as black-box dependencies — the core holds no authoritative
//! state of its own beyond the ingestor's state file (§5).

mod graph;
mod vector;

pub use graph::{GraphStats, GraphStoreClient, HttpGraphStoreClient, TraversalEdge, TraversalResult};
pub use vector::{
    Filter, HybridSearchHit, Point, QdrantVectorStoreClient, ScrollPage, VectorStoreClient,
};
