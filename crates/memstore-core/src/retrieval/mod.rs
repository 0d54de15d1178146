//! Search subsystem (§4.3, §4.4): fusion, reranking, multi-query planning,
//! and the `HybridRetriever` that wires them together over the external
//! Embedding Service and Vector Store.

mod fusion;
mod planner;
mod reranker;
mod retriever;

pub use fusion::{reciprocal_rank_fusion, RRF_K};
pub use planner::{merge_strategy_hits, plan_strategies, Strategy, StrategyHit};
pub use reranker::{apply_scores, bm25_term_overlap_scores, RerankedResult};
pub use retriever::{HybridRetriever, SearchHit, SearchOutcome, SearchQuery};
