//! Round-trip and boundary-condition invariants that don't need a full
//! scenario to exercise: payload round-tripping, score clamping, and the
//! quality gate and self-loop rejections that guard record mutation.

mod support;

use memstore_core::config::Config;
use memstore_core::lifecycle::staleness_score;
use memstore_core::model::{CreateMemoryInput, MemoryType, RelationType};
use memstore_core::records::RecordManager;
use memstore_core::relationships::link;
use memstore_core::retrieval::reciprocal_rank_fusion;
use memstore_core::stores::{GraphStoreClient, Point, VectorStoreClient};
use std::sync::Arc;
use support::{memory_payload, FakeEmbeddingClient, InMemoryGraphStore, InMemoryVectorStore};

/// Seeds a point built from a raw JSON payload (bypassing `MemoryRecord`'s
/// struct literal, which this crate can't use since the type is
/// `#[non_exhaustive]`) and reads it back as a real `MemoryRecord` through
/// `RecordManager::get`.
async fn seeded_record(
    memory_type: &str,
    content: &str,
    age_days: i64,
    access_count: u64,
    usefulness_score: f32,
) -> memstore_core::model::MemoryRecord {
    let embeddings = Arc::new(FakeEmbeddingClient::new());
    let vectors = Arc::new(InMemoryVectorStore::new());
    let records = RecordManager::new(embeddings, vectors.clone(), None, Config::default());

    let now = chrono::Utc::now();
    let at = now - chrono::Duration::days(age_days);
    let id = uuid::Uuid::new_v4().to_string();
    let payload = memory_payload(memory_type, content, at, at, access_count, usefulness_score);
    vectors.upsert(Point { id: id.clone(), dense: vec![0.0; 8], sparse: None, payload }).await.expect("seed point");

    records.get(&id).await.expect("record should read back")
}

#[tokio::test]
async fn payload_round_trip_preserves_every_field_through_the_vector_store() {
    let record = seeded_record(
        "learning",
        "a record with enough content to clear the quality gate easily",
        5,
        7,
        0.42,
    )
    .await;

    assert_eq!(record.memory_type, MemoryType::Learning);
    assert_eq!(record.content, "a record with enough content to clear the quality gate easily");
    assert_eq!(record.access_count, 7);
    assert_eq!(record.usefulness_score, 0.42);
    assert!(record.tags.is_empty());
    assert!(record.relations.is_empty());
    assert!(!record.pinned);
    assert!(!record.resolved);
}

#[tokio::test]
async fn staleness_score_is_clamped_to_one_hundred_for_extreme_inputs() {
    let ancient_unused_docs = seeded_record("docs", "x".repeat(30).as_str(), 100_000, 0, 0.0).await;
    let score = staleness_score(&ancient_unused_docs, chrono::Utc::now());
    assert!((0.0..=100.0).contains(&score));
    assert_eq!(score, 100.0);
}

#[tokio::test]
async fn staleness_score_never_goes_negative_for_a_brand_new_well_used_record() {
    let fresh_popular = seeded_record("pattern", "x".repeat(30).as_str(), 0, 1_000_000, 1.0).await;
    let score = staleness_score(&fresh_popular, chrono::Utc::now());
    assert!((0.0..=100.0).contains(&score));
    assert_eq!(score, 0.0);
}

#[tokio::test]
async fn quality_gate_rejects_sub_threshold_content_on_upsert() {
    let embeddings = Arc::new(FakeEmbeddingClient::new());
    let vectors = Arc::new(InMemoryVectorStore::new());
    let records = RecordManager::new(embeddings, vectors, None, Config::default());

    let input = CreateMemoryInput {
        memory_type: "context".to_string(),
        content: "too short".to_string(),
        context: None,
        error_message: None,
        solution: None,
        project: None,
        tags: vec![],
        pinned: false,
        relations: vec![],
        source: None,
        content_hash: None,
    };

    let result = records.upsert(input).await;
    assert!(matches!(result, Err(memstore_core::error::ServiceError::Validation(_))));
}

#[test]
fn rrf_fusion_never_produces_a_negative_score() {
    let dense: Vec<String> = (0..10).map(|i| format!("doc-{i}")).collect();
    let sparse: Vec<String> = (0..10).map(|i| format!("doc-{}", 9 - i)).collect();
    let fused = reciprocal_rank_fusion(&[dense, sparse], 60.0);
    assert!(fused.iter().all(|(_, score)| *score >= 0.0));
    assert!(!fused.is_empty());
}

#[tokio::test]
async fn linking_a_memory_to_itself_is_rejected() {
    let graph = InMemoryGraphStore::new();
    graph
        .upsert_node(&memstore_core::model::GraphNode {
            id: "solo".to_string(),
            memory_type: MemoryType::Context,
            content_preview: "a lone node".to_string(),
            project: None,
            tags: vec![],
            created_at: chrono::Utc::now(),
        })
        .await
        .expect("seed node");

    let result = link(&graph, "solo", "solo", RelationType::Related).await;
    assert!(matches!(result, Err(memstore_core::error::ServiceError::Validation(_))));
    assert_eq!(graph.edge_count(), 0);
}

#[tokio::test]
async fn linking_to_a_nonexistent_target_is_rejected() {
    let graph = InMemoryGraphStore::new();
    graph
        .upsert_node(&memstore_core::model::GraphNode {
            id: "source-node".to_string(),
            memory_type: MemoryType::Context,
            content_preview: "exists".to_string(),
            project: None,
            tags: vec![],
            created_at: chrono::Utc::now(),
        })
        .await
        .expect("seed node");

    let result = link(&graph, "source-node", "missing-node", RelationType::Related).await;
    assert!(matches!(result, Err(memstore_core::error::ServiceError::NotFound(_))));
}
