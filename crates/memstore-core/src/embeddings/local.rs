//! In-process embedding backend (§9 `EmbeddingBackend::InProcess`).
//!
//! Used when `EMBEDDING_SERVICE_URL` is unset. Provides dense embeddings
//! via fastembed (ONNX, local inference); sparse vectors are not produced
//! locally, and reranking falls back to BM25 term overlap rather than a
//! cross-encoder — both are reported via `config()` so the Retriever can
//! degrade gracefully instead of failing (§4.3 edge policy).

use crate::embeddings::cache::EmbeddingCache;
use crate::embeddings::client::{EmbedResult, EmbeddingClient, EmbeddingConfig};
use crate::error::EmbeddingError;
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Mutex, OnceLock};

/// Dense dimensionality of nomic-embed-text-v1.5, the default local model.
pub const EMBEDDING_DIMENSIONS: usize = 768;
pub const MAX_TEXT_LENGTH: usize = 8192;
pub const BATCH_SIZE: usize = 32;

const DOCUMENT_PREFIX: &str = "search_document: ";
const QUERY_PREFIX: &str = "search_query: ";

static EMBEDDING_MODEL_RESULT: OnceLock<Result<Mutex<TextEmbedding>, String>> = OnceLock::new();

fn get_cache_dir() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("FASTEMBED_CACHE_PATH") {
        return std::path::PathBuf::from(path);
    }
    if let Some(proj_dirs) = directories::ProjectDirs::from("com", "memstore", "core") {
        return proj_dirs.cache_dir().join("fastembed");
    }
    if let Some(base_dirs) = directories::BaseDirs::new() {
        return base_dirs.home_dir().join(".cache/memstore/fastembed");
    }
    std::path::PathBuf::from(".fastembed_cache")
}

fn get_model() -> Result<std::sync::MutexGuard<'static, TextEmbedding>, EmbeddingError> {
    let result = EMBEDDING_MODEL_RESULT.get_or_init(|| {
        let cache_dir = get_cache_dir();
        if let Err(e) = std::fs::create_dir_all(&cache_dir) {
            tracing::warn!("failed to create embedding cache dir {:?}: {}", cache_dir, e);
        }
        let options = InitOptions::new(EmbeddingModel::NomicEmbedTextV15)
            .with_show_download_progress(true)
            .with_cache_dir(cache_dir);
        TextEmbedding::try_new(options)
            .map(Mutex::new)
            .map_err(|e| format!("failed to initialize nomic-embed-text-v1.5: {e}"))
    });

    match result {
        Ok(model) => model
            .lock()
            .map_err(|e| EmbeddingError::ModelInit(format!("lock poisoned: {e}"))),
        Err(err) => Err(EmbeddingError::ModelInit(err.clone())),
    }
}

fn truncate_for_model(text: &str) -> &str {
    if text.len() <= MAX_TEXT_LENGTH {
        return text;
    }
    let boundary = text
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= MAX_TEXT_LENGTH)
        .last()
        .unwrap_or(0);
    &text[..boundary]
}

pub struct LocalEmbeddingClient {
    cache: EmbeddingCache,
}

impl LocalEmbeddingClient {
    pub fn new() -> Self {
        Self {
            cache: EmbeddingCache::new(),
        }
    }

    fn embed_prefixed(&self, prefixed: String) -> Result<Vec<f32>, EmbeddingError> {
        let key = EmbeddingCache::key_for(&prefixed);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }
        let mut model = get_model()?;
        let text = truncate_for_model(&prefixed);
        let embeddings = model
            .embed(vec![text], None)
            .map_err(|e| EmbeddingError::Failed(e.to_string()))?;
        let vector = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Failed("no embedding produced".to_string()))?;
        self.cache.put(key, vector.clone());
        Ok(vector)
    }
}

impl Default for LocalEmbeddingClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingClient for LocalEmbeddingClient {
    async fn embed_document(&self, text: &str, _include_sparse: bool) -> Result<EmbedResult, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("text cannot be empty".to_string()));
        }
        let dense = self.embed_prefixed(format!("{DOCUMENT_PREFIX}{text}"))?;
        Ok(EmbedResult { dense, sparse: None })
    }

    async fn embed_query(&self, text: &str, _include_sparse: bool) -> Result<EmbedResult, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("text cannot be empty".to_string()));
        }
        let dense = self.embed_prefixed(format!("{QUERY_PREFIX}{text}"))?;
        Ok(EmbedResult { dense, sparse: None })
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        _include_sparse: bool,
    ) -> Result<Vec<EmbedResult>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(BATCH_SIZE) {
            for t in chunk {
                out.push(self.embed_document(t, false).await?);
            }
        }
        Ok(out)
    }

    async fn rerank(&self, query: &str, texts: &[String]) -> Result<Vec<f32>, EmbeddingError> {
        Ok(crate::retrieval::reranker::bm25_term_overlap_scores(query, texts))
    }

    fn config(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            dimensions: EMBEDDING_DIMENSIONS,
            sparse_available: false,
            reranker_available: true,
        }
    }
}

#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = (norm_a * norm_b).sqrt();
    if denom > 0.0 {
        dot / denom
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn cosine_similarity_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-4);
    }

    #[test]
    fn truncate_for_model_caps_at_max_len() {
        let long = "a".repeat(MAX_TEXT_LENGTH + 100);
        assert_eq!(truncate_for_model(&long).len(), MAX_TEXT_LENGTH);
    }

    #[test]
    fn truncate_for_model_does_not_split_a_multibyte_char_at_the_boundary() {
        let mut long = "a".repeat(MAX_TEXT_LENGTH - 1);
        long.push('€');
        long.push_str(&"b".repeat(100));
        let truncated = truncate_for_model(&long);
        assert!(truncated.len() <= MAX_TEXT_LENGTH);
        assert!(std::str::from_utf8(truncated.as_bytes()).is_ok());
    }
}
