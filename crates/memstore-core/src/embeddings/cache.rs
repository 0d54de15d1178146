//! Bounded in-process LRU for the local-model fallback path only (§5).
//!
//! Keyed by a hash of the embedded text; evicts oldest on insert. Never
//! shared across embedding-backend instances, so switching deployments
//! (different model, different dimensions) can never serve a stale vector.

use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Mutex;

const CACHE_CAPACITY: usize = 512;

pub struct EmbeddingCache {
    inner: Mutex<LruCache<String, Vec<f32>>>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).unwrap())),
        }
    }

    pub fn key_for(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        self.inner.lock().unwrap().get(key).cloned()
    }

    pub fn put(&self, key: String, vector: Vec<f32>) {
        self.inner.lock().unwrap().put(key, vector);
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new()
    }
}
