//! Typed configuration, loaded once from the environment at startup.
//!
//! No ambient global config singleton — callers construct a `Config` and
//! pass it explicitly to the service objects that need it (Design Note,
//! §9: module-level state becomes explicitly-constructed service objects).

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub embedding_service_url: Option<String>,
    pub vector_store_host: String,
    pub vector_store_port: u16,
    pub graph_store_url: Option<String>,
    pub composite_embedding: bool,
    pub composite_weights: CompositeWeights,
    pub sparse_enabled: bool,
    pub prune_default_days: i64,
    pub prune_max_per_run: usize,
    pub ingest_poll_interval_seconds: u64,
    pub ingest_folders: Vec<String>,
    pub ingest_exclude_dirs: Vec<String>,
    pub auto_link_window_hours: i64,
    pub auto_link_top_k: usize,
    pub auto_link_min_similarity: f32,
    pub junk_fingerprints: Vec<String>,
    pub http_bind_addr: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Weights for the composite embedding's three sub-views: full enriched
/// text, content-alone, and the solution-or-error slot. Must sum to 1.0.
#[derive(Debug, Clone, Copy)]
pub struct CompositeWeights {
    pub full_text: f32,
    pub content_only: f32,
    pub solution_or_error: f32,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            full_text: 0.6,
            content_only: 0.3,
            solution_or_error: 0.1,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embedding_service_url: None,
            vector_store_host: "localhost".to_string(),
            vector_store_port: 6334,
            graph_store_url: None,
            composite_embedding: true,
            composite_weights: CompositeWeights::default(),
            sparse_enabled: true,
            prune_default_days: 30,
            prune_max_per_run: 1000,
            ingest_poll_interval_seconds: 30,
            ingest_folders: vec![],
            ingest_exclude_dirs: default_exclude_dirs(),
            auto_link_window_hours: 24,
            auto_link_top_k: 5,
            auto_link_min_similarity: 0.70,
            junk_fingerprints: default_junk_fingerprints(),
            http_bind_addr: "127.0.0.1:8100".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

fn default_exclude_dirs() -> Vec<String> {
    [
        "node_modules",
        ".git",
        "target",
        "dist",
        "build",
        "__pycache__",
        ".venv",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_junk_fingerprints() -> Vec<String> {
    [
        "Session ended (session_end) - Duration: unknown.",
        "Duration: unknown.",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Config {
    /// Load configuration from the environment, falling back to defaults
    /// for anything unset. Mirrors the variables enumerated in §6.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            embedding_service_url: env::var("EMBEDDING_SERVICE_URL")
                .ok()
                .filter(|s| !s.is_empty()),
            vector_store_host: env::var("VECTOR_STORE_HOST")
                .unwrap_or(defaults.vector_store_host),
            vector_store_port: env::var("VECTOR_STORE_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.vector_store_port),
            graph_store_url: env::var("GRAPH_STORE_URL").ok().filter(|s| !s.is_empty()),
            composite_embedding: env_bool("COMPOSITE_EMBEDDING", defaults.composite_embedding),
            composite_weights: CompositeWeights::default(),
            sparse_enabled: env_bool("SPARSE_ENABLED", defaults.sparse_enabled),
            prune_default_days: env::var("PRUNE_DEFAULT_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.prune_default_days),
            prune_max_per_run: env::var("PRUNE_MAX_PER_RUN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.prune_max_per_run),
            ingest_poll_interval_seconds: env::var("INGEST_POLL_INTERVAL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.ingest_poll_interval_seconds),
            ingest_folders: env_list("INGEST_FOLDERS").unwrap_or(defaults.ingest_folders),
            ingest_exclude_dirs: env_list("INGEST_EXCLUDE_DIRS")
                .unwrap_or(defaults.ingest_exclude_dirs),
            auto_link_window_hours: env::var("AUTO_LINK_WINDOW_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.auto_link_window_hours),
            auto_link_top_k: env::var("AUTO_LINK_TOP_K")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.auto_link_top_k),
            auto_link_min_similarity: env::var("AUTO_LINK_MIN_SIMILARITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.auto_link_min_similarity),
            junk_fingerprints: defaults.junk_fingerprints,
            http_bind_addr: env::var("HTTP_BIND_ADDR").unwrap_or(defaults.http_bind_addr),
            log_format: match env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

fn env_list(key: &str) -> Option<Vec<String>> {
    env::var(key).ok().map(|v| {
        v.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}
