//! Document Ingestor (§4.7): polls configured directories, chunks changed
//! files, and re-indexes them under the atomic-replacement invariant —
//! a successful re-index never leaves stale chunks from an earlier version.

mod chunk;
mod state;

pub use chunk::chunk_text;
pub use state::{FileState, IngestState};

use crate::config::Config;
use crate::error::ServiceError;
use crate::model::{CreateMemoryInput, MemoryType};
use crate::records::RecordManager;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub struct DocumentIngestor {
    records: Arc<RecordManager>,
    config: Config,
    state_path: PathBuf,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub files_scanned: usize,
    pub files_reindexed: usize,
    pub files_failed: usize,
}

impl DocumentIngestor {
    pub fn new(records: Arc<RecordManager>, config: Config, state_path: PathBuf) -> Self {
        Self { records, config, state_path }
    }

    /// Runs `scan_once` on a fixed interval until the process is stopped.
    /// Each poll is independent: a panic-free failure on one file never
    /// aborts the loop (§4.7 failure handling).
    pub async fn run_poll_loop(&self) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.ingest_poll_interval_seconds));
        loop {
            ticker.tick().await;
            match self.scan_once().await {
                Ok(report) => tracing::info!(
                    scanned = report.files_scanned,
                    reindexed = report.files_reindexed,
                    failed = report.files_failed,
                    "ingest poll complete"
                ),
                Err(err) => tracing::warn!(error = %err, "ingest poll failed"),
            }
        }
    }

    /// Walks every configured root, applying the per-file algorithm.
    pub async fn scan_once(&self) -> Result<ScanReport, ServiceError> {
        let mut state = state::IngestState::load(&self.state_path);
        let mut report = ScanReport::default();

        let mut files = Vec::new();
        for root in &self.config.ingest_folders {
            collect_files(Path::new(root), &self.config.ingest_exclude_dirs, &mut files);
        }

        for path in files {
            report.files_scanned += 1;
            match self.index_file(&path, &mut state).await {
                Ok(true) => report.files_reindexed += 1,
                Ok(false) => {}
                Err(err) => {
                    report.files_failed += 1;
                    tracing::warn!(path = %path.display(), error = %err, "file indexing failed, retrying next poll");
                }
            }
        }

        if let Err(err) = state.save(&self.state_path) {
            tracing::warn!(error = %err, "failed to persist ingest state");
        }

        Ok(report)
    }

    /// Returns `Ok(true)` if the file was (re-)indexed, `Ok(false)` if it
    /// was unchanged and skipped.
    async fn index_file(&self, path: &Path, state: &mut state::IngestState) -> Result<bool, ServiceError> {
        if !has_supported_extension(path) {
            return Ok(false);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::Internal(format!("read {}: {e}", path.display())))?;
        let content_hash = hash_content(&content);

        if let Some(existing) = state.get(path) {
            if existing.content_hash == content_hash {
                return Ok(false);
            }
        }

        let source = path.to_string_lossy().to_string();

        // Read the previous version's chunks before writing anything, so an
        // unchanged chunk is recognized by its (source, content_hash) and
        // left alone rather than re-inserted as a duplicate point.
        let previous = self.records.list_by_source(&source).await?;
        let existing_hashes: HashSet<String> = previous.iter().filter_map(|r| r.content_hash.clone()).collect();

        let chunks = chunk::chunk_text(&content);
        let mut new_hashes = Vec::with_capacity(chunks.len());

        for chunk_body in &chunks {
            let chunk_hash = hash_content(chunk_body);
            if existing_hashes.contains(&chunk_hash) {
                new_hashes.push(chunk_hash);
                continue;
            }
            new_hashes.push(chunk_hash.clone());

            let input = CreateMemoryInput {
                memory_type: MemoryType::Docs.as_str().to_string(),
                content: chunk_body.clone(),
                context: None,
                error_message: None,
                solution: None,
                project: None,
                tags: vec![],
                pinned: false,
                relations: vec![],
                source: Some(source.clone()),
                content_hash: Some(chunk_hash),
            };
            self.records.upsert(input).await?;
        }

        // Atomic-replacement invariant: new chunks are written before stale
        // chunks from the previous version are deleted.
        for old in previous {
            let Some(old_hash) = &old.content_hash else { continue };
            if !new_hashes.contains(old_hash) {
                self.records.delete(&old.id).await?;
            }
        }

        state.set(
            path,
            state::FileState { content_hash, last_indexed_at: chrono::Utc::now() },
        );
        Ok(true)
    }
}

fn has_supported_extension(path: &Path) -> bool {
    const SUPPORTED: &[&str] = &["md", "txt", "rst"];
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.components().any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
}

fn is_excluded(path: &Path, exclude_dirs: &[String]) -> bool {
    path.components().any(|c| {
        let name = c.as_os_str().to_string_lossy();
        exclude_dirs.iter().any(|ex| ex == name.as_ref())
    })
}

fn collect_files(root: &Path, exclude_dirs: &[String], out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(root) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        if is_hidden(&path) || is_excluded(&path, exclude_dirs) {
            continue;
        }
        if path.is_dir() {
            collect_files(&path, exclude_dirs, out);
        } else if has_supported_extension(&path) {
            out.push(path);
        }
    }
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
