//! Per-file ingest state, persisted across restarts as a single JSON file
//! written atomically (write-to-temp-then-rename, §5).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileState {
    pub content_hash: String,
    pub last_indexed_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestState {
    files: HashMap<String, FileState>,
}

impl IngestState {
    pub fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let tmp = tmp_path(path);
        let body = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn get(&self, path: &Path) -> Option<&FileState> {
        self.files.get(&path_key(path))
    }

    pub fn set(&mut self, path: &Path, state: FileState) {
        self.files.insert(path_key(path), state);
    }

    pub fn remove(&mut self, path: &Path) {
        self.files.remove(&path_key(path));
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
