//! Core data model: memory records, relation edges, graph nodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// The typed role of a memory record.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Decision,
    Pattern,
    Error,
    Learning,
    Docs,
    Context,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Decision => "decision",
            MemoryType::Pattern => "pattern",
            MemoryType::Error => "error",
            MemoryType::Learning => "learning",
            MemoryType::Docs => "docs",
            MemoryType::Context => "context",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "decision" => Some(MemoryType::Decision),
            "pattern" => Some(MemoryType::Pattern),
            "error" => Some(MemoryType::Error),
            "learning" => Some(MemoryType::Learning),
            "docs" => Some(MemoryType::Docs),
            "context" => Some(MemoryType::Context),
            _ => None,
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typed edge kind between two memories. Priority order for traversal
/// tie-breaking is `FIXES > SUPERSEDES > SUPPORTS > FOLLOWS > CAUSES >
/// CONTRADICTS > RELATED`.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Causes,
    Fixes,
    Contradicts,
    Supports,
    Follows,
    Related,
    Supersedes,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Causes => "causes",
            RelationType::Fixes => "fixes",
            RelationType::Contradicts => "contradicts",
            RelationType::Supports => "supports",
            RelationType::Follows => "follows",
            RelationType::Related => "related",
            RelationType::Supersedes => "supersedes",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "causes" => Some(RelationType::Causes),
            "fixes" => Some(RelationType::Fixes),
            "contradicts" => Some(RelationType::Contradicts),
            "supports" => Some(RelationType::Supports),
            "follows" => Some(RelationType::Follows),
            "related" => Some(RelationType::Related),
            "supersedes" => Some(RelationType::Supersedes),
            _ => None,
        }
    }

    /// Lower is higher priority; used to tie-break BFS traversal order.
    pub fn traversal_priority(&self) -> u8 {
        match self {
            RelationType::Fixes => 0,
            RelationType::Supersedes => 1,
            RelationType::Supports => 2,
            RelationType::Follows => 3,
            RelationType::Causes => 4,
            RelationType::Contradicts => 5,
            RelationType::Related => 6,
        }
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A relation edge as stored inline on a memory record's `relations` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub target_id: String,
    pub relation_type: RelationType,
}

/// The unit of storage: a single memory. Identity (`id`, `created_at`) is
/// immutable; the rest is mutated via `patch` or lifecycle sweeps.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub access_count: u64,
    #[serde(default = "default_usefulness")]
    pub usefulness_score: f32,
    #[serde(default)]
    pub relations: Vec<Relation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// Forward-compatible escape hatch: fields neither core logic nor this
    /// schema interprets, preserved verbatim across read/write round-trips.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

fn default_usefulness() -> f32 {
    0.5
}

impl MemoryRecord {
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Deterministic embedding text: `content context? error_message?
    /// solution? tags...`, single-space separated, empty fields omitted.
    pub fn embedding_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(4 + self.tags.len());
        parts.push(self.content.as_str());
        if let Some(c) = self.context.as_deref().filter(|s| !s.is_empty()) {
            parts.push(c);
        }
        if let Some(e) = self.error_message.as_deref().filter(|s| !s.is_empty()) {
            parts.push(e);
        }
        if let Some(s) = self.solution.as_deref().filter(|s| !s.is_empty()) {
            parts.push(s);
        }
        for t in &self.tags {
            if !t.is_empty() {
                parts.push(t.as_str());
            }
        }
        parts.join(" ")
    }

    /// The "solution or error_message" sub-view used by the composite
    /// embedding pipeline (§4.2). Empty string if neither is present.
    pub fn solution_or_error_slot(&self) -> String {
        self.solution
            .clone()
            .or_else(|| self.error_message.clone())
            .unwrap_or_default()
    }

    pub fn content_preview(&self, max_chars: usize) -> String {
        if self.content.chars().count() <= max_chars {
            self.content.clone()
        } else {
            self.content.chars().take(max_chars).collect()
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }
}

/// Request DTO for `POST /memories`. Unknown fields are rejected: a
/// deliberate guard against clients smuggling unmodelled fields into a
/// record rather than a convenience default.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateMemoryInput {
    #[serde(rename = "type")]
    pub memory_type: String,
    pub content: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub relations: Vec<Relation>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub content_hash: Option<String>,
}

/// Request DTO for `PATCH /memories/{id}`. Only metadata fields are
/// mutable; content changes are expressed as delete+insert (§4.2).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PatchMemoryInput {
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub pinned: Option<bool>,
    #[serde(default)]
    pub resolved: Option<bool>,
    #[serde(default)]
    pub usefulness_score: Option<f32>,
    #[serde(default)]
    pub access_count_delta: Option<i64>,
    #[serde(default)]
    pub relations: Option<Vec<Relation>>,
}

/// The graph-side projection of a memory. `content_preview` is capped at
/// 200 chars per §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub content_preview: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&MemoryRecord> for GraphNode {
    fn from(r: &MemoryRecord) -> Self {
        GraphNode {
            id: r.id.clone(),
            memory_type: r.memory_type,
            content_preview: r.content_preview(200),
            project: r.project.clone(),
            tags: r.tags.clone(),
            created_at: r.created_at,
        }
    }
}
