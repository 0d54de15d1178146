//! Multi-Query Planner (§4.4): expands one user query into several typed
//! strategy descriptors, runs them with bounded concurrent fan-out, and
//! merges the results. Each strategy is a cheap reformulation rather than
//! a distinct retrieval path — the actual search still goes through the
//! Hybrid Retriever (§4.3) per strategy.

use std::collections::HashMap;

const MAX_CONCURRENT_STRATEGIES: usize = 8;

/// A single dimension of the query the planner fans out on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// The query as written.
    Semantic,
    /// Constrain to a single memory type.
    Type(String),
    /// Constrain to records carrying all of these tags.
    Tags(Vec<String>),
    /// Constrain to a single project.
    Project(String),
    /// The query with synonym terms appended (§4.4 lexicon).
    Expanded(String),
}

impl Strategy {
    pub fn label(&self) -> String {
        match self {
            Strategy::Semantic => "semantic".to_string(),
            Strategy::Type(t) => format!("type:{t}"),
            Strategy::Tags(tags) => format!("tags:{}", tags.join(",")),
            Strategy::Project(p) => format!("project:{p}"),
            Strategy::Expanded(_) => "expanded".to_string(),
        }
    }
}

/// Synonym lexicon (§4.4): query-expansion terms added verbatim, not
/// stemmed or deduplicated against the original query.
fn synonym_lexicon() -> HashMap<&'static str, &'static [&'static str]> {
    HashMap::from([
        ("bug", ["error", "issue", "problem", "defect"].as_slice()),
        ("fix", ["resolve", "solve", "patch", "repair"].as_slice()),
        ("api", ["endpoint", "interface", "service", "route"].as_slice()),
        (
            "auth",
            ["authentication", "authorization", "login", "credential"].as_slice(),
        ),
        ("test", ["testing", "spec", "verification", "validation"].as_slice()),
        ("deploy", ["deployment", "release", "ship", "publish"].as_slice()),
    ])
}

/// Builds the strategy set for a query given the caller's explicit filters
/// and whether query expansion should be attempted at all. At most
/// [`MAX_CONCURRENT_STRATEGIES`] strategies are returned; `Semantic` is
/// always first so a caller that only wants the baseline can truncate to 1.
pub fn plan_strategies(
    query: &str,
    memory_type: Option<&str>,
    tags: &[String],
    project: Option<&str>,
) -> Vec<Strategy> {
    let mut strategies = vec![Strategy::Semantic];

    if let Some(t) = memory_type {
        strategies.push(Strategy::Type(t.to_string()));
    }
    if !tags.is_empty() {
        strategies.push(Strategy::Tags(tags.to_vec()));
    }
    if let Some(p) = project {
        strategies.push(Strategy::Project(p.to_string()));
    }
    if let Some(expanded) = expand_query(query) {
        strategies.push(Strategy::Expanded(expanded));
    }

    strategies.truncate(MAX_CONCURRENT_STRATEGIES);
    strategies
}

/// Appends lexicon synonyms for any recognized term in `query`. Returns
/// `None` when no term in the query matches the lexicon (no point running
/// an "expanded" strategy identical to the semantic one).
fn expand_query(query: &str) -> Option<String> {
    let lexicon = synonym_lexicon();
    let lower = query.to_lowercase();
    let mut extra_terms: Vec<&str> = Vec::new();

    for (term, synonyms) in &lexicon {
        if lower.split_whitespace().any(|w| w == *term) {
            extra_terms.extend(synonyms.iter().copied());
        }
    }

    if extra_terms.is_empty() {
        None
    } else {
        Some(format!("{query} {}", extra_terms.join(" ")))
    }
}

/// One strategy's tagged hit, carrying its fused score and originating
/// strategy label so callers can explain why a result surfaced.
#[derive(Debug, Clone)]
pub struct StrategyHit {
    pub id: String,
    pub score: f32,
    pub strategy: String,
}

/// Merges per-strategy result lists: sort by score descending, then dedup
/// by id keeping the first (highest-scoring, or earliest-strategy on a
/// tie) occurrence.
pub fn merge_strategy_hits(mut per_strategy: Vec<Vec<StrategyHit>>) -> Vec<StrategyHit> {
    let mut flat: Vec<StrategyHit> = per_strategy.drain(..).flatten().collect();
    flat.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut seen = std::collections::HashSet::new();
    flat.into_iter().filter(|hit| seen.insert(hit.id.clone())).collect()
}
