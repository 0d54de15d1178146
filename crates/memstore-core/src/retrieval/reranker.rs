//! Reranking (§4.3 step 4): reorders a shortlist by cross-encoder score.
//! When the active `EmbeddingClient` has no cross-encoder available, a
//! BM25 term-overlap score stands in so rerank still has an effect rather
//! than degrading to a no-op.

const BM25_K1: f32 = 1.2;
const BM25_B: f32 = 0.75;
const AVG_DOC_LEN: f32 = 500.0;

#[derive(Debug, Clone)]
pub struct RerankedResult<T> {
    pub item: T,
    pub score: f32,
    pub original_rank: usize,
}

/// Reorders `candidates` (already carrying their fused-rank order) by
/// `scores`, stable-tie-breaking by original fused rank (§4.3 step 4).
pub fn apply_scores<T>(candidates: Vec<T>, scores: &[f32]) -> Vec<RerankedResult<T>> {
    let mut reranked: Vec<RerankedResult<T>> = candidates
        .into_iter()
        .zip(scores.iter())
        .enumerate()
        .map(|(rank, (item, &score))| RerankedResult {
            item,
            score,
            original_rank: rank,
        })
        .collect();

    reranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.original_rank.cmp(&b.original_rank))
    });
    reranked
}

/// Okapi BM25-style term-overlap score between `query` and each of `texts`,
/// used as the degraded-mode reranker when no cross-encoder is available.
pub fn bm25_term_overlap_scores(query: &str, texts: &[String]) -> Vec<f32> {
    let query_terms: Vec<String> = tokenize(query);
    if query_terms.is_empty() {
        return vec![0.0; texts.len()];
    }

    let doc_term_counts: Vec<std::collections::HashMap<String, usize>> =
        texts.iter().map(|t| term_counts(t)).collect();

    let doc_freq: std::collections::HashMap<&str, usize> = {
        let mut df = std::collections::HashMap::new();
        for term in &query_terms {
            let count = doc_term_counts
                .iter()
                .filter(|counts| counts.contains_key(term))
                .count();
            df.insert(term.as_str(), count);
        }
        df
    };

    let n_docs = texts.len().max(1) as f32;

    texts
        .iter()
        .zip(doc_term_counts.iter())
        .map(|(text, counts)| {
            let doc_len = tokenize(text).len() as f32;
            query_terms
                .iter()
                .map(|term| {
                    let tf = *counts.get(term).unwrap_or(&0) as f32;
                    if tf == 0.0 {
                        return 0.0;
                    }
                    let df = *doc_freq.get(term.as_str()).unwrap_or(&0) as f32;
                    let idf = ((n_docs - df + 0.5) / (df + 0.5) + 1.0).ln();
                    let norm_len = doc_len.max(1.0) / AVG_DOC_LEN;
                    idf * (tf * (BM25_K1 + 1.0)) / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * norm_len))
                })
                .sum()
        })
        .collect()
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn term_counts(text: &str) -> std::collections::HashMap<String, usize> {
    let mut counts = std::collections::HashMap::new();
    for term in tokenize(text) {
        *counts.entry(term).or_insert(0) += 1;
    }
    counts
}
