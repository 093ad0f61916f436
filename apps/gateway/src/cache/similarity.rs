#![allow(dead_code)]

//! Semantic Similarity Matcher — a secondary index over the flattened text
//! of previously cached requests, so a near-duplicate prompt can reuse an
//! answer when no exact digest matches.
//!
//! Similarity is token-set cosine: |A ∩ B| / √(|A|·|B|) over lowercased
//! word sets. Cheap, deterministic, and good enough for "same question,
//! slightly rephrased"; the acceptance threshold is a tunable (default 0.85).

use std::collections::HashSet;

/// Lowercases and collapses all runs of whitespace to single spaces.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn token_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Token-set cosine similarity in [0, 1].
pub fn similarity(a: &str, b: &str) -> f64 {
    let ta = token_set(a);
    let tb = token_set(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let shared = ta.intersection(&tb).count() as f64;
    shared / ((ta.len() as f64) * (tb.len() as f64)).sqrt()
}

/// The index is paired with the exact-match store: the cache inserts and
/// removes entries in both under the same lock, keyed by the same digest.
#[derive(Debug, Default)]
pub struct SimilarityIndex {
    entries: Vec<IndexedRequest>,
}

#[derive(Debug)]
struct IndexedRequest {
    digest: String,
    tokens: HashSet<String>,
}

impl SimilarityIndex {
    pub fn insert(&mut self, digest: String, request_text: &str) {
        self.entries.push(IndexedRequest {
            digest,
            tokens: token_set(request_text),
        });
    }

    pub fn remove(&mut self, digest: &str) {
        self.entries.retain(|e| e.digest != digest);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The digest of the most similar indexed request, if its score clears
    /// the threshold.
    pub fn best_match(&self, request_text: &str, threshold: f64) -> Option<(&str, f64)> {
        let probe = token_set(request_text);
        if probe.is_empty() {
            return None;
        }

        let mut best: Option<(&str, f64)> = None;
        for entry in &self.entries {
            if entry.tokens.is_empty() {
                continue;
            }
            let shared = probe.intersection(&entry.tokens).count() as f64;
            let score = shared / ((probe.len() as f64) * (entry.tokens.len() as f64)).sqrt();
            if score >= threshold && best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((entry.digest.as_str(), score));
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace_and_case() {
        assert_eq!(
            normalize_text("  Parse   this\n\tRESUME  "),
            "parse this resume"
        );
    }

    #[test]
    fn test_identical_texts_score_one() {
        let s = similarity("analyze this job description", "analyze this job description");
        assert!((s - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_texts_score_zero() {
        assert_eq!(similarity("alpha beta", "gamma delta"), 0.0);
    }

    #[test]
    fn test_rephrased_prompt_scores_high() {
        let a = "summarize the key skills in this resume for a backend role";
        let b = "summarize the key skills in this resume for a backend position";
        assert!(similarity(a, b) > 0.85, "got {}", similarity(a, b));
    }

    #[test]
    fn test_index_returns_best_above_threshold() {
        let mut idx = SimilarityIndex::default();
        idx.insert("d1".into(), "explain rust ownership and borrowing");
        idx.insert("d2".into(), "write a cover letter for a sales job");

        let hit = idx.best_match("explain rust ownership and borrowing rules", 0.85);
        let (digest, score) = hit.expect("expected a semantic hit");
        assert_eq!(digest, "d1");
        assert!(score >= 0.85);
    }

    #[test]
    fn test_index_miss_below_threshold() {
        let mut idx = SimilarityIndex::default();
        idx.insert("d1".into(), "explain rust ownership");
        assert!(idx.best_match("draft a marketing email", 0.85).is_none());
    }

    #[test]
    fn test_remove_drops_entry() {
        let mut idx = SimilarityIndex::default();
        idx.insert("d1".into(), "some cached prompt text");
        idx.remove("d1");
        assert!(idx.is_empty());
        assert!(idx.best_match("some cached prompt text", 0.5).is_none());
    }
}
