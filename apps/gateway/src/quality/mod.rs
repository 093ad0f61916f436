#![allow(dead_code)]

//! Quality Evaluator — grades a model's output against a benchmark test.
//!
//! Pluggable, trait-based: `HeuristicEvaluator` (pure-Rust, fast,
//! deterministic, fully testable) is the default; `LlmEvaluator` grades via a
//! judge model. The gateway holds an `Arc<dyn QualityEvaluator>` chosen at
//! construction, never probed for at call time.

pub mod benchmarks;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::gateway::transport::Transport;
use crate::models::model::ModelConfig;
use crate::models::response::Message;
use crate::quality::benchmarks::BenchmarkTest;

/// Relative weight of each scored dimension. Tunable defaults; the sum is
/// normalized away, so they need not add to 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationWeights {
    pub relevance: f64,
    pub completeness: f64,
    pub accuracy: f64,
    pub clarity: f64,
}

impl Default for EvaluationWeights {
    fn default() -> Self {
        Self {
            relevance: 0.40,
            completeness: 0.25,
            accuracy: 0.20,
            clarity: 0.15,
        }
    }
}

#[async_trait]
pub trait QualityEvaluator: Send + Sync {
    /// Scores a response against a test, in [0, 1].
    async fn evaluate(&self, response_text: &str, test: &BenchmarkTest) -> f64;
}

// ────────────────────────────────────────────────────────────────────────────
// HeuristicEvaluator — default implementation
// ────────────────────────────────────────────────────────────────────────────

/// Weighted combination of four cheap textual signals:
/// relevance (expected-keyword coverage), completeness (length plus
/// structural markers, saturating), accuracy (hedging vs declarative
/// language), clarity (inverse sentence-length proxy).
pub struct HeuristicEvaluator {
    weights: EvaluationWeights,
}

impl HeuristicEvaluator {
    pub fn new(weights: EvaluationWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, text: &str, test: &BenchmarkTest) -> f64 {
        let w = &self.weights;
        let total = w.relevance + w.completeness + w.accuracy + w.clarity;
        let weighted = w.relevance * relevance_score(text, &test.expected_keywords)
            + w.completeness * completeness_score(text)
            + w.accuracy * accuracy_score(text)
            + w.clarity * clarity_score(text);
        (weighted / total).clamp(0.0, 1.0)
    }
}

impl Default for HeuristicEvaluator {
    fn default() -> Self {
        Self::new(EvaluationWeights::default())
    }
}

#[async_trait]
impl QualityEvaluator for HeuristicEvaluator {
    async fn evaluate(&self, response_text: &str, test: &BenchmarkTest) -> f64 {
        self.score(response_text, test)
    }
}

/// Fraction of expected keywords present, case-insensitive.
fn relevance_score(text: &str, expected_keywords: &[String]) -> f64 {
    if expected_keywords.is_empty() {
        return 1.0;
    }
    let lowered = text.to_lowercase();
    let hits = expected_keywords
        .iter()
        .filter(|k| lowered.contains(&k.to_lowercase()))
        .count();
    hits as f64 / expected_keywords.len() as f64
}

/// Saturating function of length plus a bonus for structure (line breaks,
/// bullets, numbered points).
fn completeness_score(text: &str) -> f64 {
    let length_part = (text.len() as f64 / 600.0).min(1.0) * 0.7;
    let lines = text.lines().count();
    let bullets = text
        .lines()
        .filter(|l| {
            let t = l.trim_start();
            t.starts_with("- ") || t.starts_with("* ") || starts_numbered(t)
        })
        .count();
    let structure_part = (((lines.saturating_sub(1)) as f64 * 0.05).min(0.15))
        + ((bullets as f64 * 0.05).min(0.15));
    (length_part + structure_part).min(1.0)
}

fn starts_numbered(line: &str) -> bool {
    let mut chars = line.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_digit()) && matches!(chars.next(), Some('.' | ')'))
}

const HEDGING_MARKERS: &[&str] = &[
    "i'm not sure",
    "i am not sure",
    "might be",
    "possibly",
    "i think",
    "cannot determine",
    "it's unclear",
    "hard to say",
];

const CONFIDENT_MARKERS: &[&str] = &[
    "specifically",
    "clearly",
    "the answer is",
    "in summary",
    "therefore",
    "definitively",
];

/// Heuristic accuracy proxy: hedging language scores low, declarative
/// language scores high, neutral prose lands in between.
fn accuracy_score(text: &str) -> f64 {
    let lowered = text.to_lowercase();
    if HEDGING_MARKERS.iter().any(|m| lowered.contains(m)) {
        0.3
    } else if CONFIDENT_MARKERS.iter().any(|m| lowered.contains(m)) {
        0.9
    } else {
        0.6
    }
}

/// Inverse sentence-complexity proxy: 1.0 at or under 20 words per sentence,
/// falling linearly to 0.0 at 60.
fn clarity_score(text: &str) -> f64 {
    let sentences: Vec<&str> = text
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if sentences.is_empty() {
        return 0.0;
    }
    let total_words: usize = sentences.iter().map(|s| s.split_whitespace().count()).sum();
    let avg = total_words as f64 / sentences.len() as f64;
    (1.0 - (avg - 20.0) / 40.0).clamp(0.0, 1.0)
}

// ────────────────────────────────────────────────────────────────────────────
// LlmEvaluator — judge-model implementation
// ────────────────────────────────────────────────────────────────────────────

/// Grades via a judge model: asks for a bare number in [0, 1] and parses it.
/// Falls back to the heuristic score when the judge call or parse fails, so
/// benchmark runs never abort on evaluator trouble.
pub struct LlmEvaluator {
    transport: Arc<dyn Transport>,
    judge: ModelConfig,
    fallback: HeuristicEvaluator,
}

impl LlmEvaluator {
    pub fn new(transport: Arc<dyn Transport>, judge: ModelConfig) -> Self {
        Self {
            transport,
            judge,
            fallback: HeuristicEvaluator::default(),
        }
    }
}

#[async_trait]
impl QualityEvaluator for LlmEvaluator {
    async fn evaluate(&self, response_text: &str, test: &BenchmarkTest) -> f64 {
        let prompt = format!(
            "Grade the following answer to the task \"{}\" on a scale from 0.0 to 1.0.\n\
             Expected topics: {}.\n\nAnswer:\n{}\n\n\
             Reply with only the number.",
            test.name,
            test.expected_keywords.join(", "),
            response_text
        );
        let messages = [Message::user(prompt)];
        match self.transport.invoke(&self.judge, &messages).await {
            Ok(reply) => match reply.text.trim().parse::<f64>() {
                Ok(score) => score.clamp(0.0, 1.0),
                Err(_) => {
                    warn!("judge model returned a non-numeric grade, using heuristic score");
                    self.fallback.score(response_text, test)
                }
            },
            Err(e) => {
                warn!("judge model call failed, using heuristic score: {e}");
                self.fallback.score(response_text, test)
            }
        }
    }
}
