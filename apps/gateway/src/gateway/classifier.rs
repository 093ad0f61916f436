//! Error Classifier — stateless mapping from a raw provider failure to a
//! structured category, severity, and retry budget.
//!
//! Pure and total: every input string maps to exactly one category, with
//! `Unknown` as the conservative catch-all (retryable, small budget).

use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    RateLimit,
    Authentication,
    Timeout,
    ServerError,
    ContextLength,
    ContentPolicy,
    Unknown,
}

/// Observability only — never used for control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Medium,
    High,
}

/// Classified failure. Created fresh per failure; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub provider: String,
    pub retryable: bool,
    pub raw_message: String,
}

/// Per-category retry budget for attempts against the same candidate.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Delay before attempt `attempt_index + 1` (zero-based index of the
    /// attempt that just failed).
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt_index as i32);
        self.base_delay.mul_f64(factor)
    }
}

/// Maps a raw failure message to a structured `ErrorInfo`.
/// Matching is over the lowered text; first matching rule wins.
pub fn classify(raw: &str, provider: &str) -> ErrorInfo {
    let lowered = raw.to_lowercase();

    let (category, severity, retryable) = if contains_any(&lowered, &["rate limit", "429", "quota"])
    {
        (ErrorCategory::RateLimit, ErrorSeverity::Medium, true)
    } else if contains_any(&lowered, &["api key", "unauthorized", "401", "403"]) {
        (ErrorCategory::Authentication, ErrorSeverity::High, false)
    } else if contains_any(&lowered, &["timed out", "timeout", "deadline"]) {
        (ErrorCategory::Timeout, ErrorSeverity::Medium, true)
    } else if contains_any(&lowered, &["500", "502", "503", "server error", "overloaded"]) {
        (ErrorCategory::ServerError, ErrorSeverity::Medium, true)
    } else if contains_any(&lowered, &["context length", "too many tokens", "maximum context"]) {
        // Retrying an identical over-long prompt cannot succeed.
        (ErrorCategory::ContextLength, ErrorSeverity::Medium, false)
    } else if contains_any(&lowered, &["content policy", "content filter", "safety"]) {
        (ErrorCategory::ContentPolicy, ErrorSeverity::High, false)
    } else {
        (ErrorCategory::Unknown, ErrorSeverity::Medium, true)
    };

    ErrorInfo {
        category,
        severity,
        provider: provider.to_string(),
        retryable,
        raw_message: raw.to_string(),
    }
}

/// Retry budget as a pure function of the category.
pub fn retry_config(info: &ErrorInfo) -> RetryPolicy {
    match info.category {
        ErrorCategory::RateLimit => RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
        },
        // A bad key will not heal — never retry the same provider.
        ErrorCategory::Authentication
        | ErrorCategory::ContextLength
        | ErrorCategory::ContentPolicy => RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        },
        ErrorCategory::Timeout | ErrorCategory::ServerError => RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        },
        ErrorCategory::Unknown => RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        },
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}
