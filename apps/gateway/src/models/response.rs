use serde::{Deserialize, Serialize};

use crate::models::model::ComplexityTier;

/// A single chat message sent to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Which cache tier produced a response, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    Exact,
    Semantic,
    #[default]
    None,
}

/// The gateway's answer to one analyze call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiResponse {
    pub content: String,
    pub model_used: String,
    pub provider: String,
    /// Heuristic 0.0–1.0; observability only, never control flow.
    pub confidence_score: f64,
    pub processing_time_ms: u64,
    pub token_usage: TokenUsage,
    /// USD, derived from token usage and the model's cost_per_token.
    pub cost: f64,
    pub complexity_used: ComplexityTier,
    pub cached: bool,
    pub cache_kind: CacheKind,
}
