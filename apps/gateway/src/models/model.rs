use serde::{Deserialize, Serialize};

/// Coarse classification of how demanding a request is. Capability is
/// monotonic: a `Complex`-tier model also satisfies `Simple` and `Moderate`
/// requests, never the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTier {
    Simple,
    #[default]
    Moderate,
    Complex,
}

/// How the selector orders eligible candidates for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoutingCriteria {
    /// Ascending cost per token, ties broken by priority.
    #[default]
    Cost,
    /// Ascending priority (lower = better), ties broken by cost.
    Quality,
}

/// One registered model. Immutable once loaded; owned by the `ModelRegistry`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Stable id used by the routing table, e.g. "anthropic/claude-sonnet".
    pub id: String,
    pub provider: String,
    pub model_name: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// USD per token, input and output counted alike.
    pub cost_per_token: f64,
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Lower is better. Fed by offline benchmark runs.
    pub priority: u32,
    pub complexity_tier: ComplexityTier,
}

impl ModelConfig {
    /// Whether this model may serve a request of the given complexity.
    pub fn satisfies(&self, required: ComplexityTier) -> bool {
        self.complexity_tier >= required
    }
}
