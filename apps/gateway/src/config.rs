use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::cache::optimizer::CachePolicy;
use crate::gateway::breaker::BreakerConfig;
use crate::gateway::transport::ProviderEndpoint;
use crate::gateway::GatewayTunables;
use crate::models::model::{ComplexityTier, ModelConfig};

/// Process configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Optional distributed cache tier; absent means in-memory only.
    pub redis_url: Option<String>,
    /// Optional gateway config document; absent means built-in defaults.
    pub gateway_config_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            redis_url: std::env::var("REDIS_URL").ok(),
            gateway_config_path: std::env::var("GATEWAY_CONFIG_PATH").ok(),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Gateway config document
// ────────────────────────────────────────────────────────────────────────────

/// Per-provider wire settings. The credential is a reference to an
/// environment variable the secret store has already populated.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub credential_env: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tunables {
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_breaker_threshold")]
    pub circuit_breaker_threshold: u32,
    #[serde(default = "default_breaker_timeout_secs")]
    pub circuit_breaker_timeout_secs: u64,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_cache_ttl_secs() -> u64 {
    60 * 60
}
fn default_max_retries() -> u32 {
    5
}
fn default_breaker_threshold() -> u32 {
    5
}
fn default_breaker_timeout_secs() -> u64 {
    60
}
fn default_similarity_threshold() -> f64 {
    0.85
}
fn default_call_timeout_secs() -> u64 {
    60
}
fn default_cache_capacity() -> usize {
    1000
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            max_retries: default_max_retries(),
            circuit_breaker_threshold: default_breaker_threshold(),
            circuit_breaker_timeout_secs: default_breaker_timeout_secs(),
            similarity_threshold: default_similarity_threshold(),
            call_timeout_secs: default_call_timeout_secs(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

/// The structured document enumerating providers, models, the routing table
/// and tunables. A missing document falls back to the built-in registry so
/// the gateway always functions.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub providers: Vec<ProviderConfig>,
    pub models: Vec<ModelConfig>,
    /// task type → ordered model ids.
    pub routing: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub tunables: Tunables,
}

impl GatewayConfig {
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read gateway config at '{path}'"))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("invalid gateway config document at '{path}'"))
            }
            None => {
                warn!("GATEWAY_CONFIG_PATH not set, using built-in default registry");
                Ok(Self::default())
            }
        }
    }

    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.tunables.circuit_breaker_threshold,
            timeout: Duration::from_secs(self.tunables.circuit_breaker_timeout_secs),
        }
    }

    pub fn gateway_tunables(&self) -> GatewayTunables {
        GatewayTunables {
            call_timeout: Duration::from_secs(self.tunables.call_timeout_secs),
            max_retries: self.tunables.max_retries,
        }
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            base_ttl: Duration::from_secs(self.tunables.cache_ttl_secs),
            ..Default::default()
        }
    }

    /// Resolves each provider's credential from its named env var. A
    /// provider with no resolvable key is dropped with a warning; its models
    /// then fail candidate attempts cleanly instead of sending empty keys.
    pub fn resolve_endpoints(&self) -> HashMap<String, ProviderEndpoint> {
        let mut endpoints = HashMap::new();
        for provider in &self.providers {
            match std::env::var(&provider.credential_env) {
                Ok(api_key) if !api_key.is_empty() => {
                    endpoints.insert(
                        provider.name.clone(),
                        ProviderEndpoint {
                            url: provider.endpoint.clone(),
                            api_key,
                        },
                    );
                }
                _ => warn!(
                    provider = %provider.name,
                    env = %provider.credential_env,
                    "credential env var unset, provider disabled"
                ),
            }
        }
        endpoints
    }
}

impl Default for GatewayConfig {
    /// Small built-in registry: one premium and one economy Anthropic model,
    /// routed for the task types our features actually issue.
    fn default() -> Self {
        let models = vec![
            ModelConfig {
                id: "anthropic/claude-sonnet".to_string(),
                provider: "anthropic".to_string(),
                model_name: "claude-sonnet-4-5".to_string(),
                temperature: 0.3,
                max_tokens: 4096,
                cost_per_token: 0.000009,
                capabilities: vec!["analysis".to_string(), "code".to_string()],
                priority: 1,
                complexity_tier: ComplexityTier::Complex,
            },
            ModelConfig {
                id: "anthropic/claude-haiku".to_string(),
                provider: "anthropic".to_string(),
                model_name: "claude-haiku-3-5".to_string(),
                temperature: 0.3,
                max_tokens: 2048,
                cost_per_token: 0.000002,
                capabilities: vec!["analysis".to_string()],
                priority: 2,
                complexity_tier: ComplexityTier::Moderate,
            },
        ];

        let all_ids = || {
            vec![
                "anthropic/claude-haiku".to_string(),
                "anthropic/claude-sonnet".to_string(),
            ]
        };
        let mut routing = HashMap::new();
        routing.insert("general".to_string(), all_ids());
        routing.insert("analysis".to_string(), all_ids());
        routing.insert("resume-parsing".to_string(), all_ids());
        routing.insert(
            "contract-scoring".to_string(),
            vec!["anthropic/claude-sonnet".to_string()],
        );

        Self {
            providers: vec![ProviderConfig {
                name: "anthropic".to_string(),
                credential_env: "ANTHROPIC_API_KEY".to_string(),
                endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            }],
            models,
            routing,
            tunables: Tunables::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_registry_is_self_consistent() {
        let cfg = GatewayConfig::default();
        assert!(!cfg.models.is_empty());
        for ids in cfg.routing.values() {
            for id in ids {
                assert!(
                    cfg.models.iter().any(|m| &m.id == id),
                    "routing references unknown model {id}"
                );
            }
        }
    }

    #[test]
    fn test_missing_path_falls_back_to_defaults() {
        let cfg = GatewayConfig::load(None).unwrap();
        assert_eq!(cfg.tunables.circuit_breaker_threshold, 5);
        assert_eq!(cfg.tunables.similarity_threshold, 0.85);
    }

    #[test]
    fn test_unreadable_path_is_an_error() {
        assert!(GatewayConfig::load(Some("/nonexistent/gateway.json")).is_err());
    }

    #[test]
    fn test_document_round_trip_with_partial_tunables() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "providers": [
                    {{"name": "openai", "credential_env": "OPENAI_API_KEY",
                      "endpoint": "https://api.openai.com/v1/chat/completions"}}
                ],
                "models": [
                    {{"id": "openai/gpt", "provider": "openai", "model_name": "gpt-4o",
                      "temperature": 0.2, "max_tokens": 4096, "cost_per_token": 0.00001,
                      "priority": 1, "complexity_tier": "complex"}}
                ],
                "routing": {{"general": ["openai/gpt"]}},
                "tunables": {{"max_retries": 2}}
            }}"#
        )
        .unwrap();

        let cfg = GatewayConfig::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(cfg.models.len(), 1);
        assert_eq!(cfg.tunables.max_retries, 2);
        // Unspecified tunables keep their defaults.
        assert_eq!(cfg.tunables.cache_capacity, 1000);
        assert_eq!(cfg.breaker_config().failure_threshold, 5);
    }
}
