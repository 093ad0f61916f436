//! Transport — the seam between the gateway and provider wire calls.
//!
//! ARCHITECTURAL RULE: no other module may talk to a provider endpoint
//! directly. All LLM traffic goes through a `Transport` implementation, and
//! the orchestrator owns every retry and timeout decision — an
//! implementation makes exactly one attempt per `invoke`.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::model::ModelConfig;
use crate::models::response::{Message, TokenUsage};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("provider '{0}' is not configured")]
    UnknownProvider(String),

    /// Raw failure from a non-HTTP transport implementation.
    #[error("{0}")]
    Provider(String),

    #[error("provider returned empty content")]
    EmptyContent,
}

/// One successful wire call.
#[derive(Debug, Clone)]
pub struct TransportReply {
    pub text: String,
    pub usage: TokenUsage,
}

/// Injected by the gateway at construction. The HTTP implementation below is
/// the production one; tests inject recording mocks.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn invoke(
        &self,
        model: &ModelConfig,
        messages: &[Message],
    ) -> Result<TransportReply, TransportError>;
}

/// Resolved wire settings for one provider: where to POST and which key to
/// send. Keys arrive already resolved from the environment (the secret store
/// is out of scope).
#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [&'a Message],
}

/// The messages API takes system text as a top-level field; the messages
/// array itself only accepts user/assistant turns. Splits system entries out,
/// keeping the remaining turns in order.
fn split_system(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
    let system = messages
        .iter()
        .filter(|m| m.role == "system")
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let chat = messages.iter().filter(|m| m.role != "system").collect();
    ((!system.is_empty()).then_some(system), chat)
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    content: Vec<WireContentBlock>,
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
struct WireContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: WireErrorBody,
}

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    message: String,
}

/// Production transport: one messages-API POST per invoke, no internal
/// retries. Request timeouts are imposed by the caller via
/// `tokio::time::timeout`, not here.
pub struct HttpTransport {
    client: Client,
    endpoints: HashMap<String, ProviderEndpoint>,
}

impl HttpTransport {
    pub fn new(endpoints: HashMap<String, ProviderEndpoint>) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            endpoints,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn invoke(
        &self,
        model: &ModelConfig,
        messages: &[Message],
    ) -> Result<TransportReply, TransportError> {
        let endpoint = self
            .endpoints
            .get(&model.provider)
            .ok_or_else(|| TransportError::UnknownProvider(model.provider.clone()))?;

        let (system, chat) = split_system(messages);
        let body = WireRequest {
            model: &model.model_name,
            max_tokens: model.max_tokens,
            temperature: model.temperature,
            system: system.as_deref(),
            messages: &chat,
        };

        let response = self
            .client
            .post(&endpoint.url)
            .header("x-api-key", &endpoint.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            // Prefer the provider's structured message when it parses.
            let message = serde_json::from_str::<WireError>(&raw)
                .map(|e| e.error.message)
                .unwrap_or(raw);
            return Err(TransportError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let wire: WireResponse = response.json().await?;
        let text = wire
            .content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.clone())
            .ok_or(TransportError::EmptyContent)?;

        debug!(
            provider = %model.provider,
            model = %model.model_name,
            input_tokens = wire.usage.input_tokens,
            output_tokens = wire.usage.output_tokens,
            "transport call succeeded"
        );

        Ok(TransportReply {
            text,
            usage: TokenUsage {
                input_tokens: wire.usage.input_tokens,
                output_tokens: wire.usage.output_tokens,
            },
        })
    }
}
