//! Axum route handlers for the gateway API.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::errors::AppError;
use crate::gateway::{AnalyzeRequest, ServiceHealth, SuiteReport};
use crate::models::model::{ComplexityTier, RoutingCriteria};
use crate::models::response::AiResponse;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalyzeBody {
    pub task_type: String,
    pub prompt: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub routing_criteria: RoutingCriteria,
    #[serde(default)]
    pub complexity: ComplexityTier,
    /// Caller deadline in milliseconds; omitted means no deadline beyond the
    /// gateway's own per-call timeout.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub content: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeBody>,
) -> Result<Json<AiResponse>, AppError> {
    if body.prompt.trim().is_empty() {
        return Err(AppError::Validation("prompt must not be empty".to_string()));
    }
    if body.task_type.trim().is_empty() {
        return Err(AppError::Validation("task_type must not be empty".to_string()));
    }

    let mut request = AnalyzeRequest::new(body.task_type, body.prompt);
    request.context = body.context;
    request.criteria = body.routing_criteria;
    request.complexity = body.complexity;
    request.deadline = body
        .timeout_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));

    let response = state.gateway.analyze_with_fallback(request).await?;
    Ok(Json(response))
}

/// POST /api/v1/generate — legacy wrapper returning content only.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(body): Json<GenerateBody>,
) -> Result<Json<GenerateResponse>, AppError> {
    if body.prompt.trim().is_empty() {
        return Err(AppError::Validation("prompt must not be empty".to_string()));
    }
    let content = state.gateway.generate_response(&body.prompt).await?;
    Ok(Json(GenerateResponse { content }))
}

/// GET /api/v1/gateway/health — per-provider breaker state plus usage totals.
pub async fn handle_gateway_health(State(state): State<AppState>) -> Json<ServiceHealth> {
    Json(state.gateway.service_health())
}

/// POST /api/v1/benchmarks/:suite
pub async fn handle_run_benchmark(
    State(state): State<AppState>,
    Path(suite): Path<String>,
) -> Result<Json<SuiteReport>, AppError> {
    let report = state.gateway.run_benchmark_suite(&suite).await?;
    Ok(Json(report))
}
