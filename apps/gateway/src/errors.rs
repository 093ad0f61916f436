use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::gateway::GatewayError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No eligible models: {0}")]
    NoEligibleModels(String),

    #[error("All providers failed: {0}")]
    AllProvidersFailed(String),

    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::NoEligibleModels { .. } => AppError::NoEligibleModels(e.to_string()),
            GatewayError::AllProvidersFailed { .. } => AppError::AllProvidersFailed(e.to_string()),
            GatewayError::DeadlineExceeded { .. } => AppError::DeadlineExceeded(e.to_string()),
            GatewayError::UnknownSuite(_) => AppError::NotFound(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            // Configuration problem: nothing in the registry can serve this
            // task at the requested complexity.
            AppError::NoEligibleModels(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "NO_ELIGIBLE_MODELS",
                msg.clone(),
            ),
            // Availability problem: every eligible candidate was tried.
            AppError::AllProvidersFailed(msg) => {
                tracing::error!("All providers failed: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "ALL_PROVIDERS_FAILED",
                    msg.clone(),
                )
            }
            AppError::DeadlineExceeded(msg) => (
                StatusCode::GATEWAY_TIMEOUT,
                "DEADLINE_EXCEEDED",
                msg.clone(),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
