pub mod handlers;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/analyze", post(handlers::handle_analyze))
        .route("/api/v1/generate", post(handlers::handle_generate))
        .route("/api/v1/gateway/health", get(handlers::handle_gateway_health))
        .route(
            "/api/v1/benchmarks/:suite",
            post(handlers::handle_run_benchmark),
        )
        .with_state(state)
}
