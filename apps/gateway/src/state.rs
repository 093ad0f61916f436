use std::sync::Arc;

use crate::gateway::ResilienceGateway;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// The single gateway instance every AI-backed feature calls through.
    pub gateway: Arc<ResilienceGateway>,
}
