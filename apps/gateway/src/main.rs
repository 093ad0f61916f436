mod cache;
mod config;
mod errors;
mod gateway;
mod models;
mod quality;
mod routes;
mod state;
mod telemetry;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cache::ResponseCache;
use crate::config::{Config, GatewayConfig};
use crate::gateway::breaker::BreakerRegistry;
use crate::gateway::registry::ModelRegistry;
use crate::gateway::transport::HttpTransport;
use crate::gateway::ResilienceGateway;
use crate::quality::HeuristicEvaluator;
use crate::routes::build_router;
use crate::state::AppState;
use crate::telemetry::TracingSink;

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting AI Gateway v{}", env!("CARGO_PKG_VERSION"));

    // Load the gateway config document (built-in registry when absent)
    let gateway_config = GatewayConfig::load(config.gateway_config_path.as_deref())?;
    info!(
        providers = gateway_config.providers.len(),
        models = gateway_config.models.len(),
        "Gateway config loaded"
    );

    // Initialize Redis for the distributed exact-cache tier; in-memory only
    // when unconfigured or unreachable
    let redis = match &config.redis_url {
        Some(url) => match redis::Client::open(url.clone()) {
            Ok(client) => {
                info!("Redis cache tier enabled");
                Some(client)
            }
            Err(e) => {
                warn!("Redis unavailable, falling back to in-memory cache: {e}");
                None
            }
        },
        None => None,
    };

    // Model registry and one circuit breaker per known provider
    let registry = ModelRegistry::new(
        gateway_config.models.clone(),
        gateway_config.routing.clone(),
        "general",
    );
    let breakers = BreakerRegistry::new(registry.providers(), gateway_config.breaker_config());
    info!(providers = ?registry.providers(), "Circuit breakers initialized");

    let cache = ResponseCache::new(
        gateway_config.cache_policy(),
        gateway_config.tunables.similarity_threshold,
        gateway_config.tunables.cache_capacity,
        redis,
    );

    let transport = Arc::new(HttpTransport::new(gateway_config.resolve_endpoints())?);

    let resilience = Arc::new(ResilienceGateway::new(
        registry,
        breakers,
        cache,
        transport,
        Arc::new(HeuristicEvaluator::default()),
        Arc::new(TracingSink),
        gateway_config.gateway_tunables(),
    ));

    // Background maintenance: cache TTL sweep + breaker promotion checks
    Arc::clone(&resilience).spawn_maintenance(MAINTENANCE_INTERVAL);

    let state = AppState {
        gateway: resilience,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
