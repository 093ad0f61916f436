//! Telemetry — one fire-and-forget report per attempted request, plus
//! process-wide usage/cost counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use uuid::Uuid;

use crate::models::response::TokenUsage;

/// What the sink receives for every completed request, successful or not.
#[derive(Debug, Clone, Serialize)]
pub struct CallReport {
    pub request_id: Uuid,
    pub provider: String,
    pub model: String,
    pub latency_ms: u64,
    pub token_usage: TokenUsage,
    pub cost: f64,
    pub success: bool,
}

/// Fire-and-forget: implementations must not block the request path and
/// must swallow their own failures.
pub trait TelemetrySink: Send + Sync {
    fn report(&self, report: &CallReport);
}

/// Default sink: structured log line per call.
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn report(&self, report: &CallReport) {
        tracing::info!(
            request_id = %report.request_id,
            provider = %report.provider,
            model = %report.model,
            latency_ms = report.latency_ms,
            input_tokens = report.token_usage.input_tokens,
            output_tokens = report.token_usage.output_tokens,
            cost_usd = report.cost,
            success = report.success,
            "llm call"
        );
    }
}

/// Aggregate counters, incremented atomically from concurrent requests.
/// Cost is held in microdollars so it fits an integer counter.
#[derive(Debug, Default)]
pub struct UsageTotals {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    tokens: AtomicU64,
    cost_microdollars: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageSnapshot {
    pub requests: u64,
    pub cache_hits: u64,
    pub tokens: u64,
    pub cost_usd: f64,
}

impl UsageTotals {
    pub fn record_call(&self, usage: TokenUsage, cost: f64) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.tokens.fetch_add(usage.total() as u64, Ordering::Relaxed);
        self.cost_microdollars
            .fetch_add((cost * 1_000_000.0).round() as u64, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            tokens: self.tokens.load(Ordering::Relaxed),
            cost_usd: self.cost_microdollars.load(Ordering::Relaxed) as f64 / 1_000_000.0,
        }
    }
}
