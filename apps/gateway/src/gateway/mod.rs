//! Resilience Gateway — the single entry point every AI-backed feature goes
//! through. Composes the cache, the model registry, the per-provider circuit
//! breakers, the error classifier and the transport into one request
//! lifecycle: cache → candidates → breaker gate → timed call → classify /
//! record / back off / advance.
//!
//! ARCHITECTURAL RULE: feature code never picks a model or calls a provider
//! itself. It states a task type and a prompt; routing, fallback, caching and
//! spend accounting all happen here.

pub mod breaker;
pub mod classifier;
pub mod registry;
pub mod transport;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::{flatten_request, request_digest, ResponseCache};
use crate::gateway::breaker::{BreakerRegistry, BreakerSnapshot};
use crate::gateway::classifier::{classify, retry_config};
use crate::gateway::registry::ModelRegistry;
use crate::gateway::transport::{Transport, TransportReply};
use crate::models::model::{ComplexityTier, ModelConfig, RoutingCriteria};
use crate::models::response::{AiResponse, CacheKind, Message, TokenUsage};
use crate::quality::benchmarks::{find_suite, BenchmarkTest};
use crate::quality::QualityEvaluator;
use crate::telemetry::{CallReport, TelemetrySink, UsageSnapshot, UsageTotals};

/// Terminal gateway failures. Recoverable ones never escape: they are
/// consumed by the retry budget and the candidate walk.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration problem: the registry has nothing eligible to try.
    #[error("no eligible models for task '{task_type}' at {complexity:?} complexity")]
    NoEligibleModels {
        task_type: String,
        complexity: ComplexityTier,
    },

    /// Availability problem: everything eligible was tried and failed.
    #[error("all providers failed for task '{task_type}' ({attempts} attempts): {last_error}")]
    AllProvidersFailed {
        task_type: String,
        attempts: u32,
        last_error: String,
    },

    /// The caller's deadline expired before any candidate succeeded.
    #[error("deadline exceeded for task '{task_type}'")]
    DeadlineExceeded { task_type: String },

    #[error("unknown benchmark suite '{0}'")]
    UnknownSuite(String),
}

/// Request-level knobs. `complexity` is derived by the caller (an external
/// collaborator); absent it we assume a moderate request.
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub task_type: String,
    pub prompt: String,
    pub context: Option<String>,
    pub criteria: RoutingCriteria,
    pub complexity: ComplexityTier,
    /// Aborts in-flight work and remaining retries/candidates once reached.
    pub deadline: Option<Instant>,
}

impl AnalyzeRequest {
    pub fn new(task_type: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            prompt: prompt.into(),
            context: None,
            criteria: RoutingCriteria::default(),
            complexity: ComplexityTier::default(),
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GatewayTunables {
    /// Per-attempt transport timeout.
    pub call_timeout: Duration,
    /// Global ceiling on attempts against one candidate, on top of the
    /// per-category retry budget.
    pub max_retries: u32,
}

impl Default for GatewayTunables {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(60),
            max_retries: 5,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub providers: HashMap<String, BreakerSnapshot>,
    pub usage: UsageSnapshot,
    pub cache_entries: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct BenchmarkResult {
    pub test_id: String,
    pub test_name: String,
    pub model_used: Option<String>,
    pub score: f64,
    pub latency_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuiteReport {
    pub suite: String,
    pub results: Vec<BenchmarkResult>,
    pub average_score: f64,
    pub ran_at: chrono::DateTime<chrono::Utc>,
}

pub struct ResilienceGateway {
    registry: ModelRegistry,
    breakers: BreakerRegistry,
    cache: ResponseCache,
    transport: Arc<dyn Transport>,
    evaluator: Arc<dyn QualityEvaluator>,
    telemetry: Arc<dyn TelemetrySink>,
    totals: UsageTotals,
    tunables: GatewayTunables,
}

impl ResilienceGateway {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: ModelRegistry,
        breakers: BreakerRegistry,
        cache: ResponseCache,
        transport: Arc<dyn Transport>,
        evaluator: Arc<dyn QualityEvaluator>,
        telemetry: Arc<dyn TelemetrySink>,
        tunables: GatewayTunables,
    ) -> Self {
        Self {
            registry,
            breakers,
            cache,
            transport,
            evaluator,
            telemetry,
            totals: UsageTotals::default(),
            tunables,
        }
    }

    /// The main entry point: cache lookup, then the ordered candidate walk
    /// with per-candidate retries and cross-provider fallback.
    pub async fn analyze_with_fallback(
        &self,
        request: AnalyzeRequest,
    ) -> Result<AiResponse, GatewayError> {
        self.run(request, true).await
    }

    /// Legacy wrapper for callers that only want text back.
    pub async fn generate_response(&self, prompt: &str) -> Result<String, GatewayError> {
        let response = self
            .analyze_with_fallback(AnalyzeRequest::new("general", prompt))
            .await?;
        Ok(response.content)
    }

    pub fn service_health(&self) -> ServiceHealth {
        ServiceHealth {
            providers: self.breakers.snapshots(),
            usage: self.totals.snapshot(),
            cache_entries: self.cache.len(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Runs every test in a suite through the normal resilience path (cache
    /// bypassed so each test elicits a fresh completion) and grades the
    /// answers. A failing test scores 0 without aborting the run.
    pub async fn run_benchmark_suite(&self, suite_name: &str) -> Result<SuiteReport, GatewayError> {
        let suite =
            find_suite(suite_name).ok_or_else(|| GatewayError::UnknownSuite(suite_name.into()))?;

        let mut results = Vec::with_capacity(suite.tests.len());
        for test in &suite.tests {
            results.push(self.run_benchmark_test(test).await);
        }

        let average_score = if results.is_empty() {
            0.0
        } else {
            results.iter().map(|r| r.score).sum::<f64>() / results.len() as f64
        };
        info!(suite = %suite.name, average_score, "benchmark suite finished");

        Ok(SuiteReport {
            suite: suite.name,
            results,
            average_score,
            ran_at: chrono::Utc::now(),
        })
    }

    async fn run_benchmark_test(&self, test: &BenchmarkTest) -> BenchmarkResult {
        let mut request = AnalyzeRequest::new(test.category.clone(), test.prompt_seed.clone());
        request.criteria = RoutingCriteria::Quality;
        let started = Instant::now();

        match self.run(request, false).await {
            Ok(response) => {
                let score = self.evaluator.evaluate(&response.content, test).await;
                BenchmarkResult {
                    test_id: test.id.clone(),
                    test_name: test.name.clone(),
                    model_used: Some(response.model_used),
                    score,
                    latency_ms: started.elapsed().as_millis() as u64,
                    error: None,
                }
            }
            Err(e) => BenchmarkResult {
                test_id: test.id.clone(),
                test_name: test.name.clone(),
                model_used: None,
                score: 0.0,
                latency_ms: started.elapsed().as_millis() as u64,
                error: Some(e.to_string()),
            },
        }
    }

    async fn run(
        &self,
        request: AnalyzeRequest,
        use_cache: bool,
    ) -> Result<AiResponse, GatewayError> {
        let messages = build_messages(&request);

        let candidates =
            self.registry
                .select_candidates(&request.task_type, request.complexity, request.criteria);
        if candidates.is_empty() {
            return Err(GatewayError::NoEligibleModels {
                task_type: request.task_type,
                complexity: request.complexity,
            });
        }

        // The cache digest is keyed on the first-choice model's parameters;
        // a success via a fallback model still lands in the semantic index,
        // so near-identical repeats are served either way.
        let flattened = flatten_request(&messages);
        if use_cache {
            let digest = request_digest(&messages, candidates[0]);
            if let Some((mut hit, kind)) = self.cache.lookup(&digest, &flattened).await {
                debug!(task = %request.task_type, ?kind, "cache hit, no provider contacted");
                hit.cached = true;
                hit.cache_kind = kind;
                self.totals.record_cache_hit();
                return Ok(hit);
            }
        }

        let mut attempts_made = 0u32;
        let mut last_error = String::from("no attempt was made");

        for candidate in &candidates {
            let Some(circuit) = self.breakers.get(&candidate.provider) else {
                warn!(provider = %candidate.provider, "no breaker registered, skipping candidate");
                continue;
            };
            let mut attempt = 0u32;
            loop {
                // Deadline before breaker: a half-open trial claimed by
                // `can_attempt` must always be followed by an attempt.
                let Some(per_attempt) = self.attempt_timeout(&request) else {
                    return Err(GatewayError::DeadlineExceeded {
                        task_type: request.task_type,
                    });
                };
                if !circuit.can_attempt() {
                    debug!(
                        provider = %candidate.provider,
                        model = %candidate.model_name,
                        "circuit open, skipping candidate without network round trip"
                    );
                    break;
                }

                attempts_made += 1;
                let started = Instant::now();
                let outcome =
                    tokio::time::timeout(per_attempt, self.transport.invoke(candidate, &messages))
                        .await;

                let raw_error = match outcome {
                    Ok(Ok(reply)) => {
                        circuit.record_success();
                        let response = self
                            .finish_success(&request, candidate, reply, started, use_cache, &flattened)
                            .await;
                        return Ok(response);
                    }
                    Ok(Err(e)) => e.to_string(),
                    Err(_) => format!(
                        "transport call timed out after {}ms",
                        per_attempt.as_millis()
                    ),
                };

                circuit.record_failure();
                let info = classify(&raw_error, &candidate.provider);
                warn!(
                    provider = %candidate.provider,
                    model = %candidate.model_name,
                    category = ?info.category,
                    severity = ?info.severity,
                    retryable = info.retryable,
                    attempt,
                    "provider call failed: {raw_error}"
                );
                self.telemetry.report(&CallReport {
                    request_id: Uuid::new_v4(),
                    provider: candidate.provider.clone(),
                    model: candidate.model_name.clone(),
                    latency_ms: started.elapsed().as_millis() as u64,
                    token_usage: TokenUsage::default(),
                    cost: 0.0,
                    success: false,
                });
                last_error = raw_error;

                let policy = retry_config(&info);
                let budget = policy.max_attempts.min(self.tunables.max_retries);
                attempt += 1;
                if !info.retryable || attempt >= budget {
                    break; // advance to the next candidate
                }

                // Suspends only this request's task; the loop re-checks the
                // deadline and the circuit before the next attempt. The sleep
                // never runs past the caller's deadline.
                let mut delay = policy.delay_for(attempt - 1);
                if let Some(deadline) = request.deadline {
                    let remaining = deadline
                        .checked_duration_since(Instant::now())
                        .unwrap_or(Duration::ZERO);
                    delay = delay.min(remaining);
                }
                tokio::time::sleep(delay).await;
            }
        }

        if attempts_made == 0 {
            debug!(task = %request.task_type, "every candidate's circuit was open");
        }
        Err(GatewayError::AllProvidersFailed {
            task_type: request.task_type,
            attempts: attempts_made,
            last_error,
        })
    }

    async fn finish_success(
        &self,
        request: &AnalyzeRequest,
        model: &ModelConfig,
        reply: TransportReply,
        started: Instant,
        use_cache: bool,
        flattened: &str,
    ) -> AiResponse {
        let latency_ms = started.elapsed().as_millis() as u64;
        let cost = reply.usage.total() as f64 * model.cost_per_token;

        let response = AiResponse {
            confidence_score: confidence_for(model, &reply.text),
            content: reply.text,
            model_used: model.model_name.clone(),
            provider: model.provider.clone(),
            processing_time_ms: latency_ms,
            token_usage: reply.usage,
            cost,
            complexity_used: model.complexity_tier,
            cached: false,
            cache_kind: CacheKind::None,
        };

        self.telemetry.report(&CallReport {
            request_id: Uuid::new_v4(),
            provider: response.provider.clone(),
            model: response.model_used.clone(),
            latency_ms,
            token_usage: response.token_usage,
            cost,
            success: true,
        });
        self.totals.record_call(response.token_usage, cost);

        if use_cache {
            let digest = request_digest(&build_messages(request), model);
            self.cache
                .store(
                    digest,
                    flattened,
                    &response,
                    &request.task_type,
                    model.temperature,
                )
                .await;
        }

        response
    }

    /// The timeout for the next attempt: the configured per-call timeout,
    /// shrunk by the caller's deadline. `None` means the deadline already
    /// passed.
    fn attempt_timeout(&self, request: &AnalyzeRequest) -> Option<Duration> {
        match request.deadline {
            None => Some(self.tunables.call_timeout),
            Some(deadline) => {
                let remaining = deadline.checked_duration_since(Instant::now())?;
                if remaining.is_zero() {
                    None
                } else {
                    Some(remaining.min(self.tunables.call_timeout))
                }
            }
        }
    }

    /// Periodic maintenance: cache TTL sweep and open→half-open promotion.
    /// Runs until the gateway is dropped; never blocks a live request.
    pub fn spawn_maintenance(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                self.cache.purge_expired();
                self.breakers.promote_due();
            }
        })
    }
}

fn build_messages(request: &AnalyzeRequest) -> Vec<Message> {
    let mut messages = Vec::with_capacity(2);
    if let Some(context) = &request.context {
        messages.push(Message::system(context.clone()));
    }
    messages.push(Message::user(request.prompt.clone()));
    messages
}

/// Observability-only confidence heuristic: capability tier sets the base,
/// substantial answers earn a small bump.
fn confidence_for(model: &ModelConfig, content: &str) -> f64 {
    let base: f64 = match model.complexity_tier {
        ComplexityTier::Simple => 0.6,
        ComplexityTier::Moderate => 0.7,
        ComplexityTier::Complex => 0.8,
    };
    let bump = if content.len() > 400 { 0.1 } else { 0.0 };
    (base + bump).min(0.95)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::cache::optimizer::CachePolicy;
    use crate::gateway::breaker::BreakerConfig;
    use crate::gateway::transport::TransportError;
    use crate::quality::HeuristicEvaluator;
    use crate::telemetry::TracingSink;
    use async_trait::async_trait;

    /// Scripted transport: pops the next outcome for each provider and
    /// records every call it receives.
    struct MockTransport {
        script: Mutex<HashMap<String, VecDeque<Result<String, String>>>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                script: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn push(&self, provider: &str, outcome: Result<&str, &str>) {
            self.script
                .lock()
                .unwrap()
                .entry(provider.to_string())
                .or_default()
                .push_back(outcome.map(String::from).map_err(String::from));
        }

        fn calls_to(&self, provider: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.as_str() == provider)
                .count()
        }

        fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn invoke(
            &self,
            model: &ModelConfig,
            _messages: &[Message],
        ) -> Result<TransportReply, TransportError> {
            self.calls.lock().unwrap().push(model.provider.clone());
            let next = self
                .script
                .lock()
                .unwrap()
                .get_mut(&model.provider)
                .and_then(|q| q.pop_front());
            match next {
                Some(Ok(text)) => Ok(TransportReply {
                    text,
                    usage: TokenUsage {
                        input_tokens: 10,
                        output_tokens: 90,
                    },
                }),
                Some(Err(message)) => Err(TransportError::Provider(message)),
                None => Err(TransportError::Provider("unscripted call".to_string())),
            }
        }
    }

    fn model(id: &str, provider: &str, cost: f64, priority: u32, tier: ComplexityTier) -> ModelConfig {
        ModelConfig {
            id: id.to_string(),
            provider: provider.to_string(),
            model_name: id.to_string(),
            temperature: 0.3,
            max_tokens: 4096,
            cost_per_token: cost,
            capabilities: vec![],
            priority,
            complexity_tier: tier,
        }
    }

    fn gateway_with(models: Vec<ModelConfig>, transport: Arc<MockTransport>) -> ResilienceGateway {
        let providers = models.iter().map(|m| m.provider.clone()).collect::<Vec<_>>();
        let mut routing = HashMap::new();
        routing.insert(
            "general".to_string(),
            models.iter().map(|m| m.id.clone()).collect(),
        );
        let registry = ModelRegistry::new(models, routing, "general");
        let breakers = BreakerRegistry::new(
            providers,
            BreakerConfig {
                failure_threshold: 5,
                timeout: Duration::from_secs(60),
            },
        );
        let cache = ResponseCache::new(CachePolicy::default(), 0.85, 100, None);
        ResilienceGateway::new(
            registry,
            breakers,
            cache,
            transport,
            Arc::new(HeuristicEvaluator::default()),
            Arc::new(TracingSink),
            GatewayTunables {
                call_timeout: Duration::from_secs(30),
                max_retries: 5,
            },
        )
    }

    fn long_reply() -> String {
        "The candidate clearly has strong skills across the stack. ".repeat(3)
    }

    #[tokio::test]
    async fn test_open_breaker_skipped_without_transport_call() {
        let transport = Arc::new(MockTransport::new());
        let gw = gateway_with(
            vec![
                model("a", "a-provider", 0.01, 2, ComplexityTier::Complex),
                model("b", "b-provider", 0.001, 1, ComplexityTier::Simple),
            ],
            Arc::clone(&transport),
        );
        // Trip A's breaker.
        for _ in 0..5 {
            gw.breakers.get("a-provider").unwrap().record_failure();
        }
        transport.push("b-provider", Ok(&long_reply()));

        let mut req = AnalyzeRequest::new("general", "rank these two offers for me please");
        req.complexity = ComplexityTier::Simple;
        req.criteria = RoutingCriteria::Cost;

        let response = gw.analyze_with_fallback(req).await.unwrap();
        assert_eq!(response.provider, "b-provider");
        assert_eq!(transport.calls_to("a-provider"), 0);
        assert_eq!(transport.calls_to("b-provider"), 1);
    }

    #[tokio::test]
    async fn test_open_first_choice_falls_through_to_next_candidate() {
        let transport = Arc::new(MockTransport::new());
        let gw = gateway_with(
            vec![
                model("cheap", "cheap-provider", 0.001, 2, ComplexityTier::Moderate),
                model("premium", "premium-provider", 0.01, 1, ComplexityTier::Complex),
            ],
            Arc::clone(&transport),
        );
        for _ in 0..5 {
            gw.breakers.get("cheap-provider").unwrap().record_failure();
        }
        transport.push("premium-provider", Ok(&long_reply()));

        let response = gw
            .analyze_with_fallback(AnalyzeRequest::new("general", "a question worth answering"))
            .await
            .unwrap();
        assert_eq!(response.provider, "premium-provider");
        assert_eq!(transport.calls_to("cheap-provider"), 0);
    }

    #[tokio::test]
    async fn test_all_breakers_open_is_terminal_without_network() {
        let transport = Arc::new(MockTransport::new());
        let gw = gateway_with(
            vec![model("a", "a-provider", 0.01, 1, ComplexityTier::Complex)],
            Arc::clone(&transport),
        );
        for _ in 0..5 {
            gw.breakers.get("a-provider").unwrap().record_failure();
        }

        let err = gw
            .analyze_with_fallback(AnalyzeRequest::new("general", "anything"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::AllProvidersFailed { attempts: 0, .. }));
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_no_eligible_models_is_distinct_error() {
        let transport = Arc::new(MockTransport::new());
        let gw = gateway_with(
            vec![model("s", "s-provider", 0.001, 1, ComplexityTier::Simple)],
            Arc::clone(&transport),
        );
        let mut req = AnalyzeRequest::new("general", "hard question");
        req.complexity = ComplexityTier::Complex;

        let err = gw.analyze_with_fallback(req).await.unwrap_err();
        assert!(matches!(err, GatewayError::NoEligibleModels { .. }));
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_failure_retries_same_candidate() {
        let transport = Arc::new(MockTransport::new());
        let gw = gateway_with(
            vec![model("a", "a-provider", 0.01, 1, ComplexityTier::Moderate)],
            Arc::clone(&transport),
        );
        transport.push("a-provider", Err("server error 503"));
        transport.push("a-provider", Ok(&long_reply()));

        let response = gw
            .analyze_with_fallback(AnalyzeRequest::new("general", "question needing one retry"))
            .await
            .unwrap();
        assert_eq!(response.provider, "a-provider");
        assert_eq!(transport.calls_to("a-provider"), 2);
        // The eventual success reset the breaker.
        assert_eq!(
            gw.breakers.get("a-provider").unwrap().snapshot().failure_count,
            0
        );
    }

    #[tokio::test]
    async fn test_auth_failure_advances_without_retrying_same_provider() {
        let transport = Arc::new(MockTransport::new());
        let gw = gateway_with(
            vec![
                model("a", "a-provider", 0.001, 1, ComplexityTier::Moderate),
                model("b", "b-provider", 0.01, 2, ComplexityTier::Moderate),
            ],
            Arc::clone(&transport),
        );
        transport.push("a-provider", Err("invalid api key"));
        transport.push("b-provider", Ok(&long_reply()));

        let response = gw
            .analyze_with_fallback(AnalyzeRequest::new("general", "question hitting a bad key"))
            .await
            .unwrap();
        assert_eq!(response.provider, "b-provider");
        assert_eq!(transport.calls_to("a-provider"), 1, "auth errors are never retried");
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_candidates_surface_all_providers_failed() {
        let transport = Arc::new(MockTransport::new());
        let gw = gateway_with(
            vec![
                model("a", "a-provider", 0.001, 1, ComplexityTier::Moderate),
                model("b", "b-provider", 0.01, 2, ComplexityTier::Moderate),
            ],
            Arc::clone(&transport),
        );
        // Everything fails with a non-retryable category.
        transport.push("a-provider", Err("invalid api key"));
        transport.push("b-provider", Err("invalid api key"));

        let err = gw
            .analyze_with_fallback(AnalyzeRequest::new("general", "doomed question"))
            .await
            .unwrap_err();
        match err {
            GatewayError::AllProvidersFailed { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("expected AllProvidersFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_second_identical_request_served_from_cache() {
        let transport = Arc::new(MockTransport::new());
        let gw = gateway_with(
            vec![model("a", "a-provider", 0.01, 1, ComplexityTier::Moderate)],
            Arc::clone(&transport),
        );
        transport.push("a-provider", Ok(&long_reply()));

        let prompt = "summarize this job description for a recruiter audience";
        let first = gw
            .analyze_with_fallback(AnalyzeRequest::new("general", prompt))
            .await
            .unwrap();
        assert!(!first.cached);

        let second = gw
            .analyze_with_fallback(AnalyzeRequest::new("general", prompt))
            .await
            .unwrap();
        assert!(second.cached);
        assert_eq!(second.cache_kind, CacheKind::Exact);
        assert_eq!(second.content, first.content);
        assert_eq!(transport.total_calls(), 1, "cache hit must not touch the transport");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_aborts_remaining_work() {
        let transport = Arc::new(MockTransport::new());
        let gw = gateway_with(
            vec![model("a", "a-provider", 0.01, 1, ComplexityTier::Moderate)],
            Arc::clone(&transport),
        );
        // Retryable failures forever; the deadline has to cut the loop.
        for _ in 0..10 {
            transport.push("a-provider", Err("server error 503"));
        }

        let mut req = AnalyzeRequest::new("general", "question under a tight deadline");
        req.deadline = Some(Instant::now() + Duration::from_millis(1500));

        let err = gw.analyze_with_fallback(req).await.unwrap_err();
        assert!(matches!(err, GatewayError::DeadlineExceeded { .. }));
        assert!(transport.total_calls() >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sleep_is_clipped_to_the_deadline() {
        let transport = Arc::new(MockTransport::new());
        let gw = gateway_with(
            vec![model("a", "a-provider", 0.01, 1, ComplexityTier::Moderate)],
            Arc::clone(&transport),
        );
        for _ in 0..10 {
            transport.push("a-provider", Err("server error 503"));
        }

        let started = Instant::now();
        let mut req = AnalyzeRequest::new("general", "question under a tight deadline");
        req.deadline = Some(started + Duration::from_millis(1500));

        let err = gw.analyze_with_fallback(req).await.unwrap_err();
        assert!(matches!(err, GatewayError::DeadlineExceeded { .. }));
        // Two attempts fit: a 1s backoff, then the 2s backoff is clipped to
        // the 500ms left instead of overshooting to 3s.
        assert_eq!(transport.calls_to("a-provider"), 2);
        assert!(started.elapsed() <= Duration::from_millis(1600));
    }

    #[tokio::test]
    async fn test_generate_response_returns_content_only() {
        let transport = Arc::new(MockTransport::new());
        let gw = gateway_with(
            vec![model("a", "a-provider", 0.01, 1, ComplexityTier::Moderate)],
            Arc::clone(&transport),
        );
        transport.push("a-provider", Ok("Plain text answer for a legacy caller."));

        let text = gw.generate_response("hello there").await.unwrap();
        assert_eq!(text, "Plain text answer for a legacy caller.");
    }

    #[tokio::test]
    async fn test_service_health_reports_all_providers() {
        let transport = Arc::new(MockTransport::new());
        let gw = gateway_with(
            vec![
                model("a", "a-provider", 0.01, 1, ComplexityTier::Moderate),
                model("b", "b-provider", 0.02, 2, ComplexityTier::Moderate),
            ],
            Arc::clone(&transport),
        );
        for _ in 0..5 {
            gw.breakers.get("b-provider").unwrap().record_failure();
        }

        let health = gw.service_health();
        assert_eq!(health.providers.len(), 2);
        assert!(health.providers["a-provider"].available);
        assert!(!health.providers["b-provider"].available);
        assert_eq!(health.providers["b-provider"].failure_count, 5);
    }

    #[tokio::test]
    async fn test_benchmark_suite_scores_and_bypasses_cache() {
        let transport = Arc::new(MockTransport::new());
        let gw = gateway_with(
            vec![model("a", "a-provider", 0.01, 1, ComplexityTier::Moderate)],
            Arc::clone(&transport),
        );
        // factual-qa suite has two tests; every prompt routes to provider a
        // via the fallback task list.
        transport.push(
            "a-provider",
            Ok("At-will employment means either party may terminate the relationship for any \
                lawful reason. Specifically, no cause is required."),
        );
        transport.push(
            "a-provider",
            Ok("Status 429 means Too Many Requests: the client exceeded a rate limit and should \
                retry after backing off."),
        );

        let report = gw.run_benchmark_suite("factual-qa").await.unwrap();
        assert_eq!(report.results.len(), 2);
        assert!(report.average_score > 0.3, "got {}", report.average_score);
        assert_eq!(transport.total_calls(), 2);
        assert!(gw.cache.is_empty(), "benchmark runs must not populate the cache");
    }

    #[tokio::test]
    async fn test_unknown_suite_rejected() {
        let transport = Arc::new(MockTransport::new());
        let gw = gateway_with(
            vec![model("a", "a-provider", 0.01, 1, ComplexityTier::Moderate)],
            Arc::clone(&transport),
        );
        let err = gw.run_benchmark_suite("nope").await.unwrap_err();
        assert!(matches!(err, GatewayError::UnknownSuite(_)));
    }
}
