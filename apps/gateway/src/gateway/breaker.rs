//! Circuit Breaker — one instance per provider, gating whether an attempt
//! may be made against it.
//!
//! CLOSED → OPEN once failure_count reaches the threshold; OPEN → HALF_OPEN
//! after the cooldown elapses, admitting exactly one trial; the trial's
//! outcome decides CLOSED (success) or OPEN again (failure, cooldown restarts).
//!
//! Breakers live in an explicit `BreakerRegistry` built from the provider
//! list at startup, so tests can inject isolated instances instead of
//! touching process-wide state. Each breaker has its own lock; breakers for
//! different providers never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    next_attempt: Option<Instant>,
    /// Set while the single half-open trial is out, so concurrent requests
    /// cannot both probe a recovering provider.
    trial_in_flight: bool,
}

/// Per-provider failure state machine. All transitions happen under the
/// internal mutex; critical sections are a few field updates.
#[derive(Debug)]
pub struct CircuitBreaker {
    provider: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

/// Snapshot for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub available: bool,
}

impl CircuitBreaker {
    pub fn new(provider: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            provider: provider.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                next_attempt: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Whether a call may be issued right now. Performs the OPEN → HALF_OPEN
    /// transition (and claims the single trial) when the cooldown has elapsed.
    pub fn can_attempt(&self) -> bool {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let due = inner
                    .next_attempt
                    .map(|t| Instant::now() >= t)
                    .unwrap_or(true);
                if due {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    info!(provider = %self.provider, "circuit half-open, admitting trial call");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    false
                } else {
                    inner.trial_in_flight = true;
                    true
                }
            }
        }
    }

    /// Records a successful call: failure count resets, circuit closes.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if inner.state != CircuitState::Closed {
            info!(provider = %self.provider, "circuit closed after successful call");
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.trial_in_flight = false;
        inner.next_attempt = None;
    }

    /// Records a failed call. Opens the circuit once the threshold is
    /// reached; a failed half-open trial reopens it and restarts the cooldown.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        let now = Instant::now();
        inner.failure_count += 1;
        inner.last_failure = Some(now);
        inner.trial_in_flight = false;

        let tripped = inner.state == CircuitState::HalfOpen
            || inner.failure_count >= self.config.failure_threshold;
        if tripped && inner.state != CircuitState::Open {
            inner.state = CircuitState::Open;
            inner.next_attempt = Some(now + self.config.timeout);
            warn!(
                provider = %self.provider,
                failures = inner.failure_count,
                cooldown_secs = self.config.timeout.as_secs(),
                "circuit opened"
            );
        } else if inner.state == CircuitState::Open {
            inner.next_attempt = Some(now + self.config.timeout);
        }
    }

    /// OPEN → HALF_OPEN when the cooldown has elapsed, without claiming the
    /// trial. Used by background maintenance so health reporting reflects
    /// recoverability; the trial itself is still admitted via `can_attempt`.
    pub fn promote_if_due(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if inner.state == CircuitState::Open {
            let due = inner
                .next_attempt
                .map(|t| Instant::now() >= t)
                .unwrap_or(true);
            if due {
                inner.state = CircuitState::HalfOpen;
                inner.trial_in_flight = false;
            }
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock().expect("breaker lock poisoned");
        let available = match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => !inner.trial_in_flight,
            CircuitState::Open => inner
                .next_attempt
                .map(|t| Instant::now() >= t)
                .unwrap_or(true),
        };
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            available,
        }
    }
}

/// Owns one breaker per known provider. The map is immutable after
/// construction, so lookups need no lock and providers never share one.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: HashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(providers: impl IntoIterator<Item = String>, config: BreakerConfig) -> Self {
        let breakers = providers
            .into_iter()
            .map(|p| {
                let breaker = Arc::new(CircuitBreaker::new(p.clone(), config));
                (p, breaker)
            })
            .collect();
        Self { breakers }
    }

    pub fn get(&self, provider: &str) -> Option<&Arc<CircuitBreaker>> {
        self.breakers.get(provider)
    }

    pub fn promote_due(&self) {
        for breaker in self.breakers.values() {
            breaker.promote_if_due();
        }
    }

    pub fn snapshots(&self) -> HashMap<String, BreakerSnapshot> {
        self.breakers
            .iter()
            .map(|(p, b)| (p.clone(), b.snapshot()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test-provider",
            BreakerConfig {
                failure_threshold: threshold,
                timeout,
            },
        )
    }

    #[test]
    fn test_closed_allows_attempts() {
        let b = breaker(5, Duration::from_secs(60));
        assert!(b.can_attempt());
        assert_eq!(b.snapshot().state, CircuitState::Closed);
    }

    #[test]
    fn test_opens_at_threshold() {
        let b = breaker(5, Duration::from_secs(60));
        for _ in 0..4 {
            b.record_failure();
            assert_eq!(b.snapshot().state, CircuitState::Closed);
        }
        b.record_failure();
        assert_eq!(b.snapshot().state, CircuitState::Open);
        assert!(!b.can_attempt());
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_after_cooldown_admits_exactly_one_trial() {
        let b = breaker(1, Duration::from_secs(60));
        b.record_failure();
        assert!(!b.can_attempt());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(b.can_attempt(), "first post-cooldown attempt admitted");
        assert!(!b.can_attempt(), "second concurrent trial refused");
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_trial_closes_and_resets() {
        let b = breaker(2, Duration::from_secs(30));
        b.record_failure();
        b.record_failure();
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(b.can_attempt());

        b.record_success();
        let snap = b.snapshot();
        assert_eq!(snap.state, CircuitState::Closed);
        assert_eq!(snap.failure_count, 0);
        assert!(b.can_attempt());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_trial_reopens_with_fresh_cooldown() {
        let b = breaker(1, Duration::from_secs(60));
        b.record_failure();
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(b.can_attempt());

        b.record_failure();
        assert_eq!(b.snapshot().state, CircuitState::Open);
        assert!(!b.can_attempt());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(b.can_attempt());
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_promotion_still_single_trial() {
        let b = breaker(1, Duration::from_secs(10));
        b.record_failure();
        tokio::time::advance(Duration::from_secs(11)).await;

        b.promote_if_due();
        assert_eq!(b.snapshot().state, CircuitState::HalfOpen);
        assert!(b.can_attempt());
        assert!(!b.can_attempt());
    }

    #[test]
    fn test_registry_isolated_per_provider() {
        let reg = BreakerRegistry::new(
            vec!["a".to_string(), "b".to_string()],
            BreakerConfig {
                failure_threshold: 1,
                timeout: Duration::from_secs(60),
            },
        );
        reg.get("a").unwrap().record_failure();
        assert!(!reg.get("a").unwrap().can_attempt());
        assert!(reg.get("b").unwrap().can_attempt());
        assert!(reg.get("unknown").is_none());
    }
}
