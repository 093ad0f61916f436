//! Cache Optimizer — pure policy for what to cache, for how long, and what
//! to evict first.

use std::time::Duration;

/// Tunables with conservative defaults. All durations are wall-clock.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// Responses shorter than this are too cheap to regenerate; caching them
    /// only adds churn risk.
    pub min_content_len: usize,
    /// Above this temperature, output is not safely reusable.
    pub max_cacheable_temperature: f64,
    pub base_ttl: Duration,
    pub max_ttl: Duration,
    /// Entries older than this are evicted regardless of usage.
    pub retention_ceiling: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            min_content_len: 20,
            max_cacheable_temperature: 0.7,
            base_ttl: Duration::from_secs(60 * 60),
            max_ttl: Duration::from_secs(24 * 60 * 60),
            retention_ceiling: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// Task types whose answers change slowly; they earn a longer TTL.
const STABLE_TASK_TYPES: &[&str] = &[
    "analysis",
    "resume-parsing",
    "contract-scoring",
    "factual-qa",
];

impl CachePolicy {
    /// Whether a successful response is worth caching at all.
    pub fn should_cache(&self, content: &str, temperature: f64, is_error: bool) -> bool {
        if is_error {
            return false;
        }
        if content.len() < self.min_content_len {
            return false;
        }
        temperature <= self.max_cacheable_temperature
    }

    /// Adaptive TTL: starts at the base, scaled up for stable task types and
    /// near-deterministic sampling, capped at the maximum.
    pub fn compute_ttl(&self, task_type: &str, temperature: f64) -> Duration {
        let mut ttl = self.base_ttl;
        if STABLE_TASK_TYPES.contains(&task_type) {
            ttl *= 4;
        }
        if temperature <= 0.3 {
            ttl *= 2;
        }
        ttl.min(self.max_ttl)
    }

    /// Retention-ceiling check; capacity-pressure eviction picks the lowest
    /// `recency_frequency_score` instead.
    pub fn past_retention(&self, age: Duration) -> bool {
        age > self.retention_ceiling
    }
}

/// Access-weighted LRU score: more accesses and more recent use both raise
/// it. The lowest-scoring entry is evicted first under capacity pressure.
pub fn recency_frequency_score(access_count: u64, since_last_access: Duration) -> f64 {
    let hours_idle = since_last_access.as_secs_f64() / 3600.0;
    access_count as f64 / (1.0 + hours_idle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_never_cached() {
        let p = CachePolicy::default();
        assert!(!p.should_cache("a perfectly long error description here", 0.2, true));
    }

    #[test]
    fn test_short_response_not_cached() {
        let p = CachePolicy::default();
        assert!(!p.should_cache("too short", 0.2, false));
    }

    #[test]
    fn test_high_temperature_not_cached() {
        let p = CachePolicy::default();
        assert!(!p.should_cache(&"x".repeat(100), 0.9, false));
        assert!(p.should_cache(&"x".repeat(100), 0.7, false));
    }

    #[test]
    fn test_ttl_scales_for_stable_low_temperature_tasks() {
        let p = CachePolicy::default();
        let ttl = p.compute_ttl("analysis", 0.1);
        assert!(ttl > p.base_ttl);
        // 1h * 4 (stable) * 2 (low temp) = 8h
        assert_eq!(ttl, Duration::from_secs(8 * 60 * 60));
    }

    #[test]
    fn test_ttl_base_for_volatile_tasks() {
        let p = CachePolicy::default();
        assert_eq!(p.compute_ttl("creative-writing", 0.6), p.base_ttl);
    }

    #[test]
    fn test_ttl_capped_at_max() {
        let p = CachePolicy {
            base_ttl: Duration::from_secs(20 * 60 * 60),
            ..Default::default()
        };
        assert_eq!(p.compute_ttl("analysis", 0.0), p.max_ttl);
    }

    #[test]
    fn test_retention_ceiling() {
        let p = CachePolicy::default();
        assert!(!p.past_retention(Duration::from_secs(6 * 24 * 60 * 60)));
        assert!(p.past_retention(Duration::from_secs(8 * 24 * 60 * 60)));
    }

    #[test]
    fn test_score_prefers_hot_entries() {
        let hot = recency_frequency_score(10, Duration::from_secs(60));
        let cold = recency_frequency_score(10, Duration::from_secs(48 * 3600));
        let rare = recency_frequency_score(1, Duration::from_secs(60));
        assert!(hot > cold);
        assert!(hot > rare);
    }
}
