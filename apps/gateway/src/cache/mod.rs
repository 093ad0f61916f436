//! Response Cache — exact-match store keyed by a request digest, paired with
//! the semantic similarity index. Both structures live behind one lock so an
//! insert or eviction can never leave them disagreeing.
//!
//! An optional Redis tier backs the exact path only; Redis being down or
//! misconfigured degrades transparently to process-local caching.

pub mod optimizer;
pub mod similarity;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use redis::AsyncCommands;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::optimizer::{recency_frequency_score, CachePolicy};
use crate::cache::similarity::{normalize_text, SimilarityIndex};
use crate::models::model::ModelConfig;
use crate::models::response::{AiResponse, CacheKind, Message};

/// One cached success. Mutated on every hit; removed on expiry or eviction.
#[derive(Debug)]
struct CacheEntry {
    response: AiResponse,
    created_at: Instant,
    last_accessed: Instant,
    access_count: u64,
    ttl: Duration,
}

impl CacheEntry {
    fn expired(&self, now: Instant) -> bool {
        now >= self.created_at + self.ttl
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    index: SimilarityIndex,
}

pub struct ResponseCache {
    inner: Mutex<CacheInner>,
    policy: CachePolicy,
    similarity_threshold: f64,
    capacity: usize,
    redis: Option<redis::Client>,
}

/// Stable digest over the normalized request parameters. Two requests that
/// differ only in whitespace or letter case share a digest.
pub fn request_digest(messages: &[Message], model: &ModelConfig) -> String {
    let mut hasher = blake3::Hasher::new();
    for m in messages {
        hasher.update(m.role.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(normalize_text(&m.content).as_bytes());
        hasher.update(b"\x1e");
    }
    hasher.update(model.model_name.as_bytes());
    hasher.update(format!("|t={:.3}|max={}", model.temperature, model.max_tokens).as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// The request flattened to one normalized string, fed to the similarity
/// index.
pub fn flatten_request(messages: &[Message]) -> String {
    let joined = messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    normalize_text(&joined)
}

impl ResponseCache {
    pub fn new(
        policy: CachePolicy,
        similarity_threshold: f64,
        capacity: usize,
        redis: Option<redis::Client>,
    ) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            policy,
            similarity_threshold,
            capacity,
            redis,
        }
    }

    /// Exact lookup first, then semantic. Expired entries found along the
    /// way are purged, never returned.
    pub async fn lookup(&self, digest: &str, flattened: &str) -> Option<(AiResponse, CacheKind)> {
        let now = Instant::now();
        {
            let mut inner = self.inner.lock().expect("cache lock poisoned");

            if let Some(entry) = inner.entries.get(digest) {
                if entry.expired(now) {
                    inner.entries.remove(digest);
                    inner.index.remove(digest);
                } else {
                    let entry = inner.entries.get_mut(digest).expect("checked above");
                    entry.access_count += 1;
                    entry.last_accessed = now;
                    return Some((entry.response.clone(), CacheKind::Exact));
                }
            }

            let matched = inner
                .index
                .best_match(flattened, self.similarity_threshold)
                .map(|(d, score)| (d.to_string(), score));
            if let Some((matched_digest, score)) = matched {
                if let Some(entry) = inner.entries.get(&matched_digest) {
                    if entry.expired(now) {
                        inner.entries.remove(&matched_digest);
                        inner.index.remove(&matched_digest);
                    } else {
                        let entry = inner
                            .entries
                            .get_mut(&matched_digest)
                            .expect("checked above");
                        entry.access_count += 1;
                        entry.last_accessed = now;
                        debug!(score, "semantic cache hit");
                        return Some((entry.response.clone(), CacheKind::Semantic));
                    }
                }
            }
        }

        self.redis_lookup(digest).await
    }

    /// Stores a response if the optimizer policy admits it. Returns whether
    /// it was cached.
    pub async fn store(
        &self,
        digest: String,
        flattened: &str,
        response: &AiResponse,
        task_type: &str,
        temperature: f64,
    ) -> bool {
        if !self
            .policy
            .should_cache(&response.content, temperature, false)
        {
            return false;
        }
        let ttl = self.policy.compute_ttl(task_type, temperature);

        {
            let mut inner = self.inner.lock().expect("cache lock poisoned");
            let now = Instant::now();
            self.make_room(&mut inner, now);
            inner.index.insert(digest.clone(), flattened);
            inner.entries.insert(
                digest.clone(),
                CacheEntry {
                    response: response.clone(),
                    created_at: now,
                    last_accessed: now,
                    access_count: 0,
                    ttl,
                },
            );
        }

        self.redis_store(&digest, response, ttl).await;
        true
    }

    /// Drops expired entries and anything past the retention ceiling, from
    /// store and index together. Called by background maintenance.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let now = Instant::now();
        let dead: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.expired(now) || self.policy.past_retention(now - e.created_at))
            .map(|(d, _)| d.clone())
            .collect();
        for digest in &dead {
            inner.entries.remove(digest);
            inner.index.remove(digest);
        }
        if !dead.is_empty() {
            debug!(purged = dead.len(), "cache sweep removed expired entries");
        }
        dead.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").entries.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Under capacity pressure, evicts expired entries first, then the entry
    /// with the lowest access-weighted recency score.
    fn make_room(&self, inner: &mut CacheInner, now: Instant) {
        while inner.entries.len() >= self.capacity {
            let victim = inner
                .entries
                .iter()
                .min_by(|(_, a), (_, b)| {
                    let ea = a.expired(now);
                    let eb = b.expired(now);
                    // Expired entries sort first.
                    eb.cmp(&ea).then(
                        recency_frequency_score(a.access_count, now - a.last_accessed).total_cmp(
                            &recency_frequency_score(b.access_count, now - b.last_accessed),
                        ),
                    )
                })
                .map(|(d, _)| d.clone());
            match victim {
                Some(digest) => {
                    inner.entries.remove(&digest);
                    inner.index.remove(&digest);
                }
                None => break,
            }
        }
    }

    async fn redis_lookup(&self, digest: &str) -> Option<(AiResponse, CacheKind)> {
        let client = self.redis.as_ref()?;
        let mut conn = match client.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                warn!("redis unavailable, serving from local cache only: {e}");
                return None;
            }
        };
        let raw: Option<String> = match conn.get(redis_key(digest)).await {
            Ok(v) => v,
            Err(e) => {
                warn!("redis GET failed: {e}");
                return None;
            }
        };
        let raw = raw?;
        match serde_json::from_str::<AiResponse>(&raw) {
            Ok(response) => Some((response, CacheKind::Exact)),
            Err(e) => {
                warn!("discarding undecodable redis cache value: {e}");
                None
            }
        }
    }

    async fn redis_store(&self, digest: &str, response: &AiResponse, ttl: Duration) {
        let Some(client) = self.redis.as_ref() else {
            return;
        };
        let payload = match serde_json::to_string(response) {
            Ok(p) => p,
            Err(e) => {
                warn!("failed to serialize response for redis: {e}");
                return;
            }
        };
        match client.get_multiplexed_async_connection().await {
            Ok(mut conn) => {
                let result: redis::RedisResult<()> = conn
                    .set_ex(redis_key(digest), payload, ttl.as_secs())
                    .await;
                if let Err(e) = result {
                    warn!("redis SETEX failed: {e}");
                }
            }
            Err(e) => warn!("redis unavailable, entry kept local only: {e}"),
        }
    }
}

fn redis_key(digest: &str) -> String {
    format!("gateway:cache:{digest}")
}
