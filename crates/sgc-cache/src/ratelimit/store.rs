//! Counter backends for rate rules

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter as GovernorLimiter};

use super::rule::RateRule;
use crate::pool::{RedisPool, RedisResult};

/// Outcome of counting one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after_secs: u64 },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Counts hits of `key` against `rule` within a named bucket
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn hit(&self, bucket: &str, key: &str, rule: &RateRule) -> RedisResult<RateDecision>;

    /// Forget counters that no longer limit anyone. Stores whose keys
    /// expire on their own keep the default no-op.
    fn prune(&self) {}
}

// ============================================================================
// In-process store
// ============================================================================

/// Per-process GCRA limiters, one keyed limiter per bucket and rule
#[derive(Default)]
pub struct MemoryRateLimitStore {
    limiters: DashMap<(String, RateRule), Arc<DefaultKeyedRateLimiter<String>>>,
    clock: DefaultClock,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn limiter(&self, bucket: &str, rule: &RateRule) -> Arc<DefaultKeyedRateLimiter<String>> {
        self.limiters
            .entry((bucket.to_string(), *rule))
            .or_insert_with(|| Arc::new(GovernorLimiter::keyed(quota(rule))))
            .clone()
    }

    /// Keys currently holding limiter state, across every bucket
    pub fn tracked_keys(&self) -> usize {
        self.limiters.iter().map(|limiter| limiter.len()).sum()
    }
}

/// Burst of `limit`, refilled evenly across the window
fn quota(rule: &RateRule) -> Quota {
    let per_cell = rule.window() / rule.limit.get();
    Quota::with_period(per_cell)
        .unwrap_or_else(|| Quota::per_second(rule.limit))
        .allow_burst(rule.limit)
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn hit(&self, bucket: &str, key: &str, rule: &RateRule) -> RedisResult<RateDecision> {
        let limiter = self.limiter(bucket, rule);
        Ok(match limiter.check_key(&key.to_string()) {
            Ok(()) => RateDecision::Allowed,
            Err(not_until) => {
                let wait = not_until.wait_time_from(self.clock.now());
                RateDecision::Limited {
                    retry_after_secs: wait.as_secs() + u64::from(wait.subsec_nanos() > 0),
                }
            }
        })
    }

    /// Drop state for keys that are back at full capacity
    fn prune(&self) {
        for limiter in self.limiters.iter() {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }
}

// ============================================================================
// Redis store
// ============================================================================

const KEY_PREFIX: &str = "sgc:rl";

/// Fixed-window counters shared by every instance using the same Redis
#[derive(Debug, Clone)]
pub struct RedisRateLimitStore {
    pool: RedisPool,
}

impl RedisRateLimitStore {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

/// Redis key and seconds left in the window containing `now`
fn window_key(bucket: &str, key: &str, rule: &RateRule, now: i64) -> (String, u64) {
    let window = rule.period.as_secs() as i64;
    let index = now.div_euclid(window);
    let remaining = window - now.rem_euclid(window);
    (
        format!("{KEY_PREFIX}:{bucket}:{key}:{}:{index}", rule.period.as_str()),
        remaining as u64,
    )
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn hit(&self, bucket: &str, key: &str, rule: &RateRule) -> RedisResult<RateDecision> {
        let (redis_key, remaining) = window_key(bucket, key, rule, Utc::now().timestamp());
        let mut conn = self.pool.get().await?;

        let (count,): (u64,) = redis::pipe()
            .atomic()
            .incr(&redis_key, 1u64)
            .expire(&redis_key, rule.period.as_secs() as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;

        if count > u64::from(rule.limit.get()) {
            Ok(RateDecision::Limited {
                retry_after_secs: remaining.max(1),
            })
        } else {
            Ok(RateDecision::Allowed)
        }
    }
}
