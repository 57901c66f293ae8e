//! # sgc-cache
//!
//! Redis connection pool and rate-limit stores.
//!
//! ## Features
//!
//! - **Connection Pool**: Managed Redis connection pool with deadpool
//! - **Rate Limiting**: `"<n> per <period>"` rules counted either in process
//!   (governor) or in Redis (fixed windows shared between instances)
//!
//! ## Example
//!
//! ```ignore
//! use sgc_cache::{RateLimiter, RateRule, RedisPool, RedisRateLimitStore};
//!
//! let pool = RedisPool::from_config(&redis_config)?;
//! let limiter = RateLimiter::new(Arc::new(RedisRateLimitStore::new(pool)));
//!
//! let rule: RateRule = "10 per minute".parse()?;
//! if let RateDecision::Limited { retry_after_secs } = limiter.check("login", "203.0.113.9", &rule).await {
//!     // respond 429
//! }
//! ```

pub mod pool;
pub mod ratelimit;

// Re-export pool types
pub use pool::{RedisPool, RedisPoolConfig, RedisPoolError, RedisResult};

// Re-export rate limit types
pub use ratelimit::{
    MemoryRateLimitStore, RateDecision, RateLimitStore, RateLimiter, RatePeriod, RateRule,
    RateRuleError, RateRules, RedisRateLimitStore,
};
