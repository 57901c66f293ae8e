//! Request rate limiting
//!
//! Rules come from configuration as `"<n> per <period>"` strings. The
//! in-memory store is per process; the Redis store shares counters across
//! instances.

mod limiter;
mod rule;
mod store;

pub use limiter::RateLimiter;
pub use rule::{RatePeriod, RateRule, RateRuleError, RateRules};
pub use store::{MemoryRateLimitStore, RateDecision, RateLimitStore, RedisRateLimitStore};
