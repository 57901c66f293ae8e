//! Fail-open facade over a rate-limit store

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use super::rule::RateRule;
use super::store::{RateDecision, RateLimitStore};

/// Shared handle used by the HTTP layer
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store }
    }

    /// Count one request. Store failures let the request through.
    pub async fn check(&self, bucket: &str, key: &str, rule: &RateRule) -> RateDecision {
        match self.store.hit(bucket, key, rule).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(bucket, error = %e, "Rate limit store unavailable, allowing request");
                RateDecision::Allowed
            }
        }
    }

    pub fn prune(&self) {
        self.store.prune();
    }

    /// Prune the store every `every` until the runtime stops
    pub fn spawn_prune_task(&self, every: Duration) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                limiter.prune();
                debug!("Rate limit state pruned");
            }
        })
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}
