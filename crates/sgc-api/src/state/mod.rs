//! Application state
//!
//! Holds the shared state for the Axum application: the service context,
//! configuration, the rate limiter with its rules and the session cookie key.

use std::net::IpAddr;
use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sgc_cache::{RateLimiter, RateRules, RedisPool};
use sgc_common::{AppConfig, JwtService};
use sgc_service::ServiceContext;
use sha2::{Digest, Sha512};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Service context containing all dependencies
    service_context: Arc<ServiceContext>,
    /// Application configuration
    config: Arc<AppConfig>,
    limiter: RateLimiter,
    rules: RateRules,
    cookie_key: Key,
    redis: Option<RedisPool>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(
        service_context: ServiceContext,
        config: AppConfig,
        limiter: RateLimiter,
        rules: RateRules,
        redis: Option<RedisPool>,
    ) -> Self {
        let cookie_key = derive_cookie_key(&config.security.secret_key);
        Self {
            service_context: Arc::new(service_context),
            config: Arc::new(config),
            limiter,
            rules,
            cookie_key,
            redis,
        }
    }

    /// Get the service context
    pub fn service_context(&self) -> &ServiceContext {
        &self.service_context
    }

    /// Get the application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Get the JWT service from the service context
    pub fn jwt_service(&self) -> &JwtService {
        self.service_context.jwt_service()
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn rules(&self) -> &RateRules {
        &self.rules
    }

    /// Key signing the session cookie
    pub fn cookie_key(&self) -> &Key {
        &self.cookie_key
    }

    pub fn redis(&self) -> Option<&RedisPool> {
        self.redis.as_ref()
    }

    /// Dev overrides in force; never true in production
    pub fn security_disabled(&self) -> bool {
        self.config.overrides_active()
    }

    pub fn secure_cookies(&self) -> bool {
        self.config.security.session_cookie_secure
    }

    /// Proxies allowed to report the client address
    pub fn trusted_proxies(&self) -> &[IpAddr] {
        &self.config.api.trusted_proxies
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("service_context", &self.service_context)
            .field("rules", &self.rules)
            .field("redis", &self.redis.is_some())
            .finish_non_exhaustive()
    }
}

/// 64-byte signing key from `SECRET_KEY`
fn derive_cookie_key(secret: &str) -> Key {
    let mut hasher = Sha512::new();
    hasher.update(b"sgc-session-cookie");
    hasher.update(secret.as_bytes());
    Key::from(hasher.finalize().as_slice())
}
