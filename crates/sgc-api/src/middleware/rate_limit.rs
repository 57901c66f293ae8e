//! Per-route rate limiting
//!
//! A [`RateLimitPolicy`] pairs a bucket and rule with a [`KeyStrategy`].
//! Requests over quota get 429 without reaching the handler.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{request::Parts, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use sgc_cache::{RateDecision, RateRule};
use sgc_common::AppError;
use tracing::warn;

use crate::extractors::{request_ip, session::session_principal};
use crate::response::ApiError;
use crate::state::AppState;

/// Derives the counter key of a request
pub trait KeyStrategy: Send + Sync {
    fn key(&self, parts: &Parts, state: &AppState) -> String;
}

fn ip_key(parts: &Parts, state: &AppState) -> String {
    request_ip(parts, state).map_or_else(|| "ip:unknown".to_string(), |ip| format!("ip:{ip}"))
}

/// Key by client IP
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientIpKey;

impl KeyStrategy for ClientIpKey {
    fn key(&self, parts: &Parts, state: &AppState) -> String {
        ip_key(parts, state)
    }
}

/// Key by the authenticated account, falling back to the client IP
#[derive(Debug, Clone, Copy, Default)]
pub struct PrincipalOrIpKey;

impl KeyStrategy for PrincipalOrIpKey {
    fn key(&self, parts: &Parts, state: &AppState) -> String {
        let bearer_user = parts
            .headers
            .typed_get::<Authorization<Bearer>>()
            .and_then(|Authorization(bearer)| state.jwt_service().verify_access(bearer.token()))
            .and_then(|claims| claims.user_id());

        bearer_user
            .or_else(|| {
                session_principal(&parts.headers, state.cookie_key()).map(|p| p.user_id)
            })
            .map_or_else(|| ip_key(parts, state), |user_id| format!("user:{user_id}"))
    }
}

/// Quota applied to a group of routes
#[derive(Clone)]
pub struct RateLimitPolicy {
    state: AppState,
    bucket: &'static str,
    rule: RateRule,
    strategy: Arc<dyn KeyStrategy>,
    writes_only: bool,
}

impl RateLimitPolicy {
    pub fn new(state: &AppState, bucket: &'static str, rule: RateRule, strategy: impl KeyStrategy + 'static) -> Self {
        Self {
            state: state.clone(),
            bucket,
            rule,
            strategy: Arc::new(strategy),
            writes_only: false,
        }
    }

    /// Leave `GET`/`HEAD` (form pages) uncounted
    pub fn writes_only(mut self) -> Self {
        self.writes_only = true;
        self
    }
}

/// Middleware body for `from_fn_with_state`
pub async fn enforce(State(policy): State<RateLimitPolicy>, request: Request, next: Next) -> Response {
    if policy.writes_only && matches!(*request.method(), Method::GET | Method::HEAD) {
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let key = policy.strategy.key(&parts, &policy.state);

    match policy.state.limiter().check(policy.bucket, &key, &policy.rule).await {
        RateDecision::Allowed => next.run(Request::from_parts(parts, body)).await,
        RateDecision::Limited { retry_after_secs } => {
            warn!(
                bucket = policy.bucket,
                key = %key,
                rule = %policy.rule,
                path = %parts.uri.path(),
                "Rate limit exceeded"
            );
            ApiError::from(AppError::RateLimited { retry_after_secs }).into_response()
        }
    }
}
