//! Route definitions
//!
//! Browser auth pages at the root, the JSON API under /api/v1, health
//! checks outside both. Each group carries its own rate-limit policy.

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
    Router,
};

use crate::handlers::{audit, auth, browser, health, invites, users};
use crate::middleware::rate_limit::enforce;
use crate::middleware::{ClientIpKey, PrincipalOrIpKey, RateLimitPolicy};
use crate::state::AppState;

/// Create the main router with every route group
pub fn create_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(health_routes())
        .merge(browser_routes(state))
        .nest("/api/v1", api_v1_routes(state))
}

/// Health check routes (never rate limited)
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
}

fn limited(router: Router<AppState>, policy: RateLimitPolicy) -> Router<AppState> {
    router.route_layer(from_fn_with_state(policy, enforce))
}

/// API v1 routes
fn api_v1_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(api_auth_routes(state))
        .merge(admin_routes(state))
}

/// Token endpoints
fn api_auth_routes(state: &AppState) -> Router<AppState> {
    let rules = state.rules();

    let login = limited(
        Router::new().route("/auth/login", post(auth::login)),
        RateLimitPolicy::new(state, "api_login", rules.login, ClientIpKey),
    );
    let tokens = limited(
        Router::new()
            .route("/auth/refresh", post(auth::refresh))
            .route("/auth/logout", post(auth::logout)),
        RateLimitPolicy::new(state, "api_refresh", rules.refresh, ClientIpKey),
    );
    let session = limited(
        Router::new()
            .route("/auth/me", get(auth::me))
            .route("/auth/logout_all", post(auth::logout_all)),
        RateLimitPolicy::new(state, "api_authenticated", rules.authenticated, PrincipalOrIpKey),
    );

    Router::new().merge(login).merge(tokens).merge(session)
}

/// Admin-only account, invite and audit routes
fn admin_routes(state: &AppState) -> Router<AppState> {
    let router = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/export.csv", get(users::export_users))
        .route("/users/:id/approve", patch(users::approve_user))
        .route("/users/:id/reject", patch(users::reject_user))
        .route("/users/:id/force-password-change", patch(users::force_password_change))
        .route("/users/:id/reset-link", post(users::reset_link))
        .route("/users/:id/revoke-sessions", post(users::revoke_sessions))
        .route("/invites", post(invites::create_invite).get(invites::list_invites))
        .route("/invites/:token", delete(invites::revoke_invite))
        .route("/audit", get(audit::list_events));

    limited(
        router,
        RateLimitPolicy::new(state, "api_authenticated", state.rules().authenticated, PrincipalOrIpKey),
    )
}

/// Browser auth pages; only form posts count against the quotas
fn browser_routes(state: &AppState) -> Router<AppState> {
    let rules = state.rules();

    let login = limited(
        Router::new()
            .route("/auth/login", get(browser::login_page).post(browser::login))
            .route("/auth/totp/setup", get(browser::totp_setup_page).post(browser::totp_setup))
            .route("/auth/totp/verify", get(browser::totp_verify_page).post(browser::totp_verify)),
        RateLimitPolicy::new(state, "login", rules.login, ClientIpKey).writes_only(),
    );
    let recovery = limited(
        Router::new()
            .route(
                "/auth/forgot-password",
                get(browser::forgot_password_page).post(browser::forgot_password),
            )
            .route(
                "/auth/reset-password/:token",
                get(browser::reset_password_page).post(browser::reset_password),
            ),
        RateLimitPolicy::new(state, "forgot", rules.forgot, ClientIpKey).writes_only(),
    );
    let register = limited(
        Router::new().route("/auth/register", get(browser::register_page).post(browser::register)),
        RateLimitPolicy::new(state, "register", rules.register, ClientIpKey).writes_only(),
    );
    let change_password = limited(
        Router::new().route(
            "/auth/change-password",
            get(browser::change_password_page).post(browser::change_password),
        ),
        RateLimitPolicy::new(state, "change_password", rules.authenticated, PrincipalOrIpKey).writes_only(),
    );

    Router::new()
        .route("/auth/logout", get(browser::logout))
        .merge(login)
        .merge(recovery)
        .merge(register)
        .merge(change_password)
}
