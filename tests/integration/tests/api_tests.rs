//! JSON API integration tests
//!
//! Every test boots an in-memory server, so no external services are needed.
//!
//! Run with: cargo test -p integration-tests --test api_tests

use integration_tests::{
    assert_json, assert_status, AccountPage, AuditEventResponse, ErrorBody, LoginRequest,
    MeResponse, RefreshRequest, TestServer, TestSettings, TokenResponse, ADMIN_EMAIL,
    ADMIN_PASSWORD, STRONG_PASSWORD,
};
use reqwest::StatusCode;
use sgc_core::Role;

async fn admin_tokens(server: &TestServer) -> TokenResponse {
    server.seed_admin(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
    let response = server
        .post("/api/v1/auth/login", &LoginRequest::new(ADMIN_EMAIL, ADMIN_PASSWORD))
        .await
        .unwrap();
    assert_json(response, StatusCode::OK).await.unwrap()
}

// ============================================================================
// Health Check Tests
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await.expect("Failed to start server");
    let response = server.get("/health").await.expect("Request failed");
    assert_status(response, StatusCode::OK).await.unwrap();
}

#[tokio::test]
async fn test_health_ready() {
    let server = TestServer::start().await.expect("Failed to start server");
    let response = server.get("/health/ready").await.expect("Request failed");
    let body: serde_json::Value = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["database"], "healthy");
    assert_eq!(body["checks"]["redis"], "disabled");
}

// ============================================================================
// Auth Tests
// ============================================================================

#[tokio::test]
async fn test_seeded_admin_login_and_me() {
    let server = TestServer::start().await.expect("Failed to start server");
    let tokens = admin_tokens(&server).await;

    assert!(!tokens.access_token.is_empty());
    assert!(!tokens.refresh_token.is_empty());
    assert_eq!(tokens.token_type, "bearer");
    assert!(tokens.expires_in > 0);

    let response = server.get_auth("/api/v1/auth/me", &tokens.access_token).await.unwrap();
    let me: MeResponse = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(me.email.as_deref(), Some(ADMIN_EMAIL));
    assert_eq!(me.role, "admin");
}

#[tokio::test]
async fn test_login_wrong_password_is_generic() {
    let server = TestServer::start().await.expect("Failed to start server");
    server.seed_admin(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();

    let wrong = server
        .post("/api/v1/auth/login", &LoginRequest::new(ADMIN_EMAIL, "nope"))
        .await
        .unwrap();
    let wrong: ErrorBody = assert_json(wrong, StatusCode::UNAUTHORIZED).await.unwrap();

    let unknown = server
        .post("/api/v1/auth/login", &LoginRequest::new("ghost@sgc.cl", "nope"))
        .await
        .unwrap();
    let unknown: ErrorBody = assert_json(unknown, StatusCode::UNAUTHORIZED).await.unwrap();

    assert_eq!(wrong.code, "INVALID_CREDENTIALS");
    assert_eq!(wrong.detail, unknown.detail);
}

#[tokio::test]
async fn test_me_requires_bearer() {
    let server = TestServer::start().await.expect("Failed to start server");
    let response = server.get("/api/v1/auth/me").await.unwrap();
    let body: ErrorBody = assert_json(response, StatusCode::UNAUTHORIZED).await.unwrap();
    assert_eq!(body.code, "MISSING_AUTH");
    assert_eq!(body.path.as_deref(), Some("/api/v1/auth/me"));
}

#[tokio::test]
async fn test_refresh_is_single_use() {
    let server = TestServer::start().await.expect("Failed to start server");
    let first = admin_tokens(&server).await;

    let response = server
        .post("/api/v1/auth/refresh", &RefreshRequest::new(&first.refresh_token))
        .await
        .unwrap();
    let second: TokenResponse = assert_json(response, StatusCode::OK).await.unwrap();
    assert_ne!(second.refresh_token, first.refresh_token);

    let replay = server
        .post("/api/v1/auth/refresh", &RefreshRequest::new(&first.refresh_token))
        .await
        .unwrap();
    let body: ErrorBody = assert_json(replay, StatusCode::UNAUTHORIZED).await.unwrap();
    assert_eq!(body.detail, "refresh revoked or expired");

    let response = server
        .post("/api/v1/auth/refresh", &RefreshRequest::new(&second.refresh_token))
        .await
        .unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();
}

#[tokio::test]
async fn test_access_token_is_not_a_refresh_token() {
    let server = TestServer::start().await.expect("Failed to start server");
    let tokens = admin_tokens(&server).await;

    let response = server
        .post("/api/v1/auth/refresh", &RefreshRequest::new(&tokens.access_token))
        .await
        .unwrap();
    assert_status(response, StatusCode::UNAUTHORIZED).await.unwrap();
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let server = TestServer::start().await.expect("Failed to start server");
    let tokens = admin_tokens(&server).await;

    let response = server
        .post("/api/v1/auth/logout", &RefreshRequest::new(&tokens.refresh_token))
        .await
        .unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();

    let response = server
        .post("/api/v1/auth/refresh", &RefreshRequest::new(&tokens.refresh_token))
        .await
        .unwrap();
    assert_status(response, StatusCode::UNAUTHORIZED).await.unwrap();
}

#[tokio::test]
async fn test_logout_all_revokes_every_session() {
    let server = TestServer::start().await.expect("Failed to start server");
    let first = admin_tokens(&server).await;
    let response = server
        .post("/api/v1/auth/login", &LoginRequest::new(ADMIN_EMAIL, ADMIN_PASSWORD))
        .await
        .unwrap();
    let second: TokenResponse = assert_json(response, StatusCode::OK).await.unwrap();

    let response = server
        .post_auth("/api/v1/auth/logout_all", &first.access_token, &serde_json::json!({}))
        .await
        .unwrap();
    let body: serde_json::Value = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(body["revoked"], 2);

    for token in [&first.refresh_token, &second.refresh_token] {
        let response = server
            .post("/api/v1/auth/refresh", &RefreshRequest::new(token))
            .await
            .unwrap();
        assert_status(response, StatusCode::UNAUTHORIZED).await.unwrap();
    }
}

// ============================================================================
// Lockout & Rate Limit Tests
// ============================================================================

#[tokio::test]
async fn test_lockout_after_five_failures() {
    let server = TestServer::start().await.expect("Failed to start server");
    let admin = admin_tokens(&server).await;
    server
        .create_user("ana", "ana@sgc.cl", STRONG_PASSWORD, Role::Viewer)
        .await
        .unwrap();

    for _ in 0..5 {
        let response = server
            .post("/api/v1/auth/login", &LoginRequest::new("ana@sgc.cl", "wrong-password"))
            .await
            .unwrap();
        assert_status(response, StatusCode::UNAUTHORIZED).await.unwrap();
    }

    let response = server
        .post("/api/v1/auth/login", &LoginRequest::new("ana@sgc.cl", STRONG_PASSWORD))
        .await
        .unwrap();
    let body: ErrorBody = assert_json(response, StatusCode::UNAUTHORIZED).await.unwrap();
    assert_eq!(body.code, "INVALID_CREDENTIALS");

    let response = server
        .get_auth("/api/v1/audit?type=login_lockout", &admin.access_token)
        .await
        .unwrap();
    let events: Vec<AuditEventResponse> = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "login_lockout");
}

#[tokio::test]
async fn test_login_rate_limit() {
    let settings = TestSettings::default().set("RATE_LIMIT_LOGIN", "2 per minute");
    let server = TestServer::start_with(settings).await.expect("Failed to start server");
    let request = LoginRequest::new("ghost@sgc.cl", "nope");

    for _ in 0..2 {
        let response = server.post("/api/v1/auth/login", &request).await.unwrap();
        assert_status(response, StatusCode::UNAUTHORIZED).await.unwrap();
    }

    let response = server.post("/api/v1/auth/login", &request).await.unwrap();
    assert!(response.headers().contains_key("retry-after"));
    let body: ErrorBody = assert_json(response, StatusCode::TOO_MANY_REQUESTS).await.unwrap();
    assert_eq!(body.code, "RATE_LIMITED");
}

#[tokio::test]
async fn test_forwarded_for_does_not_reset_login_limit() {
    let settings = TestSettings::default().set("RATE_LIMIT_LOGIN", "2 per minute");
    let server = TestServer::start_with(settings).await.expect("Failed to start server");
    let url = format!("{}/api/v1/auth/login", server.base_url());
    let request = LoginRequest::new("ghost@sgc.cl", "nope");

    let mut statuses = Vec::new();
    for i in 0..4 {
        let response = server
            .client
            .post(&url)
            .header("x-forwarded-for", format!("203.0.113.{i}"))
            .json(&request)
            .send()
            .await
            .unwrap();
        statuses.push(response.status());
    }

    assert_eq!(
        statuses,
        [
            StatusCode::UNAUTHORIZED,
            StatusCode::UNAUTHORIZED,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
        ]
    );
}

// ============================================================================
// Admin Tests
// ============================================================================

#[tokio::test]
async fn test_admin_routes_reject_other_roles() {
    let server = TestServer::start().await.expect("Failed to start server");
    server
        .create_user("sofia", "sofia@sgc.cl", STRONG_PASSWORD, Role::Supervisor)
        .await
        .unwrap();
    let response = server
        .post("/api/v1/auth/login", &LoginRequest::new("sofia@sgc.cl", STRONG_PASSWORD))
        .await
        .unwrap();
    let tokens: TokenResponse = assert_json(response, StatusCode::OK).await.unwrap();

    let response = server.get_auth("/api/v1/users", &tokens.access_token).await.unwrap();
    let body: ErrorBody = assert_json(response, StatusCode::FORBIDDEN).await.unwrap();
    assert_eq!(body.code, "FORBIDDEN");
}

#[tokio::test]
async fn test_admin_lists_and_exports_users() {
    let server = TestServer::start().await.expect("Failed to start server");
    let admin = admin_tokens(&server).await;
    server
        .create_user("ana", "ana@sgc.cl", STRONG_PASSWORD, Role::Editor)
        .await
        .unwrap();

    let response = server
        .get_auth("/api/v1/users?q=ana", &admin.access_token)
        .await
        .unwrap();
    let page: AccountPage = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].username, "ana");
    assert_eq!(page.items[0].role, "editor");

    let response = server
        .get_auth("/api/v1/users/export.csv", &admin.access_token)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let csv = response.text().await.unwrap();
    assert!(csv.lines().count() >= 3);
    assert!(csv.contains("ana@sgc.cl"));
}
