//! Browser flow integration tests
//!
//! Form posts against the HTML auth pages. Redirects are asserted rather
//! than followed and the signed session cookie lives in the client jar.
//!
//! Run with: cargo test -p integration-tests --test browser_tests

use integration_tests::{
    assert_json, assert_page, assert_redirect, assert_status, current_totp, invite_token,
    link_path, scrape_totp_secret, wrong_totp, AccountPage, AccountResponse, CreateInviteRequest,
    ErrorBody, InviteResponse, LoginRequest, TestServer, TestSettings, TokenResponse, ADMIN_EMAIL,
    ADMIN_PASSWORD, STRONG_PASSWORD,
};
use reqwest::StatusCode;
use sgc_core::Role;

async fn admin_bearer(server: &TestServer) -> String {
    server.seed_admin(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
    let response = server
        .post("/api/v1/auth/login", &LoginRequest::new(ADMIN_EMAIL, ADMIN_PASSWORD))
        .await
        .unwrap();
    let tokens: TokenResponse = assert_json(response, StatusCode::OK).await.unwrap();
    tokens.access_token
}

// ============================================================================
// Login Tests
// ============================================================================

#[tokio::test]
async fn test_login_lands_on_role_page() {
    let server = TestServer::start().await.expect("Failed to start server");
    server
        .create_user("eva", "eva@sgc.cl", STRONG_PASSWORD, Role::Editor)
        .await
        .unwrap();

    let response = server
        .post_form("/auth/login", &[("identifier", "  EVA@sgc.cl "), ("password", STRONG_PASSWORD)])
        .await
        .unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/partes");

    let response = server.get("/auth/change-password").await.unwrap();
    assert_page(response).await.unwrap();
}

#[tokio::test]
async fn test_login_failure_flashes_and_returns() {
    let server = TestServer::start().await.expect("Failed to start server");

    let response = server
        .post_form(
            "/auth/login",
            &[("identifier", "ghost"), ("password", "nope"), ("next", "/dashboard")],
        )
        .await
        .unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/auth/login?next=%2Fdashboard");

    let page = assert_page(server.get("/auth/login").await.unwrap()).await.unwrap();
    assert!(page.contains("flash-error"));
    assert!(page.contains("invalid credentials"));
}

#[tokio::test]
async fn test_logout_ends_the_session() {
    let server = TestServer::start().await.expect("Failed to start server");
    server
        .create_user("eva", "eva@sgc.cl", STRONG_PASSWORD, Role::Viewer)
        .await
        .unwrap();
    let response = server
        .post_form("/auth/login", &[("identifier", "eva"), ("password", STRONG_PASSWORD)])
        .await
        .unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/");

    let response = server.get("/auth/logout").await.unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/auth/login");

    let response = server.get("/auth/change-password").await.unwrap();
    assert_eq!(
        assert_redirect(&response).unwrap(),
        "/auth/login?next=%2Fauth%2Fchange-password"
    );
}

// ============================================================================
// Password Reset Tests
// ============================================================================

#[tokio::test]
async fn test_password_reset_happy_path() {
    let server = TestServer::start().await.expect("Failed to start server");
    server
        .create_user("user", "user@x.com", "OldPassword99", Role::Viewer)
        .await
        .unwrap();

    let response = server
        .post_form("/auth/forgot-password", &[("email", "user@x.com")])
        .await
        .unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/auth/login");

    let link = server
        .mailer()
        .last_link_to("user@x.com")
        .expect("reset mail sent");
    let path = link_path(&link).to_string();
    assert!(path.starts_with("/auth/reset-password/"));

    assert_page(server.get(&path).await.unwrap()).await.unwrap();

    let response = server
        .post_form(&path, &[("new", STRONG_PASSWORD), ("confirm", STRONG_PASSWORD)])
        .await
        .unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/auth/login");

    let response = server
        .post("/api/v1/auth/login", &LoginRequest::new("user@x.com", STRONG_PASSWORD))
        .await
        .unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();

    let response = server
        .post("/api/v1/auth/login", &LoginRequest::new("user@x.com", "OldPassword99"))
        .await
        .unwrap();
    assert_status(response, StatusCode::UNAUTHORIZED).await.unwrap();
}

#[tokio::test]
async fn test_reset_link_works_only_once() {
    let server = TestServer::start().await.expect("Failed to start server");
    server
        .create_user("user", "user@x.com", "OldPassword99", Role::Viewer)
        .await
        .unwrap();
    server
        .post_form("/auth/forgot-password", &[("email", "user@x.com")])
        .await
        .unwrap();
    let link = server.mailer().last_link_to("user@x.com").expect("reset mail sent");
    let path = link_path(&link).to_string();

    let response = server
        .post_form(&path, &[("new", STRONG_PASSWORD), ("confirm", STRONG_PASSWORD)])
        .await
        .unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/auth/login");

    // Same link again, still inside its lifetime
    let response = server.get(&path).await.unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/auth/forgot-password");
    let response = server
        .post_form(&path, &[("new", "Replayed12345"), ("confirm", "Replayed12345")])
        .await
        .unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/auth/forgot-password");

    let response = server
        .post("/api/v1/auth/login", &LoginRequest::new("user@x.com", "Replayed12345"))
        .await
        .unwrap();
    assert_status(response, StatusCode::UNAUTHORIZED).await.unwrap();
    let response = server
        .post("/api/v1/auth/login", &LoginRequest::new("user@x.com", STRONG_PASSWORD))
        .await
        .unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();
}

#[tokio::test]
async fn test_password_reset_ends_browser_sessions() {
    let server = TestServer::start().await.expect("Failed to start server");
    server
        .create_user("eva", "eva@sgc.cl", "OldPassword99", Role::Viewer)
        .await
        .unwrap();
    let response = server
        .post_form("/auth/login", &[("identifier", "eva"), ("password", "OldPassword99")])
        .await
        .unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/");
    assert_page(server.get("/auth/change-password").await.unwrap()).await.unwrap();

    // The reset happens from another device
    server
        .post_form("/auth/forgot-password", &[("email", "eva@sgc.cl")])
        .await
        .unwrap();
    let link = server.mailer().last_link_to("eva@sgc.cl").expect("reset mail sent");
    let response = reqwest::Client::new()
        .post(format!("{}{}", server.base_url(), link_path(&link)))
        .form(&[("new", STRONG_PASSWORD), ("confirm", STRONG_PASSWORD)])
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let response = server.get("/auth/change-password").await.unwrap();
    assert_eq!(
        assert_redirect(&response).unwrap(),
        "/auth/login?next=%2Fauth%2Fchange-password"
    );
}

#[tokio::test]
async fn test_forgot_password_is_neutral_for_unknown_email() {
    let server = TestServer::start().await.expect("Failed to start server");

    let response = server
        .post_form("/auth/forgot-password", &[("email", "nobody@x.com")])
        .await
        .unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/auth/login");
    assert!(server.mailer().sent().is_empty());

    let page = assert_page(server.get("/auth/login").await.unwrap()).await.unwrap();
    assert!(page.contains("If the account exists"));
}

#[tokio::test]
async fn test_tampered_reset_link_is_rejected() {
    let server = TestServer::start().await.expect("Failed to start server");

    let response = server.get("/auth/reset-password/not-a-token").await.unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/auth/forgot-password");
}

// ============================================================================
// Invite Signup Tests
// ============================================================================

#[tokio::test]
async fn test_invite_signup_needs_approval() {
    let server = TestServer::start().await.expect("Failed to start server");
    let admin = admin_bearer(&server).await;

    let request = CreateInviteRequest {
        email: Some("new@x.com".to_string()),
        max_uses: Some(1),
        ..Default::default()
    };
    let response = server.post_auth("/api/v1/invites", &admin, &request).await.unwrap();
    let invite: InviteResponse = assert_json(response, StatusCode::CREATED).await.unwrap();
    assert_eq!(invite.max_uses, 1);
    assert_eq!(invite_token(&invite.url), Some(invite.token.as_str()));

    let register = format!("/auth/register?token={}", invite.token);
    let page = assert_page(server.get(&register).await.unwrap()).await.unwrap();
    assert!(page.contains("new@x.com"));

    let response = server
        .post_form(
            &register,
            &[
                ("username", "newbie"),
                ("email", "new@x.com"),
                ("password", STRONG_PASSWORD),
                ("confirm", STRONG_PASSWORD),
            ],
        )
        .await
        .unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/auth/login");

    let response = server
        .get_auth("/api/v1/users?status=pending", &admin)
        .await
        .unwrap();
    let pending: AccountPage = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(pending.total, 1);
    let account = &pending.items[0];
    assert_eq!(account.username, "newbie");
    assert_eq!(account.status, "pending");
    assert!(!account.is_active);
    assert!(!account.is_approved);

    let response = server
        .post("/api/v1/auth/login", &LoginRequest::new("new@x.com", STRONG_PASSWORD))
        .await
        .unwrap();
    let body: ErrorBody = assert_json(response, StatusCode::FORBIDDEN).await.unwrap();
    assert!(body.detail.contains("pending approval"));

    let response = server
        .post_form("/auth/login", &[("identifier", "newbie"), ("password", STRONG_PASSWORD)])
        .await
        .unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/auth/login");
    let page = assert_page(server.get("/auth/login").await.unwrap()).await.unwrap();
    assert!(page.contains("pending approval"));

    let response = server
        .patch_auth(
            &format!("/api/v1/users/{}/approve", account.id),
            &admin,
            &serde_json::json!({}),
        )
        .await
        .unwrap();
    let approved: AccountResponse = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(approved.status, "approved");
    assert!(approved.is_active);

    let response = server
        .post("/api/v1/auth/login", &LoginRequest::new("new@x.com", STRONG_PASSWORD))
        .await
        .unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();
}

#[tokio::test]
async fn test_used_invite_cannot_be_reused() {
    let server = TestServer::start().await.expect("Failed to start server");
    let admin = admin_bearer(&server).await;

    let request = CreateInviteRequest {
        max_uses: Some(1),
        ..Default::default()
    };
    let response = server.post_auth("/api/v1/invites", &admin, &request).await.unwrap();
    let invite: InviteResponse = assert_json(response, StatusCode::CREATED).await.unwrap();
    let register = format!("/auth/register?token={}", invite.token);

    for (username, email, expected) in [
        ("first", "first@x.com", "/auth/login".to_string()),
        ("second", "second@x.com", register.clone()),
    ] {
        let response = server
            .post_form(
                &register,
                &[
                    ("username", username),
                    ("email", email),
                    ("password", STRONG_PASSWORD),
                    ("confirm", STRONG_PASSWORD),
                ],
            )
            .await
            .unwrap();
        assert_eq!(assert_redirect(&response).unwrap(), expected);
    }
}

#[tokio::test]
async fn test_closed_signup_redirects_to_login() {
    let settings = TestSettings::default().set("SIGNUP_MODE", "closed");
    let server = TestServer::start_with(settings).await.expect("Failed to start server");

    let response = server.get("/auth/register").await.unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/auth/login");
}

// ============================================================================
// MFA Tests
// ============================================================================

#[tokio::test]
async fn test_admin_enrolls_then_verifies_totp() {
    let server = TestServer::start_with(TestSettings::default().with_mfa())
        .await
        .expect("Failed to start server");
    server.seed_admin(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
    let credentials = [("identifier", ADMIN_EMAIL), ("password", ADMIN_PASSWORD)];

    let response = server.post_form("/auth/login", &credentials).await.unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/auth/totp/setup");

    // Password alone does not sign the browser in
    let response = server.get("/auth/change-password").await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let page = assert_page(server.get("/auth/totp/setup").await.unwrap()).await.unwrap();
    let secret = scrape_totp_secret(&page).expect("secret on setup page");

    let response = server
        .post_form("/auth/totp/setup", &[("code", &wrong_totp(&secret))])
        .await
        .unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/auth/totp/setup");
    let page = assert_page(server.get("/auth/totp/setup").await.unwrap()).await.unwrap();
    assert!(page.contains("flash-error"));
    assert_eq!(scrape_totp_secret(&page).as_deref(), Some(secret.as_str()));

    let response = server
        .post_form("/auth/totp/setup", &[("code", &current_totp(&secret))])
        .await
        .unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/admin");
    assert_page(server.get("/auth/change-password").await.unwrap()).await.unwrap();

    // Enrolled: the next login asks for a code instead
    let response = server.get("/auth/logout").await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    let response = server.post_form("/auth/login", &credentials).await.unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/auth/totp/verify");

    let response = server
        .post_form("/auth/totp/verify", &[("code", &wrong_totp(&secret))])
        .await
        .unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/auth/totp/verify");

    let response = server
        .post_form("/auth/totp/verify", &[("code", &current_totp(&secret))])
        .await
        .unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/admin");
}

#[tokio::test]
async fn test_enrolled_admin_cannot_replace_totp_secret() {
    let server = TestServer::start_with(TestSettings::default().with_mfa())
        .await
        .expect("Failed to start server");
    let admin = server.seed_admin(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
    let accounts = server.state().service_context().accounts();
    let original = "JBSWY3DPEHPK3PXP";
    assert!(accounts.set_totp_secret(admin.id, original).await.unwrap());

    let credentials = [("identifier", ADMIN_EMAIL), ("password", ADMIN_PASSWORD)];
    let response = server.post_form("/auth/login", &credentials).await.unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/auth/totp/verify");

    // A verify-stage challenge never opens the setup page
    let response = server.get("/auth/totp/setup").await.unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/auth/totp/verify");

    let chosen = "KRSXG5CTMVRXEZLU";
    let response = server
        .post_form("/auth/totp/setup", &[("code", &current_totp(chosen))])
        .await
        .unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/auth/totp/verify");

    let stored = accounts.find_by_id(admin.id).await.unwrap().unwrap();
    assert_eq!(stored.totp_secret.as_deref(), Some(original));

    // Still not signed in
    let response = server.get("/auth/change-password").await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let response = server
        .post_form("/auth/totp/verify", &[("code", &current_totp(original))])
        .await
        .unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/admin");
}

#[tokio::test]
async fn test_setup_challenge_does_not_open_verify() {
    let server = TestServer::start_with(TestSettings::default().with_mfa())
        .await
        .expect("Failed to start server");
    server.seed_admin(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();

    let credentials = [("identifier", ADMIN_EMAIL), ("password", ADMIN_PASSWORD)];
    let response = server.post_form("/auth/login", &credentials).await.unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/auth/totp/setup");

    let response = server.get("/auth/totp/verify").await.unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/auth/totp/setup");
}

// ============================================================================
// Session Revocation Tests
// ============================================================================

#[tokio::test]
async fn test_admin_revoke_sessions_ends_browser_session() {
    let server = TestServer::start().await.expect("Failed to start server");
    let token = admin_bearer(&server).await;
    let eva = server
        .create_user("eva", "eva@sgc.cl", STRONG_PASSWORD, Role::Viewer)
        .await
        .unwrap();
    let credentials = [("identifier", "eva"), ("password", STRONG_PASSWORD)];

    let response = server.post_form("/auth/login", &credentials).await.unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/");
    assert_page(server.get("/auth/change-password").await.unwrap()).await.unwrap();

    let response = server
        .post_auth(
            &format!("/api/v1/users/{}/revoke-sessions", eva.id),
            &token,
            &serde_json::json!({}),
        )
        .await
        .unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();

    let response = server.get("/auth/change-password").await.unwrap();
    assert_eq!(
        assert_redirect(&response).unwrap(),
        "/auth/login?next=%2Fauth%2Fchange-password"
    );

    // A fresh sign-in is unaffected
    let response = server.post_form("/auth/login", &credentials).await.unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/");
    assert_page(server.get("/auth/change-password").await.unwrap()).await.unwrap();
}

#[tokio::test]
async fn test_roles_without_mfa_skip_the_prompt() {
    let server = TestServer::start_with(TestSettings::default().with_mfa())
        .await
        .expect("Failed to start server");
    server
        .create_user("vera", "vera@sgc.cl", STRONG_PASSWORD, Role::Viewer)
        .await
        .unwrap();

    let response = server
        .post_form("/auth/login", &[("identifier", "vera"), ("password", STRONG_PASSWORD)])
        .await
        .unwrap();
    assert_eq!(assert_redirect(&response).unwrap(), "/");
}
