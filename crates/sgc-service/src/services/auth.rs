//! Authentication service
//!
//! Credential checks with lockout, browser and API login, refresh token
//! rotation, logout and password change.
//!
//! Every credential failure surfaces as the same `invalid credentials`
//! error. The specific reason only reaches the audit log and tracing.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sgc_common::auth::{needs_rehash, TokenPair, TokenSubject};
use sgc_core::policy::{ensure_confirmation, validate_change_password};
use sgc_core::{normalize_email, Account, AccountId, AuditEventType, NewAuditEvent};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::dto::{BrowserLoginRequest, ChangePasswordRequest, LoginRequest};

use super::audit::ClientInfo;
use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};

/// Detail returned when a refresh token cannot be rotated
pub const REFRESH_REJECTED: &str = "refresh revoked or expired";

/// Where accounts flagged for a password change land after login
pub const CHANGE_PASSWORD_PATH: &str = "/auth/change-password";

/// Which second-factor step a challenge was opened for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MfaStage {
    /// No secret yet: enroll one
    Setup,
    /// Secret enrolled: prove possession
    Verify,
}

/// Password accepted, second factor outstanding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MfaChallenge {
    pub user_id: AccountId,
    pub stage: MfaStage,
    pub next: Option<String>,
    pub remember: bool,
    pub force_change: bool,
}

/// A finished login: the browser session may be issued
#[derive(Debug, Clone)]
pub struct CompletedLogin {
    pub account: Account,
    pub redirect_to: String,
    pub remember: bool,
}

/// Result of the password step of a browser login
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Complete(CompletedLogin),
    /// MFA required but no secret enrolled yet
    MfaSetup(MfaChallenge),
    MfaVerify(MfaChallenge),
}

/// Local redirect target, or `None` for anything that could leave the site
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.map(str::trim).filter(|n| {
        n.starts_with('/') && !n.starts_with("//") && !n.contains('\\') && !n.contains("://")
    })
}

/// Authentication service
pub struct AuthService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> AuthService<'a> {
    /// Create a new AuthService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Email first, then username; both ignore case and outer whitespace
    async fn find_by_identifier(&self, identifier: &str) -> ServiceResult<Option<Account>> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Ok(None);
        }
        if let Some(email) = normalize_email(identifier) {
            if let Some(account) = self.ctx.accounts().find_by_email(&email).await? {
                return Ok(Some(account));
            }
        }
        Ok(self.ctx.accounts().find_by_username(identifier).await?)
    }

    /// Password step shared by every login path
    ///
    /// Lockout is checked before the password so a locked account never
    /// increments its counter. Pending approval is only disclosed after a
    /// correct password.
    #[instrument(skip(self, password, client))]
    pub async fn authenticate(
        &self,
        identifier: &str,
        password: &str,
        client: &ClientInfo,
    ) -> ServiceResult<Account> {
        let audit = self.ctx.audit();
        let now = Utc::now();

        let Some(account) = self.find_by_identifier(identifier).await? else {
            warn!(reason = "unknown_account", "Login failed");
            audit
                .record(
                    NewAuditEvent::new(AuditEventType::LoginFail)
                        .meta("reason", "unknown_account")
                        .meta("identifier", identifier.trim()),
                    client,
                )
                .await;
            return Err(ServiceError::invalid_credentials());
        };

        if account.is_locked(now) {
            warn!(user_id = account.id, reason = "locked", "Login failed");
            audit
                .record(
                    NewAuditEvent::new(AuditEventType::LoginLockout)
                        .user(account.id)
                        .meta("lock_until", account.lock_until.map(|t| t.to_rfc3339())),
                    client,
                )
                .await;
            return Err(ServiceError::invalid_credentials());
        }

        if !self
            .ctx
            .passwords()
            .verify_async(&account.password_hash, password)
            .await
        {
            let updated = self.ctx.accounts().record_failed_login(account.id, now).await?;
            if updated.is_locked(now) {
                warn!(user_id = account.id, failed_logins = updated.failed_logins, "Account locked");
            } else {
                warn!(user_id = account.id, reason = "bad_password", "Login failed");
            }
            audit
                .record(
                    NewAuditEvent::new(AuditEventType::LoginFail)
                        .user(account.id)
                        .meta("reason", "bad_password")
                        .meta("failed_logins", updated.failed_logins),
                    client,
                )
                .await;
            return Err(ServiceError::invalid_credentials());
        }

        if account.is_pending() {
            info!(user_id = account.id, "Login refused: pending approval");
            audit
                .record(
                    NewAuditEvent::new(AuditEventType::LoginFail)
                        .user(account.id)
                        .meta("reason", "pending"),
                    client,
                )
                .await;
            return Err(sgc_common::AppError::NotApproved.into());
        }

        if !account.can_sign_in() {
            warn!(user_id = account.id, status = %account.status, "Login failed: inactive");
            audit
                .record(
                    NewAuditEvent::new(AuditEventType::LoginFail)
                        .user(account.id)
                        .meta("reason", account.status.as_str()),
                    client,
                )
                .await;
            return Err(ServiceError::invalid_credentials());
        }

        if needs_rehash(&account.password_hash) {
            self.upgrade_hash(account.id, password).await;
        }

        Ok(account)
    }

    /// Re-hash a legacy password with the current scheme; failures only warn
    async fn upgrade_hash(&self, user_id: AccountId, password: &str) {
        let result = match self.ctx.passwords().hash_async(password).await {
            Ok(hash) => self
                .ctx
                .accounts()
                .upgrade_password_hash(user_id, &hash)
                .await
                .map_err(ServiceError::from),
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(()) => info!(user_id, "Password hash upgraded"),
            Err(e) => warn!(user_id, error = %e, "Password hash upgrade failed"),
        }
    }

    /// Password step of the browser form
    #[instrument(skip(self, request, client), fields(remember = request.remember))]
    pub async fn begin_browser_login(
        &self,
        request: BrowserLoginRequest,
        client: &ClientInfo,
    ) -> ServiceResult<LoginOutcome> {
        let account = self
            .authenticate(&request.identifier, &request.password, client)
            .await?;

        if self.ctx.settings().enable_2fa && account.requires_mfa() {
            let stage = if account.has_totp() {
                MfaStage::Verify
            } else {
                MfaStage::Setup
            };
            let challenge = MfaChallenge {
                user_id: account.id,
                stage,
                next: safe_next(request.next.as_deref()).map(str::to_string),
                remember: request.remember,
                force_change: account.force_change_password,
            };
            info!(user_id = account.id, stage = ?stage, "Second factor required");
            return Ok(match stage {
                MfaStage::Setup => LoginOutcome::MfaSetup(challenge),
                MfaStage::Verify => LoginOutcome::MfaVerify(challenge),
            });
        }

        let completed = self
            .complete_login(&account, request.next.as_deref(), request.remember, "password", client)
            .await?;
        Ok(LoginOutcome::Complete(completed))
    }

    /// Final step of every browser login: clear failures, audit, pick a landing page
    #[instrument(skip(self, account, next, client), fields(user_id = account.id))]
    pub async fn complete_login(
        &self,
        account: &Account,
        next: Option<&str>,
        remember: bool,
        method: &str,
        client: &ClientInfo,
    ) -> ServiceResult<CompletedLogin> {
        self.ctx.accounts().reset_failed_logins(account.id).await?;
        self.ctx
            .audit()
            .record(
                NewAuditEvent::new(AuditEventType::LoginSuccess)
                    .user(account.id)
                    .meta("method", method),
                client,
            )
            .await;

        let redirect_to = if account.force_change_password {
            CHANGE_PASSWORD_PATH.to_string()
        } else {
            safe_next(next)
                .unwrap_or_else(|| account.role.default_landing())
                .to_string()
        };

        info!(redirect_to = %redirect_to, "User logged in successfully");

        Ok(CompletedLogin {
            account: account.clone(),
            redirect_to,
            remember,
        })
    }

    /// JSON login: lockout applies, MFA does not
    #[instrument(skip(self, request, client), fields(email = %request.email))]
    pub async fn api_login(&self, request: LoginRequest, client: &ClientInfo) -> ServiceResult<TokenPair> {
        request.validate()?;

        let account = self
            .authenticate(&request.email, &request.password, client)
            .await?;
        self.ctx.accounts().reset_failed_logins(account.id).await?;

        let pair = self.issue_tokens(&account).await?;
        self.ctx
            .audit()
            .record(
                NewAuditEvent::new(AuditEventType::LoginSuccess)
                    .user(account.id)
                    .meta("method", "api"),
                client,
            )
            .await;

        info!(user_id = account.id, "API login succeeded");
        Ok(pair)
    }

    /// Mint a pair and record the refresh `jti`
    pub async fn issue_tokens(&self, account: &Account) -> ServiceResult<TokenPair> {
        let issued = self
            .ctx
            .jwt_service()
            .generate_token_pair(&TokenSubject::from(account))?;

        self.ctx
            .refresh_tokens()
            .create(account.id, &issued.jti, issued.refresh_expires_at)
            .await?;

        Ok(issued.pair)
    }

    /// Single-use rotation
    ///
    /// The old `jti` is revoked with a compare-and-set; of two concurrent
    /// callers presenting the same token only one gets a new pair.
    #[instrument(skip(self, refresh_token, client))]
    pub async fn refresh(&self, refresh_token: &str, client: &ClientInfo) -> ServiceResult<TokenPair> {
        let jwt = self.ctx.jwt_service();
        let audit = self.ctx.audit();

        let Some(claims) = jwt.verify_refresh(refresh_token) else {
            let expired = jwt
                .decode_ignoring_expiry(refresh_token)
                .filter(|claims| claims.is_refresh_token());
            if let Some(claims) = expired {
                let mut event = NewAuditEvent::new(AuditEventType::RefreshRevokedOrExpired)
                    .meta("reason", "expired");
                if let Some(user_id) = claims.user_id() {
                    event = event.user(user_id);
                }
                audit.record(event, client).await;
                return Err(ServiceError::invalid_token(REFRESH_REJECTED));
            }
            return Err(ServiceError::invalid_token("invalid refresh token"));
        };

        let (Some(user_id), Some(jti)) = (claims.user_id(), claims.jti.as_deref()) else {
            return Err(ServiceError::invalid_token("invalid refresh token"));
        };

        if !self
            .ctx
            .refresh_tokens()
            .revoke_if_active(jti, user_id, Utc::now())
            .await?
        {
            warn!(user_id, "Refresh token replayed or revoked");
            audit
                .record(
                    NewAuditEvent::new(AuditEventType::RefreshRevokedOrExpired)
                        .user(user_id)
                        .meta("jti", jti),
                    client,
                )
                .await;
            return Err(ServiceError::invalid_token(REFRESH_REJECTED));
        }

        let account = self
            .ctx
            .accounts()
            .find_by_id(user_id)
            .await?
            .filter(Account::can_sign_in)
            .ok_or_else(|| ServiceError::invalid_token(REFRESH_REJECTED))?;

        let pair = self.issue_tokens(&account).await?;
        audit
            .record(
                NewAuditEvent::new(AuditEventType::RefreshOk)
                    .user(user_id)
                    .meta("rotated", jti),
                client,
            )
            .await;

        Ok(pair)
    }

    /// Revoke the submitted refresh token; repeating it is harmless
    #[instrument(skip(self, refresh_token, client))]
    pub async fn logout(&self, refresh_token: Option<&str>, client: &ClientInfo) -> ServiceResult<()> {
        let token = refresh_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ServiceError::validation("refresh_token is required"))?;

        let claims = self
            .ctx
            .jwt_service()
            .decode_ignoring_expiry(token)
            .ok_or_else(|| ServiceError::invalid_token("invalid token"))?;
        let jti = claims
            .jti
            .as_deref()
            .filter(|_| claims.is_refresh_token())
            .ok_or_else(|| ServiceError::invalid_token("refresh token required"))?;

        let revoked = self.ctx.refresh_tokens().revoke(jti).await?;

        let mut event = NewAuditEvent::new(AuditEventType::Logout)
            .meta("method", "api")
            .meta("revoked", revoked);
        if let Some(user_id) = claims.user_id() {
            event = event.user(user_id);
        }
        self.ctx.audit().record(event, client).await;

        Ok(())
    }

    /// Revoke every refresh token and browser session of `user_id`
    #[instrument(skip(self, client))]
    pub async fn logout_all(&self, user_id: AccountId, client: &ClientInfo) -> ServiceResult<u64> {
        self.ctx.accounts().revoke_sessions(user_id, Utc::now()).await?;
        let revoked = self.ctx.refresh_tokens().revoke_all_for_user(user_id).await?;
        self.ctx
            .audit()
            .record(
                NewAuditEvent::new(AuditEventType::LogoutAllOk)
                    .user(user_id)
                    .meta("revoked", revoked),
                client,
            )
            .await;

        info!(user_id, revoked, "All sessions revoked");
        Ok(revoked)
    }

    /// Browser session ended
    pub async fn browser_logout(&self, user_id: Option<AccountId>, client: &ClientInfo) {
        let mut event = NewAuditEvent::new(AuditEventType::Logout).meta("method", "session");
        if let Some(user_id) = user_id {
            event = event.user(user_id);
        }
        self.ctx.audit().record(event, client).await;
    }

    /// Account behind a browser session signed in at `issued_at` (epoch
    /// millis), if it may still sign in and the session was not revoked
    pub async fn session_account(
        &self,
        user_id: AccountId,
        issued_at: i64,
    ) -> ServiceResult<Option<Account>> {
        Ok(self
            .ctx
            .accounts()
            .find_by_id(user_id)
            .await?
            .filter(|account| account.accepts_session(issued_at)))
    }

    /// Authenticated password change. Every browser session signed in
    /// before the change ends; the caller re-signs its own.
    #[instrument(skip(self, request, client))]
    pub async fn change_password(
        &self,
        user_id: AccountId,
        request: ChangePasswordRequest,
        client: &ClientInfo,
    ) -> ServiceResult<()> {
        request.validate()?;

        let account = self
            .ctx
            .accounts()
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Account", user_id))?;

        if !self
            .ctx
            .passwords()
            .verify_async(&account.password_hash, &request.current)
            .await
        {
            warn!(user_id, "Password change refused: wrong current password");
            return Err(ServiceError::validation("current password is incorrect"));
        }

        validate_change_password(&request.new)?;
        ensure_confirmation(&request.new, &request.confirm)?;

        let hash = self.ctx.passwords().hash_async(&request.new).await?;
        self.ctx.accounts().set_password(user_id, &hash).await?;
        self.ctx.accounts().revoke_sessions(user_id, Utc::now()).await?;

        self.ctx
            .audit()
            .record(NewAuditEvent::new(AuditEventType::PasswordChange).user(user_id), client)
            .await;

        info!(user_id, "Password changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::context::testing::{account, context, context_with, PASSWORD};
    use sgc_core::{AccountStatus, AuditQuery, NewAccount, Role, MAX_FAILED_LOGINS};

    fn client() -> ClientInfo {
        ClientInfo::new(Some("127.0.0.1".into()), Some("tests".into()))
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    fn browser(identifier: &str, next: Option<&str>) -> BrowserLoginRequest {
        BrowserLoginRequest {
            identifier: identifier.into(),
            password: PASSWORD.into(),
            remember: false,
            next: next.map(str::to_string),
        }
    }

    async fn count(ctx: &ServiceContext, event_type: AuditEventType) -> usize {
        ctx.audit()
            .recent(&AuditQuery {
                event_type: Some(event_type),
                ..AuditQuery::default()
            })
            .await
            .unwrap()
            .len()
    }

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/partes?x=1")), Some("/partes?x=1"));
        assert_eq!(safe_next(Some("//evil.com")), None);
        assert_eq!(safe_next(Some("https://evil.com")), None);
        assert_eq!(safe_next(Some("/\\evil.com")), None);
        assert_eq!(safe_next(None), None);
    }

    #[tokio::test]
    async fn test_api_login_issues_registered_pair() {
        let (ctx, _) = context();
        let admin = account(&ctx, "admin", Role::Admin).await;
        let auth = AuthService::new(&ctx);

        let pair = auth
            .api_login(login(" ADMIN@sgc.cl ", PASSWORD), &client())
            .await
            .unwrap();
        assert_eq!(pair.token_type, "bearer");

        let claims = ctx.jwt_service().verify_refresh(&pair.refresh_token).unwrap();
        let jti = claims.jti.unwrap();
        assert!(ctx
            .refresh_tokens()
            .is_active(&jti, admin.id, Utc::now())
            .await
            .unwrap());
        assert_eq!(count(&ctx, AuditEventType::LoginSuccess).await, 1);
    }

    #[tokio::test]
    async fn test_failures_are_indistinguishable() {
        let (ctx, _) = context();
        account(&ctx, "ana", Role::Viewer).await;
        let auth = AuthService::new(&ctx);

        let unknown = auth.api_login(login("ghost@sgc.cl", PASSWORD), &client()).await.unwrap_err();
        let wrong = auth.api_login(login("ana@sgc.cl", "nope"), &client()).await.unwrap_err();

        assert!(unknown.is_invalid_credentials() && wrong.is_invalid_credentials());
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert_eq!(unknown.status_code(), wrong.status_code());
        assert_eq!(count(&ctx, AuditEventType::LoginFail).await, 2);
    }

    #[tokio::test]
    async fn test_lockout_after_five_failures() {
        let (ctx, _) = context();
        let ana = account(&ctx, "ana", Role::Viewer).await;
        let auth = AuthService::new(&ctx);

        for _ in 0..MAX_FAILED_LOGINS {
            let err = auth.api_login(login("ana@sgc.cl", "wrong-password"), &client()).await.unwrap_err();
            assert!(err.is_invalid_credentials());
        }

        let err = auth.api_login(login("ana@sgc.cl", PASSWORD), &client()).await.unwrap_err();
        assert!(err.is_invalid_credentials());

        let stored = ctx.accounts().find_by_id(ana.id).await.unwrap().unwrap();
        assert_eq!(stored.failed_logins, MAX_FAILED_LOGINS);
        assert!(stored.is_locked(Utc::now()));
        assert_eq!(count(&ctx, AuditEventType::LoginLockout).await, 1);
    }

    #[tokio::test]
    async fn test_success_resets_counter() {
        let (ctx, _) = context();
        let ana = account(&ctx, "ana", Role::Viewer).await;
        let auth = AuthService::new(&ctx);

        auth.api_login(login("ana", "wrong"), &client()).await.unwrap_err();
        auth.api_login(login("Ana", PASSWORD), &client()).await.unwrap();

        let stored = ctx.accounts().find_by_id(ana.id).await.unwrap().unwrap();
        assert_eq!(stored.failed_logins, 0);
    }

    #[tokio::test]
    async fn test_pending_disclosed_only_with_correct_password() {
        let (ctx, _) = context();
        let hash = ctx.passwords().hash(PASSWORD).unwrap();
        ctx.accounts()
            .create(&NewAccount::pending("nuevo", Some("new@x.com"), hash, Role::Viewer, None))
            .await
            .unwrap();
        let auth = AuthService::new(&ctx);

        let err = auth.api_login(login("new@x.com", "wrong"), &client()).await.unwrap_err();
        assert!(err.is_invalid_credentials());

        let err = auth.api_login(login("new@x.com", PASSWORD), &client()).await.unwrap_err();
        assert!(err.is_not_approved());
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn test_rejected_account_is_generic_failure() {
        let (ctx, _) = context();
        let ana = account(&ctx, "ana", Role::Viewer).await;
        ctx.accounts().reject(ana.id).await.unwrap();

        let err = AuthService::new(&ctx)
            .api_login(login("ana@sgc.cl", PASSWORD), &client())
            .await
            .unwrap_err();
        assert!(err.is_invalid_credentials());
        assert_eq!(ana.status, AccountStatus::Rejected);
    }

    #[tokio::test]
    async fn test_browser_login_mfa_gate() {
        let (ctx, _) = context();
        let admin = account(&ctx, "admin", Role::Admin).await;
        account(&ctx, "viewer", Role::Viewer).await;
        let auth = AuthService::new(&ctx);

        match auth.begin_browser_login(browser("admin", Some("/reportes")), &client()).await.unwrap() {
            LoginOutcome::MfaSetup(challenge) => {
                assert_eq!(challenge.user_id, admin.id);
                assert_eq!(challenge.stage, MfaStage::Setup);
                assert_eq!(challenge.next.as_deref(), Some("/reportes"));
            }
            other => panic!("expected setup, got {other:?}"),
        }

        let secret = ctx.totp().generate_secret().unwrap();
        ctx.accounts().set_totp_secret(admin.id, &secret).await.unwrap();
        assert!(matches!(
            auth.begin_browser_login(browser("admin@sgc.cl", None), &client()).await.unwrap(),
            LoginOutcome::MfaVerify(MfaChallenge { stage: MfaStage::Verify, .. })
        ));

        match auth.begin_browser_login(browser("viewer", Some("//evil.com")), &client()).await.unwrap() {
            LoginOutcome::Complete(done) => assert_eq!(done.redirect_to, "/"),
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(count(&ctx, AuditEventType::LoginSuccess).await, 1);
    }

    #[tokio::test]
    async fn test_browser_login_without_2fa() {
        let (ctx, _) = context_with(&[("ENABLE_2FA", "false")]);
        account(&ctx, "admin", Role::Admin).await;

        match AuthService::new(&ctx)
            .begin_browser_login(browser("admin", None), &client())
            .await
            .unwrap()
        {
            LoginOutcome::Complete(done) => assert_eq!(done.redirect_to, "/admin"),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_force_change_redirect() {
        let (ctx, _) = context();
        let editor = account(&ctx, "editor", Role::Editor).await;
        ctx.accounts().set_force_change(editor.id, true).await.unwrap();

        match AuthService::new(&ctx)
            .begin_browser_login(browser("editor", Some("/partes/7")), &client())
            .await
            .unwrap()
        {
            LoginOutcome::Complete(done) => assert_eq!(done.redirect_to, CHANGE_PASSWORD_PATH),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_refresh_is_single_use() {
        let (ctx, _) = context();
        account(&ctx, "ana", Role::Viewer).await;
        let auth = AuthService::new(&ctx);

        let first = auth.api_login(login("ana@sgc.cl", PASSWORD), &client()).await.unwrap();
        let second = auth.refresh(&first.refresh_token, &client()).await.unwrap();

        let err = auth.refresh(&first.refresh_token, &client()).await.unwrap_err();
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.to_string(), REFRESH_REJECTED);

        assert!(auth.refresh(&second.refresh_token, &client()).await.is_ok());
        assert_eq!(count(&ctx, AuditEventType::RefreshRevokedOrExpired).await, 1);
        assert_eq!(count(&ctx, AuditEventType::RefreshOk).await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refresh_has_one_winner() {
        let (ctx, _) = context();
        account(&ctx, "ana", Role::Viewer).await;
        let pair = AuthService::new(&ctx)
            .api_login(login("ana@sgc.cl", PASSWORD), &client())
            .await
            .unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let ctx = ctx.clone();
                let token = pair.refresh_token.clone();
                tokio::spawn(async move { AuthService::new(&ctx).refresh(&token, &ClientInfo::default()).await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(e) => assert_eq!(e.status_code(), 401),
            }
        }
        assert_eq!(winners, 1);

        let jti = ctx.jwt_service().verify_refresh(&pair.refresh_token).unwrap().jti.unwrap();
        assert!(ctx.refresh_tokens().find_by_jti(&jti).await.unwrap().unwrap().revoked);
    }

    #[tokio::test]
    async fn test_access_token_cannot_refresh() {
        let (ctx, _) = context();
        account(&ctx, "ana", Role::Viewer).await;
        let auth = AuthService::new(&ctx);
        let pair = auth.api_login(login("ana@sgc.cl", PASSWORD), &client()).await.unwrap();

        let err = auth.refresh(&pair.access_token, &client()).await.unwrap_err();
        assert_eq!(err.to_string(), "invalid refresh token");
    }

    #[tokio::test]
    async fn test_logout_contract() {
        let (ctx, _) = context();
        account(&ctx, "ana", Role::Viewer).await;
        let auth = AuthService::new(&ctx);
        let pair = auth.api_login(login("ana@sgc.cl", PASSWORD), &client()).await.unwrap();

        assert_eq!(auth.logout(None, &client()).await.unwrap_err().status_code(), 400);
        assert_eq!(
            auth.logout(Some(&pair.access_token), &client()).await.unwrap_err().status_code(),
            401
        );

        auth.logout(Some(&pair.refresh_token), &client()).await.unwrap();
        auth.logout(Some(&pair.refresh_token), &client()).await.unwrap();

        let err = auth.refresh(&pair.refresh_token, &client()).await.unwrap_err();
        assert_eq!(err.to_string(), REFRESH_REJECTED);
    }

    #[tokio::test]
    async fn test_logout_all_revokes_every_session() {
        let (ctx, _) = context();
        let ana = account(&ctx, "ana", Role::Viewer).await;
        let auth = AuthService::new(&ctx);

        let a = auth.api_login(login("ana@sgc.cl", PASSWORD), &client()).await.unwrap();
        let b = auth.api_login(login("ana@sgc.cl", PASSWORD), &client()).await.unwrap();

        assert_eq!(auth.logout_all(ana.id, &client()).await.unwrap(), 2);
        assert!(auth.refresh(&a.refresh_token, &client()).await.is_err());
        assert!(auth.refresh(&b.refresh_token, &client()).await.is_err());
        assert_eq!(count(&ctx, AuditEventType::LogoutAllOk).await, 1);
    }

    #[tokio::test]
    async fn test_change_password() {
        let (ctx, _) = context();
        let ana = account(&ctx, "ana", Role::Viewer).await;
        ctx.accounts().set_force_change(ana.id, true).await.unwrap();
        let auth = AuthService::new(&ctx);
        let signed_in_before = Utc::now().timestamp_millis() - 1;

        let request = |current: &str, new: &str, confirm: &str| ChangePasswordRequest {
            current: current.into(),
            new: new.into(),
            confirm: confirm.into(),
        };

        let err = auth.change_password(ana.id, request("wrong", "newpass99", "newpass99"), &client()).await.unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = auth.change_password(ana.id, request(PASSWORD, "short", "short"), &client()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(sgc_core::DomainError::WeakPassword(_))));

        let err = auth.change_password(ana.id, request(PASSWORD, "newpass99", "newpass98"), &client()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(sgc_core::DomainError::PasswordMismatch)));

        auth.change_password(ana.id, request(PASSWORD, "newpass99", "newpass99"), &client()).await.unwrap();

        let stored = ctx.accounts().find_by_id(ana.id).await.unwrap().unwrap();
        assert!(!stored.force_change_password);
        assert!(auth.session_account(ana.id, signed_in_before).await.unwrap().is_none());
        let resigned = Utc::now().timestamp_millis();
        assert!(auth.session_account(ana.id, resigned).await.unwrap().is_some());
        assert!(auth.api_login(login("ana@sgc.cl", "newpass99"), &client()).await.is_ok());
        assert_eq!(count(&ctx, AuditEventType::PasswordChange).await, 1);
    }
}
