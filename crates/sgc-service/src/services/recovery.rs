//! Password recovery
//!
//! Reset links carry a signed, time-limited token whose payload is the
//! account email and a fingerprint of the password hash at issue time.
//! Once the password changes the fingerprint no longer matches, so a link
//! works once. Requesting a link never reveals whether the email exists.

use sgc_common::auth::{password_fingerprint, purpose};
use chrono::Utc;
use sgc_core::policy::{ensure_confirmation, validate_reset_password};
use sgc_core::{normalize_email, Account, AuditEventType, NewAuditEvent};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::dto::{ForgotPasswordRequest, ResetPasswordRequest};

use super::audit::ClientInfo;
use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};
use super::mailer::OutgoingMail;

pub const RESET_PATH: &str = "/auth/reset-password";

pub const INVALID_RESET_LINK: &str = "invalid or expired reset link";

/// What a valid reset token names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetClaim {
    pub email: String,
    /// `None` for the development token, which is not bound to a password
    pub fingerprint: Option<String>,
}

pub struct RecoveryService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> RecoveryService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Mail a reset link when the email belongs to an active account
    ///
    /// Unknown emails and delivery failures both end in `Ok(())`.
    #[instrument(skip(self, request, client))]
    pub async fn forgot_password(&self, request: ForgotPasswordRequest, client: &ClientInfo) -> ServiceResult<()> {
        request.validate()?;

        let Some(email) = normalize_email(&request.email) else {
            return Ok(());
        };
        let Some(account) = self
            .ctx
            .accounts()
            .find_by_email(&email)
            .await?
            .filter(Account::can_sign_in)
        else {
            info!("Reset requested for unknown or inactive email");
            return Ok(());
        };

        let url = self.reset_url(&account)?;
        let mail = OutgoingMail::password_reset(&email, &url, self.ctx.settings().reset_max_age);
        if let Err(e) = self.ctx.mailer().send(mail).await {
            warn!(user_id = account.id, error = %e, "Failed to send reset email");
        }

        self.ctx
            .audit()
            .record(NewAuditEvent::new(AuditEventType::ResetIssued).user(account.id), client)
            .await;

        info!(user_id = account.id, "Reset link issued");
        Ok(())
    }

    /// Absolute reset link for `account`
    pub fn reset_url(&self, account: &Account) -> ServiceResult<String> {
        let email = account
            .email
            .as_deref()
            .ok_or_else(|| ServiceError::validation("account has no email"))?;
        let payload = format!("{email}|{}", password_fingerprint(&account.password_hash));
        let token = self.ctx.signed_tokens().issue(&payload, purpose::PASSWORD_RESET)?;
        Ok(self
            .ctx
            .settings()
            .absolute_url(&format!("{RESET_PATH}/{token}")))
    }

    /// Claim a reset token carries; the dev token is honored first
    pub fn resolve_reset_token(&self, token: &str) -> Option<ResetClaim> {
        let settings = self.ctx.settings();
        if let Some(dev) = settings.dev_reset.as_ref() {
            if !token.is_empty() && token == dev.token {
                return Some(ResetClaim {
                    email: dev.email.clone(),
                    fingerprint: None,
                });
            }
        }
        let payload = self
            .ctx
            .signed_tokens()
            .parse(token, purpose::PASSWORD_RESET, settings.reset_max_age)?;
        let (email, fingerprint) = payload.rsplit_once('|')?;
        Some(ResetClaim {
            email: email.to_string(),
            fingerprint: Some(fingerprint.to_string()),
        })
    }

    /// Account a reset token may still act on
    ///
    /// `None` for a bad or expired token, an unknown email, or a link whose
    /// password has changed since it was issued.
    pub async fn reset_account(&self, token: &str) -> ServiceResult<Option<Account>> {
        let Some(claim) = self.resolve_reset_token(token) else {
            return Ok(None);
        };
        let Some(account) = self.ctx.accounts().find_by_email(&claim.email).await? else {
            return Ok(None);
        };
        let current = claim
            .fingerprint
            .as_deref()
            .map_or(true, |fp| fp == password_fingerprint(&account.password_hash));
        if !current {
            info!(user_id = account.id, "Reset link already used or superseded");
            return Ok(None);
        }
        Ok(Some(account))
    }

    /// Set a new password from a reset link
    ///
    /// Clears the lockout, revokes every refresh token of the account and
    /// ends its browser sessions.
    #[instrument(skip(self, token, request, client))]
    pub async fn reset_password(
        &self,
        token: &str,
        request: ResetPasswordRequest,
        client: &ClientInfo,
    ) -> ServiceResult<Account> {
        let account = self
            .reset_account(token)
            .await?
            .ok_or_else(|| ServiceError::invalid_token(INVALID_RESET_LINK))?;

        request.validate()?;
        validate_reset_password(&request.new)?;
        ensure_confirmation(&request.new, &request.confirm)?;

        let hash = self.ctx.passwords().hash_async(&request.new).await?;
        self.ctx.accounts().set_password(account.id, &hash).await?;
        self.ctx.accounts().reset_failed_logins(account.id).await?;
        self.ctx.accounts().revoke_sessions(account.id, Utc::now()).await?;
        let revoked = self.ctx.refresh_tokens().revoke_all_for_user(account.id).await?;

        self.ctx
            .audit()
            .record(
                NewAuditEvent::new(AuditEventType::ResetCompleted)
                    .user(account.id)
                    .meta("revoked", revoked),
                client,
            )
            .await;

        info!(user_id = account.id, revoked, "Password reset completed");

        self.ctx
            .accounts()
            .find_by_id(account.id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Account", account.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::LoginRequest;
    use crate::services::auth::AuthService;
    use crate::services::context::testing::{account, context, context_with, PASSWORD};
    use sgc_core::{AuditQuery, Role};

    fn forgot(email: &str) -> ForgotPasswordRequest {
        ForgotPasswordRequest { email: email.into() }
    }

    fn reset(new: &str) -> ResetPasswordRequest {
        ResetPasswordRequest {
            new: new.into(),
            confirm: new.into(),
        }
    }

    fn token_of(link: &str) -> &str {
        link.rsplit('/').next().unwrap()
    }

    #[tokio::test]
    async fn test_forgot_password_is_neutral() {
        let (ctx, mailer) = context();
        account(&ctx, "ana", Role::Viewer).await;
        let recovery = RecoveryService::new(&ctx);

        recovery.forgot_password(forgot("ghost@sgc.cl"), &ClientInfo::default()).await.unwrap();
        assert!(mailer.sent().is_empty());

        recovery.forgot_password(forgot(" ANA@sgc.cl "), &ClientInfo::default()).await.unwrap();
        let link = mailer.last_link_to("ana@sgc.cl").unwrap();
        assert!(link.starts_with("http://sgc.test/auth/reset-password/"));
        assert!(mailer.last_to("ana@sgc.cl").unwrap().body.contains("expires in 30 minutes"));
    }

    #[tokio::test]
    async fn test_reset_flow_revokes_sessions_and_unlocks() {
        let (ctx, mailer) = context();
        let ana = account(&ctx, "ana", Role::Viewer).await;
        let auth = AuthService::new(&ctx);
        let login = |password: &str| LoginRequest {
            email: "ana@sgc.cl".into(),
            password: password.into(),
        };

        let pair = auth.api_login(login(PASSWORD), &ClientInfo::default()).await.unwrap();
        for _ in 0..5 {
            auth.api_login(login("wrong"), &ClientInfo::default()).await.unwrap_err();
        }
        assert!(ctx.accounts().find_by_id(ana.id).await.unwrap().unwrap().is_locked(Utc::now()));

        let recovery = RecoveryService::new(&ctx);
        recovery.forgot_password(forgot("ana@sgc.cl"), &ClientInfo::default()).await.unwrap();
        let link = mailer.last_link_to("ana@sgc.cl").unwrap();

        let updated = recovery
            .reset_password(token_of(&link), reset("Newpassword99"), &ClientInfo::default())
            .await
            .unwrap();
        assert_eq!(updated.failed_logins, 0);
        assert!(!updated.is_locked(Utc::now()));

        assert!(auth.refresh(&pair.refresh_token, &ClientInfo::default()).await.is_err());
        assert!(auth.api_login(login("Newpassword99"), &ClientInfo::default()).await.is_ok());
        let signed_in_before = updated.sessions_valid_after.unwrap().timestamp_millis() - 1;
        assert!(auth.session_account(ana.id, signed_in_before).await.unwrap().is_none());

        let completed = ctx
            .audit()
            .recent(&AuditQuery {
                event_type: Some(AuditEventType::ResetCompleted),
                ..AuditQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
    }

    #[tokio::test]
    async fn test_reset_rejects_weak_and_bad_tokens() {
        let (ctx, _) = context();
        let ana = account(&ctx, "ana", Role::Viewer).await;
        let recovery = RecoveryService::new(&ctx);
        let url = recovery.reset_url(&ana).unwrap();

        let err = recovery
            .reset_password(token_of(&url), reset("short1A"), &ClientInfo::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = recovery
            .reset_password("garbage.token", reset("Newpassword99"), &ClientInfo::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.to_string(), INVALID_RESET_LINK);
    }

    #[tokio::test]
    async fn test_reset_link_works_once() {
        let (ctx, _) = context();
        let ana = account(&ctx, "ana", Role::Viewer).await;
        let recovery = RecoveryService::new(&ctx);
        let url = recovery.reset_url(&ana).unwrap();
        let token = token_of(&url);
        assert!(recovery.reset_account(token).await.unwrap().is_some());

        recovery
            .reset_password(token, reset("Newpassword99"), &ClientInfo::default())
            .await
            .unwrap();
        assert!(recovery.reset_account(token).await.unwrap().is_none());

        let err = recovery
            .reset_password(token, reset("Otherpassword77"), &ClientInfo::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), INVALID_RESET_LINK);
        let auth = AuthService::new(&ctx);
        let login = LoginRequest {
            email: "ana@sgc.cl".into(),
            password: "Newpassword99".into(),
        };
        assert!(auth.api_login(login, &ClientInfo::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_password_change_voids_outstanding_link() {
        let (ctx, _) = context();
        let ana = account(&ctx, "ana", Role::Viewer).await;
        let recovery = RecoveryService::new(&ctx);
        let url = recovery.reset_url(&ana).unwrap();

        let hash = ctx.passwords().hash("Changedpass55").unwrap();
        ctx.accounts().set_password(ana.id, &hash).await.unwrap();
        assert!(recovery.reset_account(token_of(&url)).await.unwrap().is_none());

        // A bare email payload from an older link format is refused
        let bare = ctx
            .signed_tokens()
            .issue("ana@sgc.cl", purpose::PASSWORD_RESET)
            .unwrap();
        assert_eq!(recovery.resolve_reset_token(&bare), None);
    }

    #[tokio::test]
    async fn test_dev_reset_token() {
        let (ctx, _) = context_with(&[
            ("DEV_RESET_TOKEN", "dev-token"),
            ("DEV_ADMIN_EMAIL", "Admin@sgc.cl"),
        ]);
        account(&ctx, "admin", Role::Admin).await;
        let recovery = RecoveryService::new(&ctx);

        let claim = recovery.resolve_reset_token("dev-token").unwrap();
        assert_eq!(claim.email, "admin@sgc.cl");
        assert_eq!(claim.fingerprint, None);
        assert_eq!(recovery.resolve_reset_token(""), None);

        recovery
            .reset_password("dev-token", reset("Newpassword99"), &ClientInfo::default())
            .await
            .unwrap();
    }
}
