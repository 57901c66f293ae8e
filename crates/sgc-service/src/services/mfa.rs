//! TOTP second factor
//!
//! Enrollment keeps the candidate secret outside the account until the
//! first valid code confirms it. An enrolled secret is never replaced here.

use sgc_common::auth::DEFAULT_WINDOW;
use sgc_core::{Account, AccountId, AuditEventType, NewAuditEvent};
use tracing::{info, instrument, warn};

use super::audit::ClientInfo;
use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};

pub const INVALID_CODE: &str = "invalid authentication code";

pub const ALREADY_ENROLLED: &str = "second factor already enrolled";

/// Secret and otpauth URI shown on the setup page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotpEnrollment {
    pub secret: String,
    pub provisioning_uri: String,
}

pub struct MfaService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> MfaService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    async fn load(&self, user_id: AccountId) -> ServiceResult<Account> {
        self.ctx
            .accounts()
            .find_by_id(user_id)
            .await?
            .filter(Account::can_sign_in)
            .ok_or_else(|| ServiceError::invalid_token("login session expired"))
    }

    /// Account that has no second factor yet
    async fn load_unenrolled(&self, user_id: AccountId) -> ServiceResult<Account> {
        let account = self.load(user_id).await?;
        if account.has_totp() {
            warn!(user_id, "Enrollment refused: TOTP already enrolled");
            return Err(ServiceError::conflict(ALREADY_ENROLLED));
        }
        Ok(account)
    }

    /// Reuse the pending secret when the setup page is reloaded
    pub async fn enrollment(
        &self,
        user_id: AccountId,
        pending_secret: Option<&str>,
    ) -> ServiceResult<TotpEnrollment> {
        let account = self.load_unenrolled(user_id).await?;
        let secret = match pending_secret {
            Some(secret) if !secret.is_empty() => secret.to_string(),
            _ => self.ctx.totp().generate_secret()?,
        };
        let provisioning_uri = self
            .ctx
            .totp()
            .provisioning_uri(&secret, &account.totp_identifier())?;

        Ok(TotpEnrollment {
            secret,
            provisioning_uri,
        })
    }

    /// Store `secret` once `code` proves the authenticator holds it
    #[instrument(skip(self, secret, code, client))]
    pub async fn confirm_enrollment(
        &self,
        user_id: AccountId,
        secret: &str,
        code: &str,
        client: &ClientInfo,
    ) -> ServiceResult<Account> {
        let mut account = self.load_unenrolled(user_id).await?;

        if !self.ctx.totp().verify(secret, code, DEFAULT_WINDOW) {
            return Err(self.reject(user_id, "enroll", client).await);
        }

        if !self.ctx.accounts().set_totp_secret(user_id, secret).await? {
            warn!(user_id, "Enrollment lost a race with another enrollment");
            return Err(ServiceError::conflict(ALREADY_ENROLLED));
        }
        account.totp_secret = Some(secret.to_string());

        self.ctx
            .audit()
            .record(NewAuditEvent::new(AuditEventType::MfaEnrolled).user(user_id), client)
            .await;

        info!(user_id, "TOTP enrolled");
        Ok(account)
    }

    /// Check a code against the enrolled secret
    #[instrument(skip(self, code, client))]
    pub async fn verify(&self, user_id: AccountId, code: &str, client: &ClientInfo) -> ServiceResult<Account> {
        let account = self.load(user_id).await?;
        let Some(secret) = account.totp_secret.as_deref() else {
            return Err(ServiceError::validation("second factor not enrolled"));
        };

        if !self.ctx.totp().verify(secret, code, DEFAULT_WINDOW) {
            return Err(self.reject(user_id, "verify", client).await);
        }

        Ok(account)
    }

    async fn reject(&self, user_id: AccountId, stage: &str, client: &ClientInfo) -> ServiceError {
        warn!(user_id, stage, "Invalid TOTP code");
        self.ctx
            .audit()
            .record(
                NewAuditEvent::new(AuditEventType::MfaFail)
                    .user(user_id)
                    .meta("stage", stage),
                client,
            )
            .await;
        ServiceError::validation(INVALID_CODE)
    }
}
