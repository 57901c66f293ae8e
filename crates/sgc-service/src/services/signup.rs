//! Self-service registration

use chrono::Utc;
use sgc_core::policy::{ensure_confirmation, validate_reset_password};
use sgc_core::{normalize_email, Account, AuditEventType, DomainError, Invite, NewAccount, NewAuditEvent, Role};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::dto::RegisterRequest;

use super::audit::ClientInfo;
use super::context::ServiceContext;
use super::error::ServiceResult;

pub struct SignupService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> SignupService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Active invite behind `token`, used to prefill the register form
    pub async fn invite_for_token(&self, token: &str) -> ServiceResult<Option<Invite>> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }
        Ok(self
            .ctx
            .invites()
            .find_by_token(token)
            .await?
            .filter(|invite| invite.is_active(Utc::now())))
    }

    /// Create a pending account
    ///
    /// In invite mode the invite is redeemed atomically after every other
    /// check has passed, and its role and category are applied. The use is
    /// given back if the account cannot be created.
    #[instrument(skip(self, request, client), fields(username = %request.username))]
    pub async fn register(&self, request: RegisterRequest, client: &ClientInfo) -> ServiceResult<Account> {
        let policy = &self.ctx.settings().signup;
        if policy.is_closed() {
            return Err(DomainError::SignupClosed.into());
        }

        request.validate()?;
        validate_reset_password(&request.password)?;
        ensure_confirmation(&request.password, &request.confirm)?;

        let email = normalize_email(&request.email).ok_or(DomainError::InvalidEmail)?;
        let username = request.username.trim();
        let now = Utc::now();

        let token = request
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty() && policy.requires_invite());
        let invite = match token {
            Some(token) => self.ctx.invites().find_by_token(token).await?,
            None => None,
        };

        if let Err(e) = policy.admit(&email, invite.as_ref(), now) {
            warn!(reason = e.code(), "Signup refused");
            return Err(e.into());
        }

        let accounts = self.ctx.accounts();
        if accounts.username_exists(username).await? {
            return Err(DomainError::UsernameExists.into());
        }
        if accounts.email_exists(&email).await? {
            return Err(DomainError::EmailExists.into());
        }

        let hash = self.ctx.passwords().hash_async(&request.password).await?;

        let redeemed = match token {
            Some(token) => Some(
                self.ctx
                    .invites()
                    .redeem(token, now)
                    .await?
                    .ok_or(DomainError::InviteInactive)?,
            ),
            None => None,
        };

        let (role, category) = redeemed
            .as_ref()
            .map_or((Role::Viewer, None), |invite| (invite.role, invite.category.clone()));
        let created = accounts
            .create(&NewAccount::pending(username, Some(&email), hash, role, category))
            .await;
        let account = match (created, token) {
            (Ok(account), _) => account,
            (Err(e), Some(token)) => {
                if let Err(release) = self.ctx.invites().release(token).await {
                    warn!(error = %release, "Failed to give back invite use");
                }
                warn!(error = %e, "Signup failed after redeeming invite");
                return Err(e.into());
            }
            (Err(e), None) => return Err(e.into()),
        };

        self.ctx
            .audit()
            .record(
                NewAuditEvent::new(AuditEventType::Signup)
                    .user(account.id)
                    .meta("mode", policy.mode.as_str())
                    .meta("invited", redeemed.is_some()),
                client,
            )
            .await;

        info!(user_id = account.id, role = %account.role, "Account registered, pending approval");
        Ok(account)
    }
}
