//! Invite management

use sgc_core::{
    generate_invite_token, normalize_email, AccountId, AuditEventType, DomainError, Invite,
    NewAuditEvent, Role,
};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::dto::{CreateInviteRequest, InviteResponse};

use super::audit::ClientInfo;
use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};
use super::mailer::OutgoingMail;

const SECONDS_PER_DAY: i64 = 86_400;

pub struct InviteService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> InviteService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Create an invite; email-bound invites are also mailed
    ///
    /// `actor` is `None` for principals without an account row.
    #[instrument(skip(self, request, client))]
    pub async fn create(
        &self,
        actor: Option<AccountId>,
        request: CreateInviteRequest,
        client: &ClientInfo,
    ) -> ServiceResult<InviteResponse> {
        request.validate()?;

        let role = match request.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            Some(raw) => raw.parse::<Role>()?,
            None => Role::Viewer,
        };
        let expires_in = request
            .expires_in_days
            .map_or(self.ctx.settings().invite_max_age, |days| days * SECONDS_PER_DAY);

        let mut invite = Invite::new(generate_invite_token(), role, actor)
            .with_category(request.category)
            .with_max_uses(request.max_uses.unwrap_or(1))
            .with_expiration(expires_in);
        if let Some(raw) = request.email.as_deref().filter(|e| !e.trim().is_empty()) {
            let email = normalize_email(raw).ok_or(DomainError::InvalidEmail)?;
            invite = invite.with_email(&email);
        }

        self.ctx.invites().create(&invite).await?;

        let response = InviteResponse::new(&invite, &self.ctx.settings().public_base_url);
        if let Some(email) = invite.email.as_deref() {
            if let Err(e) = self.ctx.mailer().send(OutgoingMail::invite(email, &response.url)).await {
                warn!(error = %e, "Failed to send invite email");
            }
        }

        let mut event = NewAuditEvent::new(AuditEventType::InviteCreated)
            .meta("role", role.as_str())
            .meta("email", invite.email.clone())
            .meta("max_uses", invite.max_uses);
        if let Some(actor) = actor {
            event = event.user(actor);
        }
        self.ctx.audit().record(event, client).await;

        info!(role = %role, max_uses = invite.max_uses, "Invite created");
        Ok(response)
    }

    /// Newest first
    pub async fn list(&self, limit: i64) -> ServiceResult<Vec<InviteResponse>> {
        let base_url = &self.ctx.settings().public_base_url;
        Ok(self
            .ctx
            .invites()
            .list(limit.clamp(1, 500))
            .await?
            .iter()
            .map(|invite| InviteResponse::new(invite, base_url))
            .collect())
    }

    #[instrument(skip(self, token, client))]
    pub async fn revoke(&self, token: &str, actor: Option<AccountId>, client: &ClientInfo) -> ServiceResult<()> {
        let token = token.trim();
        self.ctx
            .invites()
            .revoke(token, chrono::Utc::now())
            .await
            .map_err(|e| match e {
                DomainError::InviteNotFound => ServiceError::not_found("Invite", token),
                other => other.into(),
            })?;

        let mut event = NewAuditEvent::new(AuditEventType::InviteRevoked);
        if let Some(actor) = actor {
            event = event.user(actor);
        }
        self.ctx.audit().record(event, client).await;

        info!("Invite revoked");
        Ok(())
    }
}
