//! Administrator operations on accounts and the audit log

use chrono::Utc;
use sgc_core::{
    Account, AccountFilter, AccountId, AccountQuery, AccountStatus, AuditEvent, AuditEventType,
    AuditQuery, NewAuditEvent, Page, Role,
};
use tracing::{info, instrument};
use validator::Validate;

use crate::dto::{
    AccountResponse, ApproveAccountRequest, AuditListQuery, ListAccountsQuery, ResetLinkResponse,
};

use super::audit::ClientInfo;
use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};
use super::recovery::RecoveryService;

/// Column order of the CSV export
pub const EXPORT_HEADER: [&str; 10] = [
    "id",
    "username",
    "email",
    "role",
    "status",
    "is_active",
    "is_approved",
    "category",
    "created_at",
    "approved_at",
];

const MAX_AUDIT_LIMIT: i64 = 1000;

fn filter_from(query: &ListAccountsQuery) -> ServiceResult<AccountFilter> {
    let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(raw.parse::<AccountStatus>()?),
        None => None,
    };
    Ok(AccountFilter {
        status,
        q: query.q.clone(),
    })
}

pub struct AdminService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> AdminService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    async fn target(&self, id: AccountId) -> ServiceResult<Account> {
        self.ctx
            .accounts()
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Account", id))
    }

    /// Admin actions are stored against the target, with the actor in meta
    async fn record(
        &self,
        event_type: AuditEventType,
        target: AccountId,
        actor: Option<AccountId>,
        client: &ClientInfo,
    ) {
        let event = NewAuditEvent::new(event_type)
            .user(target)
            .meta("actor", actor);
        self.ctx.audit().record(event, client).await;
    }

    // ========================================================================
    // Listing
    // ========================================================================

    pub async fn list_accounts(&self, query: ListAccountsQuery) -> ServiceResult<Page<AccountResponse>> {
        let filter = filter_from(&query)?;
        let page = self
            .ctx
            .accounts()
            .list(&AccountQuery::new(filter, query.page, query.per_page))
            .await?;
        Ok(page.map(AccountResponse::from))
    }

    /// Every account matching the filter, as CSV with a header row
    #[instrument(skip(self, query))]
    pub async fn export_csv(&self, query: ListAccountsQuery) -> ServiceResult<String> {
        let accounts = self.ctx.accounts().export(&filter_from(&query)?).await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(EXPORT_HEADER)
            .map_err(|e| ServiceError::internal(format!("csv export failed: {e}")))?;
        for account in &accounts {
            writer
                .write_record([
                    account.id.to_string(),
                    account.username.clone(),
                    account.email.clone().unwrap_or_default(),
                    account.role.to_string(),
                    account.status.to_string(),
                    account.is_active.to_string(),
                    account.is_approved.to_string(),
                    account.category.clone().unwrap_or_default(),
                    account.created_at.to_rfc3339(),
                    account.approved_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
                ])
                .map_err(|e| ServiceError::internal(format!("csv export failed: {e}")))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| ServiceError::internal(format!("csv export failed: {e}")))?;
        info!(rows = accounts.len(), "Accounts exported");
        String::from_utf8(bytes).map_err(|e| ServiceError::internal(format!("csv export failed: {e}")))
    }

    // ========================================================================
    // Approval
    // ========================================================================

    #[instrument(skip(self, request, client))]
    pub async fn approve(
        &self,
        id: AccountId,
        request: ApproveAccountRequest,
        actor: Option<AccountId>,
        client: &ClientInfo,
    ) -> ServiceResult<AccountResponse> {
        request.validate()?;
        let role = match request.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            Some(raw) => Some(raw.parse::<Role>()?),
            None => None,
        };
        let category = request
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        let account = self
            .ctx
            .accounts()
            .approve(id, role, category.as_deref(), Utc::now())
            .await?;

        self.record(AuditEventType::ApproveUser, id, actor, client).await;
        info!(user_id = id, role = %account.role, "Account approved");
        Ok(account.into())
    }

    #[instrument(skip(self, client))]
    pub async fn reject(
        &self,
        id: AccountId,
        actor: Option<AccountId>,
        client: &ClientInfo,
    ) -> ServiceResult<AccountResponse> {
        let account = self.ctx.accounts().reject(id).await?;
        self.ctx.refresh_tokens().revoke_all_for_user(id).await?;

        self.record(AuditEventType::RejectUser, id, actor, client).await;
        info!(user_id = id, "Account rejected");
        Ok(account.into())
    }

    // ========================================================================
    // Credentials
    // ========================================================================

    #[instrument(skip(self, client))]
    pub async fn set_force_change(
        &self,
        id: AccountId,
        value: bool,
        actor: Option<AccountId>,
        client: &ClientInfo,
    ) -> ServiceResult<AccountResponse> {
        let account = self.ctx.accounts().set_force_change(id, value).await?;

        let event = NewAuditEvent::new(AuditEventType::ForceChangeSet)
            .user(id)
            .meta("actor", actor)
            .meta("value", value);
        self.ctx.audit().record(event, client).await;
        Ok(account.into())
    }

    /// Reset link handed to the admin instead of mailed
    #[instrument(skip(self, client))]
    pub async fn reset_link(
        &self,
        id: AccountId,
        actor: Option<AccountId>,
        client: &ClientInfo,
    ) -> ServiceResult<ResetLinkResponse> {
        let account = self.target(id).await?;
        let reset_url = RecoveryService::new(self.ctx).reset_url(&account)?;

        self.record(AuditEventType::ResetLinkGenerated, id, actor, client).await;
        Ok(ResetLinkResponse { reset_url })
    }

    #[instrument(skip(self, client))]
    pub async fn revoke_sessions(
        &self,
        id: AccountId,
        actor: Option<AccountId>,
        client: &ClientInfo,
    ) -> ServiceResult<u64> {
        self.ctx.accounts().revoke_sessions(id, Utc::now()).await?;
        let revoked = self.ctx.refresh_tokens().revoke_all_for_user(id).await?;

        let event = NewAuditEvent::new(AuditEventType::SessionsRevoked)
            .user(id)
            .meta("actor", actor)
            .meta("revoked", revoked);
        self.ctx.audit().record(event, client).await;
        info!(user_id = id, revoked, "Sessions revoked by admin");
        Ok(revoked)
    }

    // ========================================================================
    // Audit
    // ========================================================================

    pub async fn audit_events(&self, query: AuditListQuery) -> ServiceResult<Vec<AuditEvent>> {
        let event_type = match query.event_type.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(raw) => Some(raw.parse::<AuditEventType>()?),
            None => None,
        };
        let default_limit = AuditQuery::default().limit;
        self.ctx
            .audit()
            .recent(&AuditQuery {
                user_id: query.user_id,
                event_type,
                limit: query.limit.unwrap_or(default_limit).clamp(1, MAX_AUDIT_LIMIT),
            })
            .await
    }
}
