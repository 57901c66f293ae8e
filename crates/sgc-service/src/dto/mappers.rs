//! Entity to DTO mappers

use chrono::Utc;
use sgc_core::{Account, Invite};

use super::responses::{AccountResponse, InviteResponse, MeResponse};

// ============================================================================
// Account Mappers
// ============================================================================

impl From<&Account> for AccountResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            role: account.role,
            status: account.status,
            is_active: account.is_active,
            is_approved: account.is_approved,
            category: account.category.clone(),
            force_change_password: account.force_change_password,
            failed_logins: account.failed_logins,
            lock_until: account.lock_until,
            mfa_enrolled: account.has_totp(),
            approved_at: account.approved_at,
            created_at: account.created_at,
        }
    }
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self::from(&account)
    }
}

impl From<&Account> for MeResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            role: account.role,
        }
    }
}

// ============================================================================
// Invite Mappers
// ============================================================================

impl InviteResponse {
    /// Invite plus its registration link under `base_url`
    pub fn new(invite: &Invite, base_url: &str) -> Self {
        Self {
            url: invite.url(base_url),
            token: invite.token.clone(),
            email: invite.email.clone(),
            role: invite.role,
            category: invite.category.clone(),
            max_uses: invite.max_uses,
            used_count: invite.used_count,
            active: invite.is_active(Utc::now()),
            expires_at: invite.expires_at,
            revoked_at: invite.revoked_at,
            created_by: invite.created_by,
            created_at: invite.created_at,
        }
    }
}
