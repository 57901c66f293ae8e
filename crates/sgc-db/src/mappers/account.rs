//! Account entity <-> model mapper

use sgc_core::{Account, AccountStatus, DomainError, NewAccount, Role};

use crate::models::AccountModel;

/// Convert AccountModel to Account entity
impl TryFrom<AccountModel> for Account {
    type Error = DomainError;

    fn try_from(model: AccountModel) -> Result<Self, Self::Error> {
        Ok(Account {
            id: model.id,
            username: model.username,
            email: model.email,
            password_hash: model.password_hash,
            role: model.role.parse::<Role>()?,
            status: model.status.parse::<AccountStatus>()?,
            is_active: model.is_active,
            is_approved: model.is_approved,
            failed_logins: model.failed_logins,
            lock_until: model.lock_until,
            totp_secret: model.totp_secret,
            force_change_password: model.force_change_password,
            category: model.category,
            approved_at: model.approved_at,
            sessions_valid_after: model.sessions_valid_after,
            created_at: model.created_at,
        })
    }
}

/// Values bound when inserting a new account
pub struct AccountInsert<'a> {
    pub username: &'a str,
    pub email: Option<&'a str>,
    pub password_hash: &'a str,
    pub role: &'static str,
    pub status: &'static str,
    pub is_active: bool,
    pub is_approved: bool,
    pub category: Option<&'a str>,
    pub force_change_password: bool,
}

impl<'a> AccountInsert<'a> {
    pub fn new(account: &'a NewAccount) -> Self {
        Self {
            username: &account.username,
            email: account.email.as_deref(),
            password_hash: &account.password_hash,
            role: account.role.as_str(),
            status: account.status.as_str(),
            is_active: account.is_active,
            is_approved: account.is_approved(),
            category: account.category.as_deref(),
            force_change_password: account.force_change_password,
        }
    }
}
