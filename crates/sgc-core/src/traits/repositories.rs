//! Repository traits (ports) - define the interface for identity storage
//!
//! The domain layer defines what it needs; `sgc-db` provides PostgreSQL and
//! in-memory implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entities::{
    Account, AccountId, AuditEvent, AuditEventType, Invite, NewAccount, NewAuditEvent,
    RefreshTokenRecord,
};
use crate::error::DomainError;
use crate::value_objects::{AccountStatus, Role};

/// Result type for repository operations
pub type RepoResult<T> = Result<T, DomainError>;

// ============================================================================
// Pagination
// ============================================================================

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

/// One page of results
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

// ============================================================================
// Account Repository
// ============================================================================

/// Filter shared by the admin listing and CSV export
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    pub status: Option<AccountStatus>,
    /// Case-insensitive substring of username or email
    pub q: Option<String>,
}

impl AccountFilter {
    /// Lowercased search term, `None` when blank
    pub fn needle(&self) -> Option<String> {
        self.q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
    }

    pub fn matches(&self, account: &Account) -> bool {
        if self.status.is_some_and(|s| s != account.status) {
            return false;
        }
        match self.needle() {
            Some(q) => {
                account.username.to_lowercase().contains(&q)
                    || account.email.as_deref().is_some_and(|e| e.contains(&q))
            }
            None => true,
        }
    }
}

/// Paginated account query
#[derive(Debug, Clone)]
pub struct AccountQuery {
    pub filter: AccountFilter,
    pub page: i64,
    pub per_page: i64,
}

impl AccountQuery {
    /// Clamp page to >= 1 and per_page to 1..=100 (default 20)
    pub fn new(filter: AccountFilter, page: Option<i64>, per_page: Option<i64>) -> Self {
        Self {
            filter,
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Find account by ID
    async fn find_by_id(&self, id: AccountId) -> RepoResult<Option<Account>>;

    /// Find account by email (argument is normalized before lookup)
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<Account>>;

    /// Find account by username, trimmed and case-insensitive
    async fn find_by_username(&self, username: &str) -> RepoResult<Option<Account>>;

    /// Check if a username is taken (case-insensitive)
    async fn username_exists(&self, username: &str) -> RepoResult<bool>;

    /// Check if an email is taken
    async fn email_exists(&self, email: &str) -> RepoResult<bool>;

    /// Insert a new account
    async fn create(&self, account: &NewAccount) -> RepoResult<Account>;

    /// Approve and activate. Role and category are only replaced when given.
    async fn approve(
        &self,
        id: AccountId,
        role: Option<Role>,
        category: Option<&str>,
        now: DateTime<Utc>,
    ) -> RepoResult<Account>;

    /// Mark rejected and inactive
    async fn reject(&self, id: AccountId) -> RepoResult<Account>;

    /// Set or clear the forced password change flag
    async fn set_force_change(&self, id: AccountId, value: bool) -> RepoResult<Account>;

    /// Void every browser session signed in before `now`
    async fn revoke_sessions(&self, id: AccountId, now: DateTime<Utc>) -> RepoResult<()>;

    /// Atomically count a failed password check and lock on the threshold.
    /// Returns the updated account.
    async fn record_failed_login(&self, id: AccountId, now: DateTime<Utc>) -> RepoResult<Account>;

    /// Clear failure counter and lock
    async fn reset_failed_logins(&self, id: AccountId) -> RepoResult<()>;

    /// Replace the password hash and clear `force_change_password`
    async fn set_password(&self, id: AccountId, password_hash: &str) -> RepoResult<()>;

    /// Replace the hash without touching flags (transparent rehash)
    async fn upgrade_password_hash(&self, id: AccountId, password_hash: &str) -> RepoResult<()>;

    /// Store a TOTP secret unless one is already enrolled.
    /// Returns `false` when the account already had a secret.
    async fn set_totp_secret(&self, id: AccountId, secret: &str) -> RepoResult<bool>;

    /// Paginated listing, newest first
    async fn list(&self, query: &AccountQuery) -> RepoResult<Page<Account>>;

    /// Every account matching a filter, oldest first
    async fn export(&self, filter: &AccountFilter) -> RepoResult<Vec<Account>>;
}

// ============================================================================
// Refresh Token Repository
// ============================================================================

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Record an issued refresh token
    async fn create(
        &self,
        user_id: AccountId,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> RepoResult<RefreshTokenRecord>;

    /// Find a record by `jti`
    async fn find_by_jti(&self, jti: &str) -> RepoResult<Option<RefreshTokenRecord>>;

    /// Record exists, belongs to the user, not revoked and not expired
    async fn is_active(&self, jti: &str, user_id: AccountId, now: DateTime<Utc>) -> RepoResult<bool>;

    /// Mark revoked if not already. Returns rows affected (0 on repeat).
    async fn revoke(&self, jti: &str) -> RepoResult<u64>;

    /// Compare-and-set revoke of an active record owned by `user_id`.
    /// Exactly one concurrent caller observes `true`.
    async fn revoke_if_active(
        &self,
        jti: &str,
        user_id: AccountId,
        now: DateTime<Utc>,
    ) -> RepoResult<bool>;

    /// Revoke every non-revoked record of a user
    async fn revoke_all_for_user(&self, user_id: AccountId) -> RepoResult<u64>;

    /// Purge expired records past the grace window, and revoked records
    /// created before it
    async fn cleanup(&self, grace_days: i64, now: DateTime<Utc>) -> RepoResult<u64>;
}

// ============================================================================
// Invite Repository
// ============================================================================

#[async_trait]
pub trait InviteRepository: Send + Sync {
    /// Create a new invite
    async fn create(&self, invite: &Invite) -> RepoResult<()>;

    /// Find invite by token
    async fn find_by_token(&self, token: &str) -> RepoResult<Option<Invite>>;

    /// Most recent invites first
    async fn list(&self, limit: i64) -> RepoResult<Vec<Invite>>;

    /// Set `revoked_at`; errors with `InviteNotFound` for unknown tokens
    async fn revoke(&self, token: &str, now: DateTime<Utc>) -> RepoResult<()>;

    /// Consume one use if the invite is active at `now`.
    /// Returns the updated invite, or `None` when nothing was redeemed.
    async fn redeem(&self, token: &str, now: DateTime<Utc>) -> RepoResult<Option<Invite>>;

    /// Give back one use taken by [`redeem`](Self::redeem) when the signup
    /// it was taken for did not complete
    async fn release(&self, token: &str) -> RepoResult<()>;
}

// ============================================================================
// Audit Repository
// ============================================================================

/// Audit listing filter
#[derive(Debug, Clone)]
pub struct AuditQuery {
    pub user_id: Option<AccountId>,
    pub event_type: Option<AuditEventType>,
    pub limit: i64,
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            user_id: None,
            event_type: None,
            limit: 100,
        }
    }
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Append one event
    async fn append(&self, event: &NewAuditEvent) -> RepoResult<()>;

    /// Newest first
    async fn list(&self, query: &AuditQuery) -> RepoResult<Vec<AuditEvent>>;
}
