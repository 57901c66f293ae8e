//! Account entity - a user able to sign in to SGC

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::value_objects::{normalize_email, AccountStatus, Role};

/// Numeric account identifier (the `sub` claim carries it stringified)
pub type AccountId = i64;

/// Consecutive failures that trigger a temporary lock
pub const MAX_FAILED_LOGINS: i32 = 5;

/// How long a triggered lock lasts
pub const LOCKOUT_MINUTES: i64 = 15;

/// Account entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub status: AccountStatus,
    pub is_active: bool,
    pub is_approved: bool,
    pub failed_logins: i32,
    pub lock_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub totp_secret: Option<String>,
    pub force_change_password: bool,
    pub category: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    /// Browser sessions signed in before this instant are void
    #[serde(skip_serializing)]
    pub sessions_valid_after: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Lock is in force at `now`
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.is_some_and(|until| until > now)
    }

    /// Approved and active
    pub fn can_sign_in(&self) -> bool {
        self.status == AccountStatus::Approved && self.is_active
    }

    pub fn is_pending(&self) -> bool {
        self.status == AccountStatus::Pending
    }

    pub fn has_totp(&self) -> bool {
        self.totp_secret.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// Second factor needed: privileged role, or the user enrolled voluntarily
    pub fn requires_mfa(&self) -> bool {
        self.role.requires_mfa() || self.has_totp()
    }

    /// A browser session signed in at `issued_at_ms` (epoch millis) is still good
    pub fn accepts_session(&self, issued_at_ms: i64) -> bool {
        self.can_sign_in()
            && self
                .sessions_valid_after
                .map_or(true, |after| issued_at_ms >= after.timestamp_millis())
    }

    /// Role set of the account (a single role today)
    pub fn roles(&self) -> [Role; 1] {
        [self.role]
    }

    /// Label shown in authenticator apps: email, else username, else id
    pub fn totp_identifier(&self) -> String {
        if let Some(email) = self.email.as_deref().filter(|e| !e.is_empty()) {
            return email.to_string();
        }
        if !self.username.trim().is_empty() {
            return self.username.clone();
        }
        self.id.to_string()
    }

    /// Record a failed password check.
    ///
    /// Returns `true` when this failure put the account into lockout.
    pub fn register_failure(&mut self, now: DateTime<Utc>) -> bool {
        self.failed_logins = self.failed_logins.saturating_add(1);
        if self.failed_logins >= MAX_FAILED_LOGINS {
            self.lock_until = Some(now + Duration::minutes(LOCKOUT_MINUTES));
            true
        } else {
            false
        }
    }

    /// Password and second factor both passed
    pub fn register_success(&mut self) {
        self.failed_logins = 0;
        self.lock_until = None;
    }

    /// Admin approval. Role and category are only replaced when provided.
    pub fn approve(&mut self, role: Option<Role>, category: Option<String>, now: DateTime<Utc>) {
        self.status = AccountStatus::Approved;
        self.is_active = true;
        self.is_approved = true;
        self.approved_at = Some(now);
        if let Some(role) = role {
            self.role = role;
        }
        if category.is_some() {
            self.category = category;
        }
    }

    pub fn reject(&mut self) {
        self.status = AccountStatus::Rejected;
        self.is_active = false;
        self.is_approved = false;
    }

    /// Any password write clears the forced-change flag
    pub fn set_password(&mut self, password_hash: String) {
        self.password_hash = password_hash;
        self.force_change_password = false;
    }

    pub fn set_email(&mut self, raw: &str) {
        self.email = normalize_email(raw);
    }
}

/// Data needed to insert an account; the store assigns `id` and `created_at`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub status: AccountStatus,
    pub is_active: bool,
    pub category: Option<String>,
    pub force_change_password: bool,
}

impl NewAccount {
    /// Self-signup: pending and inactive until an admin approves
    pub fn pending(
        username: &str,
        email: Option<&str>,
        password_hash: String,
        role: Role,
        category: Option<String>,
    ) -> Self {
        Self {
            username: username.trim().to_string(),
            email: email.and_then(normalize_email),
            password_hash,
            role,
            status: AccountStatus::Pending,
            is_active: false,
            category,
            force_change_password: false,
        }
    }

    /// Seeded or admin-created account, usable immediately
    pub fn approved(username: &str, email: Option<&str>, password_hash: String, role: Role) -> Self {
        Self {
            username: username.trim().to_string(),
            email: email.and_then(normalize_email),
            password_hash,
            role,
            status: AccountStatus::Approved,
            is_active: true,
            category: None,
            force_change_password: false,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status == AccountStatus::Approved
    }

    /// Materialize with store-assigned identity
    pub fn into_account(self, id: AccountId, now: DateTime<Utc>) -> Account {
        let approved = self.is_approved();
        Account {
            id,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            role: self.role,
            status: self.status,
            is_active: self.is_active,
            is_approved: approved,
            failed_logins: 0,
            lock_until: None,
            totp_secret: None,
            force_change_password: self.force_change_password,
            category: self.category,
            approved_at: approved.then_some(now),
            sessions_valid_after: None,
            created_at: now,
        }
    }
}
