//! Invite entity - an admin-issued token permitting account creation

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::account::AccountId;
use crate::value_objects::{normalize_email, Role};

/// Invite entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invite {
    pub token: String,
    pub email: Option<String>,
    pub role: Role,
    pub category: Option<String>,
    pub max_uses: i32,
    pub used_count: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_by: Option<AccountId>,
    pub created_at: DateTime<Utc>,
}

impl Invite {
    /// Create a single-use, non-expiring invite
    pub fn new(token: String, role: Role, created_by: Option<AccountId>) -> Self {
        Self {
            token,
            email: None,
            role,
            category: None,
            max_uses: 1,
            used_count: 0,
            expires_at: None,
            revoked_at: None,
            created_by,
            created_at: Utc::now(),
        }
    }

    /// Bind the invite to one recipient
    pub fn with_email(mut self, email: &str) -> Self {
        self.email = normalize_email(email);
        self
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category.filter(|c| !c.trim().is_empty());
        self
    }

    /// Values below one are clamped to one
    pub fn with_max_uses(mut self, max_uses: i32) -> Self {
        self.max_uses = max_uses.max(1);
        self
    }

    /// Expire `seconds` after creation; zero or negative means no expiry
    pub fn with_expiration(mut self, seconds: i64) -> Self {
        if seconds > 0 {
            self.expires_at = Some(self.created_at + Duration::seconds(seconds));
        }
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }

    pub fn is_exhausted(&self) -> bool {
        self.used_count >= self.max_uses
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Not revoked, not expired and uses left
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired(now) && !self.is_exhausted()
    }

    /// Case-insensitive recipient check; unbound invites accept anyone
    pub fn accepts_email(&self, email: &str) -> bool {
        match &self.email {
            Some(bound) => normalize_email(email).as_deref() == Some(bound.as_str()),
            None => true,
        }
    }

    pub fn remaining_uses(&self) -> i32 {
        (self.max_uses - self.used_count).max(0)
    }

    /// Registration URL for this invite
    pub fn url(&self, base_url: &str) -> String {
        format!(
            "{}/auth/register?token={}",
            base_url.trim_end_matches('/'),
            self.token
        )
    }
}

/// Generate a random URL-safe invite token (32 chars, ~190 bits)
pub fn generate_invite_token() -> String {
    use rand::Rng;

    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
    const TOKEN_LEN: usize = 32;

    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}
