//! Refresh token record - server-side registry entry for an issued refresh JWT

use chrono::{DateTime, Utc};

use super::account::AccountId;

/// One issued refresh token, keyed by its `jti`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub user_id: AccountId,
    pub jti: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl RefreshTokenRecord {
    #[inline]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Not revoked and not expired
    #[inline]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired(now)
    }

    /// Eligible for purge by the maintenance job
    pub fn is_purgeable(&self, cutoff: DateTime<Utc>) -> bool {
        self.expires_at <= cutoff || (self.revoked && self.created_at <= cutoff)
    }
}
