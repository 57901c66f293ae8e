//! In-memory implementation of RefreshTokenRepository

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use sgc_core::traits::{RefreshTokenRepository, RepoResult};
use sgc_core::{AccountId, DomainError, RefreshTokenRecord};

#[derive(Default)]
struct RefreshTable {
    last_id: i64,
    by_jti: HashMap<String, RefreshTokenRecord>,
}

/// Refresh token registry held in process memory
#[derive(Default)]
pub struct MemoryRefreshTokenRepository {
    table: Mutex<RefreshTable>,
}

impl MemoryRefreshTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenRepository for MemoryRefreshTokenRepository {
    async fn create(
        &self,
        user_id: AccountId,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> RepoResult<RefreshTokenRecord> {
        let mut table = self.table.lock();
        if table.by_jti.contains_key(jti) {
            return Err(DomainError::JtiExists);
        }

        table.last_id += 1;
        let record = RefreshTokenRecord {
            id: table.last_id,
            user_id,
            jti: jti.to_string(),
            created_at: Utc::now(),
            expires_at,
            revoked: false,
        };
        table.by_jti.insert(record.jti.clone(), record.clone());
        Ok(record)
    }

    async fn find_by_jti(&self, jti: &str) -> RepoResult<Option<RefreshTokenRecord>> {
        Ok(self.table.lock().by_jti.get(jti).cloned())
    }

    async fn is_active(&self, jti: &str, user_id: AccountId, now: DateTime<Utc>) -> RepoResult<bool> {
        Ok(self
            .table
            .lock()
            .by_jti
            .get(jti)
            .is_some_and(|r| r.user_id == user_id && r.is_active(now)))
    }

    async fn revoke(&self, jti: &str) -> RepoResult<u64> {
        let mut table = self.table.lock();
        match table.by_jti.get_mut(jti) {
            Some(record) if !record.revoked => {
                record.revoked = true;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn revoke_if_active(
        &self,
        jti: &str,
        user_id: AccountId,
        now: DateTime<Utc>,
    ) -> RepoResult<bool> {
        let mut table = self.table.lock();
        match table.by_jti.get_mut(jti) {
            Some(record) if record.user_id == user_id && record.is_active(now) => {
                record.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_user(&self, user_id: AccountId) -> RepoResult<u64> {
        let mut table = self.table.lock();
        let mut revoked = 0;
        for record in table
            .by_jti
            .values_mut()
            .filter(|r| r.user_id == user_id && !r.revoked)
        {
            record.revoked = true;
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn cleanup(&self, grace_days: i64, now: DateTime<Utc>) -> RepoResult<u64> {
        let cutoff = now - Duration::days(grace_days.max(0));
        let mut table = self.table.lock();
        let before = table.by_jti.len();
        table.by_jti.retain(|_, r| !r.is_purgeable(cutoff));
        Ok((before - table.by_jti.len()) as u64)
    }
}
