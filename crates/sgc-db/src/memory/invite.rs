//! In-memory implementation of InviteRepository

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sgc_core::traits::{InviteRepository, RepoResult};
use sgc_core::{DomainError, Invite};

/// Invite table held in process memory
#[derive(Default)]
pub struct MemoryInviteRepository {
    by_token: Mutex<HashMap<String, Invite>>,
}

impl MemoryInviteRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InviteRepository for MemoryInviteRepository {
    async fn create(&self, invite: &Invite) -> RepoResult<()> {
        let mut invites = self.by_token.lock();
        if invites.contains_key(&invite.token) {
            return Err(DomainError::InviteTokenExists);
        }
        invites.insert(invite.token.clone(), invite.clone());
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> RepoResult<Option<Invite>> {
        Ok(self.by_token.lock().get(token).cloned())
    }

    async fn list(&self, limit: i64) -> RepoResult<Vec<Invite>> {
        let invites = self.by_token.lock();
        let mut all: Vec<Invite> = invites.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit.max(1) as usize);
        Ok(all)
    }

    async fn revoke(&self, token: &str, now: DateTime<Utc>) -> RepoResult<()> {
        let mut invites = self.by_token.lock();
        let invite = invites.get_mut(token).ok_or(DomainError::InviteNotFound)?;
        invite.revoked_at.get_or_insert(now);
        Ok(())
    }

    async fn redeem(&self, token: &str, now: DateTime<Utc>) -> RepoResult<Option<Invite>> {
        let mut invites = self.by_token.lock();
        match invites.get_mut(token) {
            Some(invite) if invite.is_active(now) => {
                invite.used_count += 1;
                Ok(Some(invite.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn release(&self, token: &str) -> RepoResult<()> {
        if let Some(invite) = self.by_token.lock().get_mut(token) {
            invite.used_count = (invite.used_count - 1).max(0);
        }
        Ok(())
    }
}
