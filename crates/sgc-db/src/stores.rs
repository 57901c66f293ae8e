//! Repository bundle handed to the service layer

use std::sync::Arc;

use sgc_core::{AccountRepository, AuditRepository, DomainError, InviteRepository, RefreshTokenRepository};
use sqlx::PgPool;

use crate::memory::{
    MemoryAccountRepository, MemoryAuditRepository, MemoryInviteRepository,
    MemoryRefreshTokenRepository,
};
use crate::repositories::{
    map_db_error, PgAccountRepository, PgAuditRepository, PgInviteRepository,
    PgRefreshTokenRepository,
};

/// One implementation of every identity repository
#[derive(Clone)]
pub struct Repositories {
    pub accounts: Arc<dyn AccountRepository>,
    pub refresh_tokens: Arc<dyn RefreshTokenRepository>,
    pub invites: Arc<dyn InviteRepository>,
    pub audit: Arc<dyn AuditRepository>,
    pool: Option<PgPool>,
}

impl Repositories {
    /// PostgreSQL-backed repositories sharing one pool
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            accounts: Arc::new(PgAccountRepository::new(pool.clone())),
            refresh_tokens: Arc::new(PgRefreshTokenRepository::new(pool.clone())),
            invites: Arc::new(PgInviteRepository::new(pool.clone())),
            audit: Arc::new(PgAuditRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Fresh, empty in-memory repositories
    pub fn memory() -> Self {
        Self {
            accounts: Arc::new(MemoryAccountRepository::new()),
            refresh_tokens: Arc::new(MemoryRefreshTokenRepository::new()),
            invites: Arc::new(MemoryInviteRepository::new()),
            audit: Arc::new(MemoryAuditRepository::new()),
            pool: None,
        }
    }

    /// Underlying pool, `None` for memory storage
    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }

    /// Readiness check: a round trip to the database when there is one
    pub async fn ping(&self) -> Result<(), DomainError> {
        if let Some(pool) = &self.pool {
            sqlx::query("SELECT 1")
                .execute(pool)
                .await
                .map_err(map_db_error)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories")
            .field("postgres", &self.pool.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sgc_core::{NewAccount, Role};

    #[tokio::test]
    async fn test_memory_bundle() {
        let repos = Repositories::memory();
        assert!(repos.pool().is_none());
        repos.ping().await.unwrap();

        let account = repos
            .accounts
            .create(&NewAccount::approved("admin", Some("admin@admin.com"), "h".into(), Role::Admin))
            .await
            .unwrap();
        assert!(account.can_sign_in());

        // Clones share the same tables
        let clone = repos.clone();
        assert!(clone.accounts.find_by_id(account.id).await.unwrap().is_some());
    }
}
