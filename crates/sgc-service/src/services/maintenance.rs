//! Housekeeping: refresh-token cleanup and admin seeding

use std::time::Duration;

use chrono::Utc;
use sgc_common::config::AppConfig;
use sgc_core::{normalize_email, Account, AccountStatus, DomainError, NewAccount, Role};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, instrument, warn};

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};

/// What [`MaintenanceService::seed_admin`] did
#[derive(Debug, Clone)]
pub enum SeedOutcome {
    Created(Account),
    Updated(Account),
}

impl SeedOutcome {
    pub fn account(&self) -> &Account {
        match self {
            Self::Created(account) | Self::Updated(account) => account,
        }
    }
}

pub struct MaintenanceService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> MaintenanceService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Purge refresh tokens expired or revoked more than `grace_days` ago
    #[instrument(skip(self))]
    pub async fn cleanup_refresh_tokens(&self, grace_days: i64) -> ServiceResult<u64> {
        let purged = self
            .ctx
            .refresh_tokens()
            .cleanup(grace_days.max(0), Utc::now())
            .await?;
        info!(purged, "Refresh token cleanup finished");
        Ok(purged)
    }

    /// Create an approved admin, or promote and re-password the existing
    /// account with that email
    #[instrument(skip(self, password))]
    pub async fn seed_admin(
        &self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> ServiceResult<SeedOutcome> {
        let email = normalize_email(email).ok_or(DomainError::InvalidEmail)?;
        if password.is_empty() {
            return Err(ServiceError::validation("password is required"));
        }
        let hash = self.ctx.passwords().hash_async(password).await?;

        if let Some(existing) = self.ctx.accounts().find_by_email(&email).await? {
            let accounts = self.ctx.accounts();
            let promote = existing.status != AccountStatus::Approved || existing.role != Role::Admin;
            let mut account = if promote {
                accounts.approve(existing.id, Some(Role::Admin), None, Utc::now()).await?
            } else {
                existing
            };
            accounts.set_password(account.id, &hash).await?;
            accounts.reset_failed_logins(account.id).await?;
            account.set_password(hash);
            account.register_success();
            info!(user_id = account.id, "Admin account updated");
            return Ok(SeedOutcome::Updated(account));
        }

        let username = username
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .or_else(|| email.split('@').next())
            .unwrap_or("admin")
            .to_string();
        let account = self
            .ctx
            .accounts()
            .create(&NewAccount::approved(&username, Some(&email), hash, Role::Admin))
            .await?;
        info!(user_id = account.id, username = %account.username, "Admin account created");
        Ok(SeedOutcome::Created(account))
    }

    /// Seed `DEV_ADMIN_EMAIL`/`DEV_ADMIN_PASS` outside production
    pub async fn seed_dev_admin(&self, config: &AppConfig) -> ServiceResult<Option<SeedOutcome>> {
        if config.app.env.is_production() {
            return Ok(None);
        }
        match (&config.dev.admin_email, &config.dev.admin_password) {
            (Some(email), Some(password)) => Ok(Some(self.seed_admin(email, password, None).await?)),
            _ => Ok(None),
        }
    }
}

/// Run the refresh-token cleanup every `every` until the runtime stops
pub fn spawn_cleanup_task(ctx: ServiceContext, every: Duration, grace_days: i64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Err(e) = MaintenanceService::new(&ctx)
                .cleanup_refresh_tokens(grace_days)
                .await
            {
                warn!(error = %e, "Refresh token cleanup failed");
            }
        }
    })
}
