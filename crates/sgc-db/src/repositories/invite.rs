//! PostgreSQL implementation of InviteRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sgc_core::traits::{InviteRepository, RepoResult};
use sgc_core::{DomainError, Invite};
use sqlx::PgPool;
use tracing::instrument;

use crate::models::InviteModel;

use super::error::{map_db_error, map_unique_violation};

/// PostgreSQL implementation of InviteRepository
#[derive(Clone)]
pub struct PgInviteRepository {
    pool: PgPool,
}

impl PgInviteRepository {
    /// Create a new PgInviteRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InviteRepository for PgInviteRepository {
    #[instrument(skip(self, invite), fields(role = %invite.role))]
    async fn create(&self, invite: &Invite) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invites (token, email, role, category, max_uses, used_count,
                                 expires_at, revoked_at, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&invite.token)
        .bind(&invite.email)
        .bind(invite.role.as_str())
        .bind(&invite.category)
        .bind(invite.max_uses)
        .bind(invite.used_count)
        .bind(invite.expires_at)
        .bind(invite.revoked_at)
        .bind(invite.created_by)
        .bind(invite.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, |_| DomainError::InviteTokenExists))?;

        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn find_by_token(&self, token: &str) -> RepoResult<Option<Invite>> {
        let result = sqlx::query_as::<_, InviteModel>(
            r#"
            SELECT token, email, role, category, max_uses, used_count, expires_at,
                   revoked_at, created_by, created_at
            FROM invites
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        result.map(Invite::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn list(&self, limit: i64) -> RepoResult<Vec<Invite>> {
        let results = sqlx::query_as::<_, InviteModel>(
            r#"
            SELECT token, email, role, category, max_uses, used_count, expires_at,
                   revoked_at, created_by, created_at
            FROM invites
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit.max(1))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        results.into_iter().map(Invite::try_from).collect()
    }

    #[instrument(skip(self, token))]
    async fn revoke(&self, token: &str, now: DateTime<Utc>) -> RepoResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE invites
            SET revoked_at = COALESCE(revoked_at, $2)
            WHERE token = $1
            "#,
        )
        .bind(token)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::InviteNotFound);
        }

        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn redeem(&self, token: &str, now: DateTime<Utc>) -> RepoResult<Option<Invite>> {
        // The guard and the increment are one statement, so two redeemers of
        // the last remaining use cannot both succeed
        let result = sqlx::query_as::<_, InviteModel>(
            r#"
            UPDATE invites
            SET used_count = used_count + 1
            WHERE token = $1
              AND revoked_at IS NULL
              AND (expires_at IS NULL OR expires_at > $2)
              AND used_count < max_uses
            RETURNING token, email, role, category, max_uses, used_count, expires_at,
                      revoked_at, created_by, created_at
            "#,
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        result.map(Invite::try_from).transpose()
    }

    #[instrument(skip(self, token))]
    async fn release(&self, token: &str) -> RepoResult<()> {
        sqlx::query(
            r"
            UPDATE invites
            SET used_count = used_count - 1
            WHERE token = $1 AND used_count > 0
            ",
        )
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }
}
