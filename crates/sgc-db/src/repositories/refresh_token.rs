//! PostgreSQL implementation of RefreshTokenRepository

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sgc_core::traits::{RefreshTokenRepository, RepoResult};
use sgc_core::{AccountId, DomainError, RefreshTokenRecord};
use sqlx::PgPool;
use tracing::instrument;

use crate::models::RefreshTokenModel;

use super::error::{map_db_error, map_unique_violation};

/// PostgreSQL implementation of RefreshTokenRepository
#[derive(Clone)]
pub struct PgRefreshTokenRepository {
    pool: PgPool,
}

impl PgRefreshTokenRepository {
    /// Create a new PgRefreshTokenRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenRepository for PgRefreshTokenRepository {
    #[instrument(skip(self, jti))]
    async fn create(
        &self,
        user_id: AccountId,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> RepoResult<RefreshTokenRecord> {
        let model = sqlx::query_as::<_, RefreshTokenModel>(
            r"
            INSERT INTO refresh_tokens (user_id, jti, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, jti, created_at, expires_at, revoked
            ",
        )
        .bind(user_id)
        .bind(jti)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, |_| DomainError::JtiExists))?;

        Ok(model.into())
    }

    #[instrument(skip(self, jti))]
    async fn find_by_jti(&self, jti: &str) -> RepoResult<Option<RefreshTokenRecord>> {
        let result = sqlx::query_as::<_, RefreshTokenModel>(
            r"
            SELECT id, user_id, jti, created_at, expires_at, revoked
            FROM refresh_tokens
            WHERE jti = $1
            ",
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(RefreshTokenRecord::from))
    }

    #[instrument(skip(self, jti))]
    async fn is_active(&self, jti: &str, user_id: AccountId, now: DateTime<Utc>) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS(
                SELECT 1 FROM refresh_tokens
                WHERE jti = $1 AND user_id = $2 AND revoked = FALSE AND expires_at > $3
            )
            ",
        )
        .bind(jti)
        .bind(user_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    #[instrument(skip(self, jti))]
    async fn revoke(&self, jti: &str) -> RepoResult<u64> {
        let result = sqlx::query(
            r"
            UPDATE refresh_tokens
            SET revoked = TRUE
            WHERE jti = $1 AND revoked = FALSE
            ",
        )
        .bind(jti)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self, jti))]
    async fn revoke_if_active(
        &self,
        jti: &str,
        user_id: AccountId,
        now: DateTime<Utc>,
    ) -> RepoResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE refresh_tokens
            SET revoked = TRUE
            WHERE jti = $1 AND user_id = $2 AND revoked = FALSE AND expires_at > $3
            ",
        )
        .bind(jti)
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    async fn revoke_all_for_user(&self, user_id: AccountId) -> RepoResult<u64> {
        let result = sqlx::query(
            r"
            UPDATE refresh_tokens
            SET revoked = TRUE
            WHERE user_id = $1 AND revoked = FALSE
            ",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn cleanup(&self, grace_days: i64, now: DateTime<Utc>) -> RepoResult<u64> {
        let cutoff = now - Duration::days(grace_days.max(0));

        let result = sqlx::query(
            r"
            DELETE FROM refresh_tokens
            WHERE expires_at <= $1
               OR (revoked = TRUE AND created_at <= $1)
            ",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected())
    }
}
