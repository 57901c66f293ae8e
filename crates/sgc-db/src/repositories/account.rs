//! PostgreSQL implementation of AccountRepository

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sgc_core::traits::{AccountFilter, AccountQuery, AccountRepository, Page, RepoResult};
use sgc_core::{
    normalize_email, Account, AccountId, NewAccount, Role, LOCKOUT_MINUTES, MAX_FAILED_LOGINS,
};
use sqlx::PgPool;
use tracing::instrument;

use crate::mappers::AccountInsert;
use crate::models::AccountModel;

use super::error::{account_conflict, account_not_found, like_pattern, map_db_error, map_unique_violation};

/// PostgreSQL implementation of AccountRepository
#[derive(Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    /// Create a new PgAccountRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Bind values for the shared status/search filter
    fn filter_binds(filter: &AccountFilter) -> (Option<&'static str>, Option<String>) {
        (
            filter.status.map(|s| s.as_str()),
            filter.needle().map(|q| like_pattern(&q)),
        )
    }
}

fn into_accounts(rows: Vec<AccountModel>) -> RepoResult<Vec<Account>> {
    rows.into_iter().map(Account::try_from).collect()
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: AccountId) -> RepoResult<Option<Account>> {
        let result = sqlx::query_as::<_, AccountModel>(
            r"
            SELECT id, username, email, password_hash, role, status, is_active, is_approved,
                   failed_logins, lock_until, totp_secret, force_change_password, category,
                   approved_at, sessions_valid_after, created_at
            FROM accounts
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        result.map(Account::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<Account>> {
        let Some(email) = normalize_email(email) else {
            return Ok(None);
        };

        let result = sqlx::query_as::<_, AccountModel>(
            r"
            SELECT id, username, email, password_hash, role, status, is_active, is_approved,
                   failed_logins, lock_until, totp_secret, force_change_password, category,
                   approved_at, sessions_valid_after, created_at
            FROM accounts
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        result.map(Account::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_username(&self, username: &str) -> RepoResult<Option<Account>> {
        let username = username.trim();
        if username.is_empty() {
            return Ok(None);
        }

        let result = sqlx::query_as::<_, AccountModel>(
            r"
            SELECT id, username, email, password_hash, role, status, is_active, is_approved,
                   failed_logins, lock_until, totp_secret, force_change_password, category,
                   approved_at, sessions_valid_after, created_at
            FROM accounts
            WHERE LOWER(username) = LOWER($1)
            ",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        result.map(Account::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn username_exists(&self, username: &str) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS(SELECT 1 FROM accounts WHERE LOWER(username) = LOWER($1))
            ",
        )
        .bind(username.trim())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    #[instrument(skip(self))]
    async fn email_exists(&self, email: &str) -> RepoResult<bool> {
        let Some(email) = normalize_email(email) else {
            return Ok(false);
        };

        sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS(SELECT 1 FROM accounts WHERE email = $1)
            ",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    #[instrument(skip(self, account), fields(username = %account.username))]
    async fn create(&self, account: &NewAccount) -> RepoResult<Account> {
        let insert = AccountInsert::new(account);

        let model = sqlx::query_as::<_, AccountModel>(
            r"
            INSERT INTO accounts (username, email, password_hash, role, status, is_active,
                                  is_approved, category, force_change_password, approved_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, CASE WHEN $7 THEN NOW() END)
            RETURNING id, username, email, password_hash, role, status, is_active, is_approved,
                      failed_logins, lock_until, totp_secret, force_change_password, category,
                      approved_at, sessions_valid_after, created_at
            ",
        )
        .bind(insert.username)
        .bind(insert.email)
        .bind(insert.password_hash)
        .bind(insert.role)
        .bind(insert.status)
        .bind(insert.is_active)
        .bind(insert.is_approved)
        .bind(insert.category)
        .bind(insert.force_change_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, account_conflict))?;

        Account::try_from(model)
    }

    #[instrument(skip(self, category))]
    async fn approve(
        &self,
        id: AccountId,
        role: Option<Role>,
        category: Option<&str>,
        now: DateTime<Utc>,
    ) -> RepoResult<Account> {
        let result = sqlx::query_as::<_, AccountModel>(
            r"
            UPDATE accounts
            SET status = 'approved', is_active = TRUE, is_approved = TRUE, approved_at = $2,
                role = COALESCE($3, role), category = COALESCE($4, category)
            WHERE id = $1
            RETURNING id, username, email, password_hash, role, status, is_active, is_approved,
                      failed_logins, lock_until, totp_secret, force_change_password, category,
                      approved_at, sessions_valid_after, created_at
            ",
        )
        .bind(id)
        .bind(now)
        .bind(role.map(|r| r.as_str()))
        .bind(category)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        result.map_or_else(|| Err(account_not_found(id)), Account::try_from)
    }

    #[instrument(skip(self))]
    async fn reject(&self, id: AccountId) -> RepoResult<Account> {
        let result = sqlx::query_as::<_, AccountModel>(
            r"
            UPDATE accounts
            SET status = 'rejected', is_active = FALSE, is_approved = FALSE
            WHERE id = $1
            RETURNING id, username, email, password_hash, role, status, is_active, is_approved,
                      failed_logins, lock_until, totp_secret, force_change_password, category,
                      approved_at, sessions_valid_after, created_at
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        result.map_or_else(|| Err(account_not_found(id)), Account::try_from)
    }

    #[instrument(skip(self))]
    async fn set_force_change(&self, id: AccountId, value: bool) -> RepoResult<Account> {
        let result = sqlx::query_as::<_, AccountModel>(
            r"
            UPDATE accounts
            SET force_change_password = $2
            WHERE id = $1
            RETURNING id, username, email, password_hash, role, status, is_active, is_approved,
                      failed_logins, lock_until, totp_secret, force_change_password, category,
                      approved_at, sessions_valid_after, created_at
            ",
        )
        .bind(id)
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        result.map_or_else(|| Err(account_not_found(id)), Account::try_from)
    }

    #[instrument(skip(self))]
    async fn revoke_sessions(&self, id: AccountId, now: DateTime<Utc>) -> RepoResult<()> {
        let result = sqlx::query(
            r"
            UPDATE accounts
            SET sessions_valid_after = GREATEST(COALESCE(sessions_valid_after, $2), $2)
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(account_not_found(id));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn record_failed_login(&self, id: AccountId, now: DateTime<Utc>) -> RepoResult<Account> {
        // Single statement so concurrent failures serialize on the row lock
        let result = sqlx::query_as::<_, AccountModel>(
            r"
            UPDATE accounts
            SET failed_logins = failed_logins + 1,
                lock_until = CASE WHEN failed_logins + 1 >= $2 THEN $3 ELSE lock_until END
            WHERE id = $1
            RETURNING id, username, email, password_hash, role, status, is_active, is_approved,
                      failed_logins, lock_until, totp_secret, force_change_password, category,
                      approved_at, sessions_valid_after, created_at
            ",
        )
        .bind(id)
        .bind(MAX_FAILED_LOGINS)
        .bind(now + Duration::minutes(LOCKOUT_MINUTES))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        match result {
            Some(model) => Account::try_from(model),
            None => Err(account_not_found(id)),
        }
    }

    #[instrument(skip(self))]
    async fn reset_failed_logins(&self, id: AccountId) -> RepoResult<()> {
        let result = sqlx::query(
            r"
            UPDATE accounts
            SET failed_logins = 0, lock_until = NULL
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(account_not_found(id));
        }

        Ok(())
    }

    #[instrument(skip(self, password_hash))]
    async fn set_password(&self, id: AccountId, password_hash: &str) -> RepoResult<()> {
        let result = sqlx::query(
            r"
            UPDATE accounts
            SET password_hash = $2, force_change_password = FALSE
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(account_not_found(id));
        }

        Ok(())
    }

    #[instrument(skip(self, password_hash))]
    async fn upgrade_password_hash(&self, id: AccountId, password_hash: &str) -> RepoResult<()> {
        let result = sqlx::query(
            r"
            UPDATE accounts
            SET password_hash = $2
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(account_not_found(id));
        }

        Ok(())
    }

    #[instrument(skip(self, secret))]
    async fn set_totp_secret(&self, id: AccountId, secret: &str) -> RepoResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE accounts
            SET totp_secret = $2
            WHERE id = $1 AND (totp_secret IS NULL OR totp_secret = '')
            ",
        )
        .bind(id)
        .bind(secret)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        match self.find_by_id(id).await? {
            Some(_) => Ok(false),
            None => Err(account_not_found(id)),
        }
    }

    #[instrument(skip(self))]
    async fn list(&self, query: &AccountQuery) -> RepoResult<Page<Account>> {
        let (status, pattern) = Self::filter_binds(&query.filter);

        let total = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*)
            FROM accounts
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::TEXT IS NULL OR LOWER(username) LIKE $2 OR email LIKE $2)
            ",
        )
        .bind(status)
        .bind(pattern.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        let rows = sqlx::query_as::<_, AccountModel>(
            r"
            SELECT id, username, email, password_hash, role, status, is_active, is_approved,
                   failed_logins, lock_until, totp_secret, force_change_password, category,
                   approved_at, sessions_valid_after, created_at
            FROM accounts
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::TEXT IS NULL OR LOWER(username) LIKE $2 OR email LIKE $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            ",
        )
        .bind(status)
        .bind(pattern.as_deref())
        .bind(query.per_page)
        .bind(query.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(Page {
            items: into_accounts(rows)?,
            total,
            page: query.page,
            per_page: query.per_page,
        })
    }

    #[instrument(skip(self))]
    async fn export(&self, filter: &AccountFilter) -> RepoResult<Vec<Account>> {
        let (status, pattern) = Self::filter_binds(filter);

        let rows = sqlx::query_as::<_, AccountModel>(
            r"
            SELECT id, username, email, password_hash, role, status, is_active, is_approved,
                   failed_logins, lock_until, totp_secret, force_change_password, category,
                   approved_at, sessions_valid_after, created_at
            FROM accounts
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::TEXT IS NULL OR LOWER(username) LIKE $2 OR email LIKE $2)
            ORDER BY id ASC
            ",
        )
        .bind(status)
        .bind(pattern.as_deref())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        into_accounts(rows)
    }
}
