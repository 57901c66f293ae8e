//! PostgreSQL implementation of AuditRepository

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sgc_core::traits::{AuditQuery, AuditRepository, RepoResult};
use sgc_core::{AuditEvent, NewAuditEvent};
use sqlx::PgPool;
use tracing::instrument;

use crate::models::AuditEventModel;

use super::error::map_db_error;

/// PostgreSQL implementation of AuditRepository
#[derive(Clone)]
pub struct PgAuditRepository {
    pool: PgPool,
}

impl PgAuditRepository {
    /// Create a new PgAuditRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PgAuditRepository {
    #[instrument(skip(self, event), fields(event_type = %event.event_type, user_id = ?event.user_id))]
    async fn append(&self, event: &NewAuditEvent) -> RepoResult<()> {
        sqlx::query(
            r"
            INSERT INTO audit_events (event_type, user_id, ip, user_agent, meta)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(event.event_type.as_str())
        .bind(event.user_id)
        .bind(&event.ip)
        .bind(&event.user_agent)
        .bind(JsonValue::Object(event.meta.clone()))
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(&self, query: &AuditQuery) -> RepoResult<Vec<AuditEvent>> {
        let rows = sqlx::query_as::<_, AuditEventModel>(
            r"
            SELECT id, ts, event_type, user_id, ip, user_agent, meta
            FROM audit_events
            WHERE ($1::BIGINT IS NULL OR user_id = $1)
              AND ($2::TEXT IS NULL OR event_type = $2)
            ORDER BY id DESC
            LIMIT $3
            ",
        )
        .bind(query.user_id)
        .bind(query.event_type.map(|t| t.as_str()))
        .bind(query.limit.max(1))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        rows.into_iter().map(AuditEvent::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PgAuditRepository>();
    }
}
