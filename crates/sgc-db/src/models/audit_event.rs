//! Audit event database model

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::FromRow;

/// Database model for audit_events table
#[derive(Debug, Clone, FromRow)]
pub struct AuditEventModel {
    pub id: i64,
    pub ts: DateTime<Utc>,
    /// Snake-case event type name
    pub event_type: String,
    pub user_id: Option<i64>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    /// JSON object of event details
    pub meta: JsonValue,
}
