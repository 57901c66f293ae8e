//! Invite database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for invites table
#[derive(Debug, Clone, FromRow)]
pub struct InviteModel {
    pub token: String,
    pub email: Option<String>,
    pub role: String,
    pub category: Option<String>,
    pub max_uses: i32,
    pub used_count: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

