//! Account database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for accounts table
#[derive(Debug, Clone, FromRow)]
pub struct AccountModel {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    /// Stored lowercase, constrained by a CHECK
    pub role: String,
    pub status: String,
    pub is_active: bool,
    pub is_approved: bool,
    pub failed_logins: i32,
    pub lock_until: Option<DateTime<Utc>>,
    pub totp_secret: Option<String>,
    pub force_change_password: bool,
    pub category: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub sessions_valid_after: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

