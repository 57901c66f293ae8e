//! Response DTOs for API endpoints
//!
//! All response DTOs implement `Serialize` for JSON output.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sgc_core::{AccountId, AccountStatus, Role};

pub use sgc_common::auth::TokenPair;

// ============================================================================
// Auth Responses
// ============================================================================

/// `GET /api/v1/auth/me`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MeResponse {
    pub id: AccountId,
    pub email: Option<String>,
    pub role: Role,
}

/// Plain acknowledgement
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogoutAllResponse {
    pub revoked: u64,
}

// ============================================================================
// Account Responses
// ============================================================================

/// Account as admins see it; never carries the hash or TOTP secret
#[derive(Debug, Clone, Serialize)]
pub struct AccountResponse {
    pub id: AccountId,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    pub status: AccountStatus,
    pub is_active: bool,
    pub is_approved: bool,
    pub category: Option<String>,
    pub force_change_password: bool,
    pub failed_logins: i32,
    pub lock_until: Option<DateTime<Utc>>,
    pub mfa_enrolled: bool,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetLinkResponse {
    pub reset_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevokeSessionsResponse {
    pub revoked: u64,
}

// ============================================================================
// Invite Responses
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct InviteResponse {
    pub token: String,
    pub url: String,
    pub email: Option<String>,
    pub role: Role,
    pub category: Option<String>,
    pub max_uses: i32,
    pub used_count: i32,
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_by: Option<AccountId>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Health Responses
// ============================================================================

/// Basic health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Readiness check response
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub checks: HealthChecks,
}

/// Per-dependency status; `redis` is `disabled` when no store is configured
#[derive(Debug, Clone, Serialize)]
pub struct HealthChecks {
    pub database: String,
    pub redis: String,
}

impl ReadinessResponse {
    pub fn ready(database_healthy: bool, redis_healthy: Option<bool>) -> Self {
        let all_healthy = database_healthy && redis_healthy.unwrap_or(true);
        Self {
            status: if all_healthy { "ready" } else { "not_ready" }.to_string(),
            timestamp: Utc::now(),
            checks: HealthChecks {
                database: if database_healthy { "healthy" } else { "unhealthy" }.to_string(),
                redis: match redis_healthy {
                    Some(true) => "healthy",
                    Some(false) => "unhealthy",
                    None => "disabled",
                }
                .to_string(),
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == "ready"
    }
}
