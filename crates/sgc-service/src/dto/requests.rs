//! Request DTOs for API and browser endpoints
//!
//! JSON bodies derive `Validate`; browser forms are converted into these
//! before reaching a service.

use serde::Deserialize;
use validator::Validate;

// ============================================================================
// Auth Requests
// ============================================================================

/// Credential login; `email` also accepts a username
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254, message = "email is required"))]
    pub email: String,

    #[validate(length(min = 1, max = 1024, message = "password is required"))]
    pub password: String,
}

/// Browser login form after checkbox/next normalization
#[derive(Debug, Clone, Default)]
pub struct BrowserLoginRequest {
    pub identifier: String,
    pub password: String,
    pub remember: bool,
    pub next: Option<String>,
}

/// Token refresh; the token may also arrive as a bearer header
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

/// Logout with the refresh token to revoke
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// Authenticated password change
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "current password is required"))]
    pub current: String,

    #[validate(length(min = 1, message = "new password is required"))]
    pub new: String,

    pub confirm: String,
}

/// Six-digit authenticator code
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TotpCodeRequest {
    #[validate(length(min = 6, max = 8, message = "code must be 6 digits"))]
    pub code: String,
}

// ============================================================================
// Recovery Requests
// ============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(length(min = 1, max = 254, message = "email is required"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "new password is required"))]
    pub new: String,

    pub confirm: String,
}

// ============================================================================
// Signup Requests
// ============================================================================

/// Self-service registration
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 64, message = "username must be 3-64 characters"))]
    pub username: String,

    #[validate(email(message = "invalid email"))]
    pub email: String,

    pub password: String,

    pub confirm: String,

    /// Invite token, required in invite mode
    pub token: Option<String>,
}

// ============================================================================
// Admin Requests
// ============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInviteRequest {
    #[validate(email(message = "invalid email"))]
    pub email: Option<String>,

    /// Role granted on signup, `viewer` when absent
    pub role: Option<String>,

    #[validate(length(max = 64, message = "category must be at most 64 characters"))]
    pub category: Option<String>,

    #[validate(range(min = 1, max = 1000, message = "max_uses must be 1-1000"))]
    pub max_uses: Option<i32>,

    #[validate(range(min = 1, max = 365, message = "expires_in_days must be 1-365"))]
    pub expires_in_days: Option<i64>,
}

/// `GET /api/v1/users` and the CSV export
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListAccountsQuery {
    pub status: Option<String>,
    pub q: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Approval with optional role/category assignment
#[derive(Debug, Clone, Deserialize, Default, Validate)]
pub struct ApproveAccountRequest {
    pub role: Option<String>,

    #[validate(length(max = 64, message = "category must be at most 64 characters"))]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ForcePasswordChangeRequest {
    pub value: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuditListQuery {
    pub user_id: Option<i64>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub limit: Option<i64>,
}
