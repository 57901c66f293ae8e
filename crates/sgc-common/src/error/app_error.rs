//! Application error types
//!
//! The user-visible error taxonomy shared by services and HTTP layers.

use serde::Serialize;
use sgc_core::DomainError;
use std::fmt;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Authentication errors
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account pending approval")]
    NotApproved,

    #[error("{0}")]
    InvalidOrExpiredToken(String),

    #[error("authentication required")]
    MissingAuth,

    #[error("insufficient role")]
    Forbidden,

    // Validation errors
    #[error("{0}")]
    Validation(String),

    // Resource errors
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    // Rate limiting
    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    // Redis errors
    #[error("Cache error: {0}")]
    Cache(String),

    // Internal errors
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Get HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::Validation(_) => 400,

            // 401 Unauthorized
            Self::InvalidCredentials | Self::InvalidOrExpiredToken(_) | Self::MissingAuth => 401,

            // 403 Forbidden
            Self::NotApproved | Self::Forbidden => 403,

            // 404 Not Found
            Self::NotFound(_) => 404,

            // 409 Conflict
            Self::Conflict(_) => 409,

            // 429 Too Many Requests
            Self::RateLimited { .. } => 429,

            // 500 Internal Server Error
            Self::Database(_) | Self::Cache(_) | Self::Internal(_) | Self::Config(_) => 500,

            // Map domain errors to appropriate status codes
            Self::Domain(e) => {
                if e.is_token_rejection() {
                    401
                } else if e.is_not_found() {
                    404
                } else if e.is_validation() {
                    400
                } else if e.is_conflict() {
                    409
                } else if matches!(e, DomainError::SignupClosed) {
                    403
                } else {
                    500
                }
            }
        }
    }

    /// Get error code for API responses
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::NotApproved => "NOT_APPROVED",
            Self::InvalidOrExpiredToken(_) => "INVALID_OR_EXPIRED_TOKEN",
            Self::MissingAuth => "MISSING_AUTH",
            Self::Forbidden => "FORBIDDEN",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Cache(_) => "CACHE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Domain(e) => e.code(),
        }
    }

    /// Check if this is a client error (4xx)
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        let status = self.status_code();
        (400..500).contains(&status)
    }

    /// Check if this is a server error (5xx)
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        let status = self.status_code();
        (500..600).contains(&status)
    }

    /// Message safe to show to the caller; server errors are masked
    #[must_use]
    pub fn public_message(&self) -> String {
        if self.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }

    /// Create a not found error for a resource type
    #[must_use]
    pub fn not_found(resource: impl fmt::Display) -> Self {
        Self::NotFound(resource.to_string())
    }

    /// Create a validation error
    #[must_use]
    pub fn validation(msg: impl fmt::Display) -> Self {
        Self::Validation(msg.to_string())
    }

    /// Create an invalid-or-expired token error
    #[must_use]
    pub fn invalid_token(msg: impl fmt::Display) -> Self {
        Self::InvalidOrExpiredToken(msg.to_string())
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

/// JSON error envelope
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub detail: String,
    pub path: Option<String>,
    pub request_id: Option<String>,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            code: code.into(),
            detail: message.clone(),
            message,
            path: None,
            request_id: None,
        }
    }
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        Self::new(err.error_code(), err.public_message())
    }
}

impl From<AppError> for ErrorResponse {
    fn from(err: AppError) -> Self {
        Self::from(&err)
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::InvalidCredentials.status_code(), 401);
        assert_eq!(AppError::NotApproved.status_code(), 403);
        assert_eq!(AppError::Forbidden.status_code(), 403);
        assert_eq!(AppError::not_found("account").status_code(), 404);
        assert_eq!(AppError::validation("x").status_code(), 400);
        assert_eq!(AppError::RateLimited { retry_after_secs: 1 }.status_code(), 429);
        assert_eq!(AppError::Database("x".into()).status_code(), 500);
    }

    #[test]
    fn test_domain_mapping() {
        assert_eq!(AppError::from(DomainError::EmailExists).status_code(), 409);
        assert_eq!(AppError::from(DomainError::AccountNotFound(3)).status_code(), 404);
        assert_eq!(AppError::from(DomainError::PasswordMismatch).status_code(), 400);
        assert_eq!(AppError::from(DomainError::InviteInactive).status_code(), 401);
        assert_eq!(AppError::from(DomainError::SignupClosed).status_code(), 403);
        assert_eq!(
            AppError::from(DomainError::DatabaseError("boom".into())).status_code(),
            500
        );
    }

    #[test]
    fn test_error_response_masks_internals() {
        let err = AppError::internal(anyhow::anyhow!("connection refused at 10.0.0.3"));
        let body = ErrorResponse::from(&err);
        assert_eq!(body.code, "INTERNAL_ERROR");
        assert_eq!(body.message, "Internal server error");
        assert_eq!(body.detail, body.message);
    }

    #[test]
    fn test_refresh_message_is_detail() {
        let err = AppError::invalid_token("refresh revoked or expired");
        let body = ErrorResponse::from(err);
        assert_eq!(body.detail, "refresh revoked or expired");
        assert_eq!(body.code, "INVALID_OR_EXPIRED_TOKEN");
    }
}
