//! Domain errors - error types for the identity domain

use thiserror::Error;

use crate::entities::AccountId;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Invite not found")]
    InviteNotFound,

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Password too weak: {0}")]
    WeakPassword(String),

    #[error("Passwords do not match")]
    PasswordMismatch,

    // =========================================================================
    // Signup / Invite Rules
    // =========================================================================
    #[error("Invite is expired, revoked or exhausted")]
    InviteInactive,

    #[error("Invite is bound to a different email")]
    InviteEmailMismatch,

    #[error("Email domain is not allowed")]
    DomainNotAllowed,

    #[error("Signup is closed")]
    SignupClosed,

    // =========================================================================
    // Conflict Errors
    // =========================================================================
    #[error("Username already in use")]
    UsernameExists,

    #[error("Email already in use")]
    EmailExists,

    #[error("Invite token already exists")]
    InviteTokenExists,

    #[error("Refresh token id already recorded")]
    JtiExists,

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// Get an error code string for API responses
    pub fn code(&self) -> &'static str {
        match self {
            // Not Found
            Self::AccountNotFound(_) => "UNKNOWN_ACCOUNT",
            Self::InviteNotFound => "UNKNOWN_INVITE",

            // Validation
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::InvalidRole(_) => "INVALID_ROLE",
            Self::WeakPassword(_) => "WEAK_PASSWORD",
            Self::PasswordMismatch => "PASSWORD_MISMATCH",

            // Signup
            Self::InviteInactive => "INVITE_INACTIVE",
            Self::InviteEmailMismatch => "INVITE_EMAIL_MISMATCH",
            Self::DomainNotAllowed => "DOMAIN_NOT_ALLOWED",
            Self::SignupClosed => "SIGNUP_CLOSED",

            // Conflict
            Self::UsernameExists => "USERNAME_EXISTS",
            Self::EmailExists => "EMAIL_EXISTS",
            Self::InviteTokenExists => "INVITE_TOKEN_EXISTS",
            Self::JtiExists => "JTI_EXISTS",

            // Infrastructure
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::CacheError(_) => "CACHE_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::AccountNotFound(_) | Self::InviteNotFound)
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ValidationError(_)
                | Self::InvalidEmail
                | Self::InvalidRole(_)
                | Self::WeakPassword(_)
                | Self::PasswordMismatch
                | Self::InviteEmailMismatch
                | Self::DomainNotAllowed
        )
    }

    /// Invite or signup rejected by policy; surfaced as an invalid/expired token
    pub fn is_token_rejection(&self) -> bool {
        matches!(self, Self::InviteInactive | Self::InviteNotFound)
    }

    /// Check if this is a conflict error
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::UsernameExists | Self::EmailExists | Self::InviteTokenExists | Self::JtiExists
        )
    }
}
