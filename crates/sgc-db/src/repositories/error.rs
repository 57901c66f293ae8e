//! Error handling utilities for repositories

use sgc_core::{AccountId, DomainError};
use sqlx::Error as SqlxError;

/// Convert SQLx error to DomainError
pub fn map_db_error(e: SqlxError) -> DomainError {
    DomainError::DatabaseError(e.to_string())
}

/// Check for unique violation and return appropriate error or fallback
pub fn map_unique_violation<F>(e: SqlxError, on_unique: F) -> DomainError
where
    F: FnOnce(Option<&str>) -> DomainError,
{
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return on_unique(db_err.constraint());
        }
    }
    DomainError::DatabaseError(e.to_string())
}

/// Unique violation on `accounts`: the email index, else the username index
pub fn account_conflict(constraint: Option<&str>) -> DomainError {
    match constraint {
        Some(name) if name.contains("email") => DomainError::EmailExists,
        _ => DomainError::UsernameExists,
    }
}

/// Create an "account not found" error
pub fn account_not_found(id: AccountId) -> DomainError {
    DomainError::AccountNotFound(id)
}

/// `%needle%` for LIKE with the wildcard characters escaped
pub fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
