//! Password strength rules

use crate::error::DomainError;

/// Minimum length for passwords set through reset or signup
pub const RESET_PASSWORD_MIN_LEN: usize = 12;

/// Minimum length for an authenticated user changing their own password
pub const CHANGE_PASSWORD_MIN_LEN: usize = 8;

/// Strong policy: at least 12 characters with a lowercase letter, an
/// uppercase letter and a digit.
pub fn validate_reset_password(password: &str) -> Result<(), DomainError> {
    if password.chars().count() < RESET_PASSWORD_MIN_LEN {
        return Err(DomainError::WeakPassword(format!(
            "must be at least {RESET_PASSWORD_MIN_LEN} characters"
        )));
    }
    if !password.chars().any(char::is_lowercase) {
        return Err(DomainError::WeakPassword(
            "must contain a lowercase letter".into(),
        ));
    }
    if !password.chars().any(char::is_uppercase) {
        return Err(DomainError::WeakPassword(
            "must contain an uppercase letter".into(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(DomainError::WeakPassword("must contain a digit".into()));
    }
    Ok(())
}

/// Change-password policy: length only
pub fn validate_change_password(password: &str) -> Result<(), DomainError> {
    if password.chars().count() < CHANGE_PASSWORD_MIN_LEN {
        return Err(DomainError::WeakPassword(format!(
            "must be at least {CHANGE_PASSWORD_MIN_LEN} characters"
        )));
    }
    Ok(())
}

pub fn ensure_confirmation(new: &str, confirm: &str) -> Result<(), DomainError> {
    if new == confirm {
        Ok(())
    } else {
        Err(DomainError::PasswordMismatch)
    }
}
