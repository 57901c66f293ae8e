//! Account policy - password rules and signup admission

mod password;
mod signup;

pub use password::{
    ensure_confirmation, validate_change_password, validate_reset_password,
    CHANGE_PASSWORD_MIN_LEN, RESET_PASSWORD_MIN_LEN,
};
pub use signup::{DomainAllowlist, SignupMode, SignupPolicy};
