//! # sgc-common
//!
//! Shared infrastructure for the SGC identity core: configuration, the
//! application error taxonomy, password hashing, signed tokens, JWTs, TOTP
//! and tracing setup.

pub mod auth;
pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use auth::{
    hash_password, needs_rehash, purpose, verify_password, Claims, IssuedTokens, JwtService,
    PasswordService, SignedTokenService, TokenPair, TokenSubject, TokenType, TotpService,
};
pub use config::{
    is_truthy, AppConfig, ConfigError, DevOverrides, Environment, StorageBackend,
};
pub use error::{AppError, AppResult, ErrorResponse};
pub use telemetry::{init_tracing_for, try_init_tracing_with_config, TracingConfig, TracingError};
