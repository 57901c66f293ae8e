//! Repository implementations
//!
//! PostgreSQL implementations of the repository traits defined in sgc-core.
//! Each repository handles database operations for a specific domain entity.

mod account;
mod audit;
mod error;
mod invite;
mod refresh_token;

pub use account::PgAccountRepository;
pub use audit::PgAuditRepository;
pub use error::map_db_error;
pub use invite::PgInviteRepository;
pub use refresh_token::PgRefreshTokenRepository;
