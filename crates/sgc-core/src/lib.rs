//! # sgc-core
//!
//! Domain layer for the SGC identity core: account, refresh token, invite and
//! audit entities, the account and signup policies, and repository traits.
//! This crate has no dependencies on infrastructure (database, web framework, etc.).

pub mod entities;
pub mod error;
pub mod policy;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    generate_invite_token, Account, AccountId, AuditEvent, AuditEventType, Invite, NewAccount,
    NewAuditEvent, RefreshTokenRecord, LOCKOUT_MINUTES, MAX_FAILED_LOGINS,
};
pub use error::DomainError;
pub use policy::{DomainAllowlist, SignupMode, SignupPolicy};
pub use traits::{
    AccountFilter, AccountQuery, AccountRepository, AuditQuery, AuditRepository,
    InviteRepository, Page, RefreshTokenRepository, RepoResult,
};
pub use value_objects::{normalize_email, roles_intersect, AccountStatus, Role};
