//! Database models - SQLx-compatible structs for PostgreSQL tables

mod account;
mod audit_event;
mod invite;
mod refresh_token;

pub use account::AccountModel;
pub use audit_event::AuditEventModel;
pub use invite::InviteModel;
pub use refresh_token::RefreshTokenModel;
