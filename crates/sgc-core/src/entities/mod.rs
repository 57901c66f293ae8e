//! Domain entities - core identity objects

mod account;
mod audit_event;
mod invite;
mod refresh_token;

pub use account::{Account, AccountId, NewAccount, LOCKOUT_MINUTES, MAX_FAILED_LOGINS};
pub use audit_event::{AuditEvent, AuditEventType, NewAuditEvent};
pub use invite::{generate_invite_token, Invite};
pub use refresh_token::RefreshTokenRecord;
