//! Axum extractors for request handling
//!
//! Custom extractors for the authorization gate, the browser session,
//! caller metadata and validated bodies.

mod auth;
mod client;
mod path;
pub mod session;
mod validated;

pub use auth::{AdminOnly, AuthRejection, AuthSource, AuthUser, RequireRole, RoleSet, DEV_PRINCIPAL_ID};
pub use client::{client_ip, peer_addr, request_ip, ClientMeta};
pub use path::ValidPath;
pub use session::{FlashKind, Session};
pub use validated::{OptionalValidatedJson, Submitted, ValidatedJson};
