//! Entity to model mappers
//!
//! Conversions between domain entities (sgc-core) and database models.
//! - `TryFrom<Model> for Entity`: rows carrying enum columns as text
//! - `From<Model> for Entity`: rows that map one to one

mod account;
mod audit_event;
mod invite;
mod refresh_token;

pub use account::AccountInsert;
