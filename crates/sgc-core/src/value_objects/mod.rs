//! Value objects - small immutable types shared by the identity entities

mod email;
mod role;

pub use email::{email_domain, looks_like_email, normalize_email};
pub use role::{roles_intersect, AccountStatus, Role};
