//! Ports implemented by the infrastructure crates

mod repositories;

pub use repositories::{
    AccountFilter, AccountQuery, AccountRepository, AuditQuery, AuditRepository,
    InviteRepository, Page, RefreshTokenRepository, RepoResult, DEFAULT_PER_PAGE, MAX_PER_PAGE,
};
