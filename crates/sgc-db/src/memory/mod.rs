//! In-memory repositories
//!
//! Used by development servers started with `STORAGE_BACKEND=memory` and by
//! tests. Each table sits behind one `parking_lot::Mutex`, so every trait
//! method is atomic the same way the single-statement SQL versions are.

mod account;
mod audit;
mod invite;
mod refresh_token;

pub use account::MemoryAccountRepository;
pub use audit::MemoryAuditRepository;
pub use invite::MemoryInviteRepository;
pub use refresh_token::MemoryRefreshTokenRepository;
