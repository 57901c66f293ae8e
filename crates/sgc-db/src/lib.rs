//! # sgc-db
//!
//! Storage layer implementing the identity repository traits.
//!
//! ## Overview
//!
//! This crate provides two implementations of every repository trait
//! defined in `sgc-core`:
//!
//! - PostgreSQL repositories (`Pg*Repository`) backed by SQLx, with models,
//!   mappers and embedded-on-disk migrations
//! - In-memory repositories (`Memory*Repository`) for development and tests
//!
//! [`Repositories`] bundles one of each behind trait objects.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sgc_db::{create_pool, run_migrations, PoolConfig, Repositories};
//!
//! async fn example(config: &sgc_common::config::DatabaseConfig) -> anyhow::Result<()> {
//!     let pool = create_pool(&PoolConfig::from_config(config)?).await?;
//!     run_migrations(&pool, &config.migrations_dir).await?;
//!     let repos = Repositories::postgres(pool);
//!     Ok(())
//! }
//! ```

pub mod mappers;
pub mod memory;
pub mod models;
pub mod pool;
pub mod repositories;
mod stores;

// Re-export commonly used types
pub use memory::{
    MemoryAccountRepository, MemoryAuditRepository, MemoryInviteRepository,
    MemoryRefreshTokenRepository,
};
pub use pool::{create_pool, run_migrations, PgPool, PoolConfig};
pub use repositories::{
    PgAccountRepository, PgAuditRepository, PgInviteRepository, PgRefreshTokenRepository,
};
pub use stores::Repositories;
