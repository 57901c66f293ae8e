//! Route handlers
//!
//! JSON API handlers organized by domain, plus the browser auth flows.

pub mod audit;
pub mod auth;
pub mod browser;
pub mod health;
pub mod invites;
pub mod pages;
pub mod users;
