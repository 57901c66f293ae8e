//! Integration test utilities for the SGC identity core
//!
//! Each test boots its own in-memory server on an ephemeral port and
//! drives it over real HTTP with a cookie-aware client.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
