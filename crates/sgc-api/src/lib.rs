//! # sgc-api
//!
//! HTTP surface of the SGC identity core, built with Axum: the JSON token
//! API under `/api/v1`, the browser auth pages under `/auth` and health
//! checks.

pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod server;
pub mod state;

pub use server::{
    connect_repositories, create_app, create_app_state, create_app_state_with, run, run_server,
    serve,
};
pub use state::AppState;
