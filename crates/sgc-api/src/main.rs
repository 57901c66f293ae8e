//! SGC API server entry point
//!
//! Run with:
//! ```bash
//! cargo run -p sgc-api
//! ```
//!
//! Configuration is loaded from environment variables and an optional `.env`.

use std::process::ExitCode;

use sgc_common::{init_tracing_for, AppConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::from(1);
        }
    };

    init_tracing_for(config.app.env);

    if let Err(e) = config.validate() {
        error!(error = %e, "Refusing to start with invalid configuration");
        return ExitCode::from(1);
    }

    info!(
        env = ?config.app.env,
        address = %config.api.address(),
        backend = ?config.database.backend,
        "Starting SGC API server..."
    );

    match sgc_api::run(config).await {
        Ok(()) => {
            info!("Server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server failed");
            ExitCode::from(2)
        }
    }
}
