//! sgc-admin - operator commands against the SGC identity store
//!
//! Reads the same environment as the server.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sgc_api::connect_repositories;
use sgc_common::{init_tracing_for, AppConfig};
use sgc_service::dto::CreateInviteRequest;
use sgc_service::{
    mailer_from_config, ClientInfo, InviteService, MaintenanceService, SeedOutcome,
    ServiceContext, ServiceError,
};
use tracing::error;

/// sgc-admin - operator commands for the SGC identity core
#[derive(Parser, Debug)]
#[command(name = "sgc-admin")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an approved admin, or promote and re-password an existing one
    SeedAdmin {
        #[arg(long)]
        email: String,
        #[arg(long, env = "SGC_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        username: Option<String>,
    },
    /// Create an invite and print its signup URL
    CreateInvite {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        max_uses: Option<i32>,
        #[arg(long)]
        expires_in_days: Option<i64>,
    },
    /// Purge expired and revoked refresh tokens
    CleanupTokens {
        /// Days past expiry a record is kept
        #[arg(long)]
        grace_days: Option<i64>,
    },
}

/// Failure with the exit code it maps to
enum Failure {
    Invalid(String),
    Runtime(String),
}

impl Failure {
    fn exit_code(&self) -> ExitCode {
        match self {
            Self::Invalid(_) => ExitCode::from(1),
            Self::Runtime(_) => ExitCode::from(2),
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::Invalid(msg) | Self::Runtime(msg) => msg,
        }
    }
}

impl From<ServiceError> for Failure {
    fn from(err: ServiceError) -> Self {
        if err.status_code() < 500 {
            Self::Invalid(err.to_string())
        } else {
            Self::Runtime(err.to_string())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::from(1);
        }
    };
    init_tracing_for(config.app.env);

    match execute(args.command, config).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(failure) => {
            error!(error = %failure.message(), "Command failed");
            eprintln!("error: {}", failure.message());
            failure.exit_code()
        }
    }
}

async fn execute(command: Command, config: AppConfig) -> Result<String, Failure> {
    config.validate().map_err(|e| Failure::Invalid(e.to_string()))?;

    let repos = connect_repositories(&config.database)
        .await
        .map_err(|e| Failure::Runtime(e.to_string()))?;
    let mailer = mailer_from_config(&config.mail).map_err(|e| Failure::Invalid(e.to_string()))?;
    let ctx = ServiceContext::from_config(&config, repos, mailer);
    let client = ClientInfo::new(None, Some("sgc-admin".to_string()));

    match command {
        Command::SeedAdmin {
            email,
            password,
            username,
        } => {
            let outcome = MaintenanceService::new(&ctx)
                .seed_admin(&email, &password, username.as_deref())
                .await?;
            let verb = match outcome {
                SeedOutcome::Created(_) => "created",
                SeedOutcome::Updated(_) => "updated",
            };
            let account = outcome.account();
            Ok(format!("admin {} ({verb}, id {})", account.username, account.id))
        }
        Command::CreateInvite {
            email,
            role,
            category,
            max_uses,
            expires_in_days,
        } => {
            let request = CreateInviteRequest {
                email,
                role,
                category,
                max_uses,
                expires_in_days,
            };
            let invite = InviteService::new(&ctx).create(None, request, &client).await?;
            Ok(invite.url)
        }
        Command::CleanupTokens { grace_days } => {
            let grace_days = grace_days.unwrap_or(config.maintenance.grace_days);
            let purged = MaintenanceService::new(&ctx)
                .cleanup_refresh_tokens(grace_days)
                .await?;
            Ok(purged.to_string())
        }
    }
}
