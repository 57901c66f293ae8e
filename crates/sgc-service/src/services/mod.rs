//! Business logic services
//!
//! Each service borrows the shared [`ServiceContext`] and orchestrates
//! repositories, credential helpers, the mailer and the audit log.

pub mod admin;
pub mod audit;
pub mod auth;
pub mod context;
pub mod error;
pub mod invite;
pub mod mailer;
pub mod maintenance;
pub mod mfa;
pub mod recovery;
pub mod signup;

pub use admin::AdminService;
pub use audit::{AuditLogger, ClientInfo};
pub use auth::{safe_next, AuthService, CompletedLogin, LoginOutcome, MfaChallenge, MfaStage};
pub use context::{AuthSettings, ServiceContext, ServiceContextBuilder};
pub use error::{ServiceError, ServiceResult};
pub use invite::InviteService;
pub use mailer::{
    mailer_from_config, CapturingMailer, LogMailer, MailError, Mailer, OutgoingMail, SmtpMailer,
};
pub use maintenance::{spawn_cleanup_task, MaintenanceService, SeedOutcome};
pub use mfa::{MfaService, TotpEnrollment};
pub use recovery::{RecoveryService, ResetClaim};
pub use signup::SignupService;
