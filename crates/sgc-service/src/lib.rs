//! # sgc-service
//!
//! Application layer for the SGC identity core: login and token rotation,
//! TOTP enrollment, password recovery, signup and invites, admin operations,
//! the audit logger, outbound mail and periodic maintenance.

pub mod dto;
pub mod services;

pub use services::{
    mailer_from_config, safe_next, spawn_cleanup_task, AdminService, AuditLogger, AuthService,
    AuthSettings, CapturingMailer, ClientInfo, CompletedLogin, InviteService, LogMailer,
    LoginOutcome, MailError, Mailer, MaintenanceService, MfaChallenge, MfaService, MfaStage,
    OutgoingMail, RecoveryService, ResetClaim, SeedOutcome, ServiceContext, ServiceContextBuilder,
    ServiceError, ServiceResult, SignupService, SmtpMailer, TotpEnrollment,
};
