//! Service context - dependency container for services
//!
//! Holds the repositories, credential helpers, mailer and the settings the
//! services read at request time.

use std::sync::Arc;

use sgc_common::auth::{JwtService, PasswordService, SignedTokenService, TotpService};
use sgc_common::config::AppConfig;
use sgc_core::traits::{
    AccountRepository, AuditRepository, InviteRepository, RefreshTokenRepository,
};
use sgc_core::SignupPolicy;
use sgc_db::Repositories;

use super::audit::AuditLogger;
use super::error::{ServiceError, ServiceResult};
use super::mailer::Mailer;

/// Dev-only reset shortcut: `token` resets the password of `email`
#[derive(Clone)]
pub struct DevResetToken {
    pub token: String,
    pub email: String,
}

impl std::fmt::Debug for DevResetToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevResetToken")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Request-time knobs derived from [`AppConfig`]
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub enable_2fa: bool,
    pub signup: SignupPolicy,
    pub reset_max_age: i64,
    pub invite_max_age: i64,
    pub public_base_url: String,
    pub dev_reset: Option<DevResetToken>,
    pub cleanup_grace_days: i64,
}

impl AuthSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let dev_reset = if config.app.env.is_production() {
            None
        } else {
            match (&config.dev.reset_token, &config.dev.admin_email) {
                (Some(token), Some(email)) => Some(DevResetToken {
                    token: token.clone(),
                    email: email.trim().to_lowercase(),
                }),
                _ => None,
            }
        };

        Self {
            enable_2fa: config.security.enable_2fa,
            signup: config.signup.policy(),
            reset_max_age: config.tokens.reset_max_age,
            invite_max_age: config.tokens.invite_max_age,
            public_base_url: config.mail.public_base_url.trim_end_matches('/').to_string(),
            dev_reset,
            cleanup_grace_days: config.maintenance.grace_days,
        }
    }

    /// Absolute URL for a local path
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{path}", self.public_base_url)
    }
}

/// Service context containing all dependencies
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct ServiceContext {
    repos: Repositories,
    jwt_service: Arc<JwtService>,
    signed_tokens: Arc<SignedTokenService>,
    totp: Arc<TotpService>,
    passwords: PasswordService,
    mailer: Arc<dyn Mailer>,
    settings: Arc<AuthSettings>,
}

impl ServiceContext {
    /// Create a new service context with all dependencies
    pub fn new(
        repos: Repositories,
        jwt_service: Arc<JwtService>,
        signed_tokens: Arc<SignedTokenService>,
        totp: Arc<TotpService>,
        mailer: Arc<dyn Mailer>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            repos,
            jwt_service,
            signed_tokens,
            totp,
            passwords: PasswordService::new(),
            mailer,
            settings: Arc::new(settings),
        }
    }

    /// Wire every credential helper from the application config
    pub fn from_config(config: &AppConfig, repos: Repositories, mailer: Arc<dyn Mailer>) -> Self {
        let secret = &config.security.secret_key;
        Self::new(
            repos,
            Arc::new(JwtService::new(
                secret,
                config.jwt.access_token_expiry,
                config.jwt.refresh_token_expiry,
            )),
            Arc::new(SignedTokenService::new(
                secret,
                &config.security.password_salt,
            )),
            Arc::new(TotpService::new(&config.security.totp_issuer)),
            mailer,
            AuthSettings::from_config(config),
        )
    }

    // === Repositories ===

    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }

    /// Get the account repository
    pub fn accounts(&self) -> &dyn AccountRepository {
        self.repos.accounts.as_ref()
    }

    /// Get the refresh token registry
    pub fn refresh_tokens(&self) -> &dyn RefreshTokenRepository {
        self.repos.refresh_tokens.as_ref()
    }

    /// Get the invite repository
    pub fn invites(&self) -> &dyn InviteRepository {
        self.repos.invites.as_ref()
    }

    /// Get the audit repository
    pub fn audit_repo(&self) -> &dyn AuditRepository {
        self.repos.audit.as_ref()
    }

    // === Services ===

    pub fn jwt_service(&self) -> &JwtService {
        self.jwt_service.as_ref()
    }

    pub fn signed_tokens(&self) -> &SignedTokenService {
        self.signed_tokens.as_ref()
    }

    pub fn totp(&self) -> &TotpService {
        self.totp.as_ref()
    }

    pub fn passwords(&self) -> &PasswordService {
        &self.passwords
    }

    pub fn mailer(&self) -> &dyn Mailer {
        self.mailer.as_ref()
    }

    /// Audit writer over the configured repository
    pub fn audit(&self) -> AuditLogger<'_> {
        AuditLogger::new(self.audit_repo())
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("repos", &self.repos)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Builder for creating ServiceContext with custom configuration
pub struct ServiceContextBuilder {
    repos: Option<Repositories>,
    jwt_service: Option<Arc<JwtService>>,
    signed_tokens: Option<Arc<SignedTokenService>>,
    totp: Option<Arc<TotpService>>,
    mailer: Option<Arc<dyn Mailer>>,
    settings: Option<AuthSettings>,
}

impl ServiceContextBuilder {
    pub fn new() -> Self {
        Self {
            repos: None,
            jwt_service: None,
            signed_tokens: None,
            totp: None,
            mailer: None,
            settings: None,
        }
    }

    pub fn repositories(mut self, repos: Repositories) -> Self {
        self.repos = Some(repos);
        self
    }

    pub fn jwt_service(mut self, service: Arc<JwtService>) -> Self {
        self.jwt_service = Some(service);
        self
    }

    pub fn signed_tokens(mut self, service: Arc<SignedTokenService>) -> Self {
        self.signed_tokens = Some(service);
        self
    }

    pub fn totp(mut self, service: Arc<TotpService>) -> Self {
        self.totp = Some(service);
        self
    }

    pub fn mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn settings(mut self, settings: AuthSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Build the ServiceContext
    ///
    /// # Errors
    /// Returns `ServiceError::Validation` if any required dependency is missing
    pub fn build(self) -> ServiceResult<ServiceContext> {
        Ok(ServiceContext::new(
            self.repos
                .ok_or_else(|| ServiceError::validation("repositories are required"))?,
            self.jwt_service
                .ok_or_else(|| ServiceError::validation("jwt_service is required"))?,
            self.signed_tokens
                .ok_or_else(|| ServiceError::validation("signed_tokens is required"))?,
            self.totp
                .ok_or_else(|| ServiceError::validation("totp is required"))?,
            self.mailer
                .ok_or_else(|| ServiceError::validation("mailer is required"))?,
            self.settings
                .ok_or_else(|| ServiceError::validation("settings are required"))?,
        ))
    }
}

impl Default for ServiceContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::config;
    use super::*;
    use crate::services::mailer::LogMailer;

    #[test]
    fn test_builder_requires_every_dependency() {
        let err = ServiceContextBuilder::new()
            .repositories(Repositories::memory())
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "jwt_service is required");
    }

    #[test]
    fn test_builder_builds() {
        let config = config(&[]);
        let ctx = ServiceContextBuilder::new()
            .repositories(Repositories::memory())
            .jwt_service(Arc::new(JwtService::new("k", 60, 120)))
            .signed_tokens(Arc::new(SignedTokenService::new("k", "s")))
            .totp(Arc::new(TotpService::new("SGC")))
            .mailer(Arc::new(LogMailer))
            .settings(AuthSettings::from_config(&config))
            .build()
            .unwrap();
        assert_eq!(ctx.settings().reset_max_age, 1800);
        assert_eq!(ctx.jwt_service().refresh_token_expiry(), 120);
    }

    #[test]
    fn test_dev_reset_only_outside_production() {
        let dev = config(&[("DEV_RESET_TOKEN", "letmein"), ("DEV_ADMIN_EMAIL", " Admin@Admin.com")]);
        let settings = AuthSettings::from_config(&dev);
        let reset = settings.dev_reset.unwrap();
        assert_eq!(reset.email, "admin@admin.com");
        assert!(!format!("{reset:?}").contains("letmein"));

        let prod = config(&[
            ("APP_ENV", "production"),
            ("DEV_RESET_TOKEN", "letmein"),
            ("DEV_ADMIN_EMAIL", "admin@admin.com"),
        ]);
        assert!(AuthSettings::from_config(&prod).dev_reset.is_none());
    }

    #[test]
    fn test_absolute_url_trims_slash() {
        let settings = AuthSettings::from_config(&config(&[("PUBLIC_BASE_URL", "https://sgc.cl/")]));
        assert_eq!(settings.absolute_url("/auth/login"), "https://sgc.cl/auth/login");
    }
}
