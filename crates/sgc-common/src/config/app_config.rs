//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file when
//! present). Every value has a development default except the database URL.

use std::env;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use sgc_core::{DomainAllowlist, SignupMode, SignupPolicy};

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub api: ServerConfig,
    pub security: SecurityConfig,
    pub dev: DevConfig,
    pub database: DatabaseConfig,
    pub redis: Option<RedisConfig>,
    pub jwt: JwtConfig,
    pub tokens: TokenConfig,
    pub signup: SignupConfig,
    pub mail: MailConfig,
    pub rate_limit: RateLimitConfig,
    pub cors: CorsConfig,
    pub maintenance: MaintenanceConfig,
}

/// General application settings
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" | "dev" => Ok(Self::Development),
            other => Err(ConfigError::InvalidValue("APP_ENV", other.to_string())),
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Reverse proxies whose `X-Forwarded-For` is believed; empty trusts none
    pub trusted_proxies: Vec<IpAddr>,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Feature flags that switch the authorization gate off in development
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DevOverrides {
    pub security_disabled: bool,
    pub login_disabled: bool,
    pub auth_disabled: bool,
}

impl DevOverrides {
    /// Any override flag set
    #[must_use]
    pub fn any(&self) -> bool {
        self.security_disabled || self.login_disabled || self.auth_disabled
    }
}

/// Secrets and authentication switches
#[derive(Clone)]
pub struct SecurityConfig {
    pub secret_key: String,
    pub password_salt: String,
    /// `true` when `SECRET_KEY` was absent and the development fallback is in use
    pub uses_fallback_secret: bool,
    pub session_cookie_secure: bool,
    pub enable_2fa: bool,
    pub totp_issuer: String,
    pub overrides: DevOverrides,
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("uses_fallback_secret", &self.uses_fallback_secret)
            .field("session_cookie_secure", &self.session_cookie_secure)
            .field("enable_2fa", &self.enable_2fa)
            .field("totp_issuer", &self.totp_issuer)
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}

/// Development conveniences, ignored in production
#[derive(Clone, Default)]
pub struct DevConfig {
    pub reset_token: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl fmt::Debug for DevConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevConfig")
            .field("reset_token", &self.reset_token.as_ref().map(|_| "<set>"))
            .field("admin_email", &self.admin_email)
            .finish_non_exhaustive()
    }
}

/// Which repository implementation backs the services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidValue("STORAGE_BACKEND", other.to_string())),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub migrations_dir: String,
}

/// Redis configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub max_connections: u32,
}

/// JWT lifetimes in seconds
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub access_token_expiry: i64,
    pub refresh_token_expiry: i64,
}

/// Signed-token max ages in seconds
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub reset_max_age: i64,
    pub invite_max_age: i64,
}

/// Signup admission
#[derive(Debug, Clone)]
pub struct SignupConfig {
    pub mode: SignupMode,
    pub allowlist: DomainAllowlist,
}

impl SignupConfig {
    #[must_use]
    pub fn policy(&self) -> SignupPolicy {
        SignupPolicy::new(self.mode, self.allowlist.clone())
    }
}

/// Outgoing mail
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub public_base_url: String,
    pub smtp: Option<SmtpConfig>,
}

/// SMTP relay settings
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

/// Per-route quotas, as `"<n> per <unit>"` rules
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login: String,
    pub refresh: String,
    pub forgot: String,
    pub register: String,
    pub authenticated: String,
}

/// CORS configuration
#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

/// Background refresh-token cleanup
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    pub cleanup_interval_secs: u64,
    pub grace_days: i64,
}

// Default value functions
fn default_app_name() -> String {
    "sgc".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_secret_key() -> String {
    "dev-only-secret-key-do-not-use-in-production".to_string()
}

fn default_password_salt() -> String {
    "dev-only-password-salt".to_string()
}

fn default_totp_issuer() -> String {
    "SGC".to_string()
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    2
}

fn default_migrations_dir() -> String {
    "./crates/sgc-db/migrations".to_string()
}

fn default_redis_max_connections() -> u32 {
    10
}

fn default_access_token_expiry() -> i64 {
    900 // 15 minutes
}

fn default_refresh_token_expiry() -> i64 {
    604_800 // 7 days
}

fn default_reset_max_age() -> i64 {
    1800
}

fn default_invite_max_age() -> i64 {
    604_800
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_cleanup_interval() -> u64 {
    3600
}

fn default_grace_days() -> i64 {
    7
}

/// `1`, `true`, `yes` and `on` (any case) are truthy
#[must_use]
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Variable lookup with blank values treated as unset
struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn string(&self, key: &str, default: impl FnOnce() -> String) -> String {
        self.get(key).unwrap_or_else(default)
    }

    fn parse<T: FromStr>(
        &self,
        key: &'static str,
        default: impl FnOnce() -> T,
    ) -> Result<T, ConfigError> {
        match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key, raw)),
            None => Ok(default()),
        }
    }

    fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).map(|v| is_truthy(&v))
    }

    /// Comma-separated list; any unparsable entry fails the whole variable
    fn list<T: FromStr>(&self, key: &'static str) -> Result<Vec<T>, ConfigError> {
        let Some(raw) = self.get(key) else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| {
                item.parse()
                    .map_err(|_| ConfigError::InvalidValue(key, item.to_string()))
            })
            .collect()
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable holds a value that cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    ///
    /// # Errors
    /// Returns an error if a variable holds a value that cannot be parsed
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let env: Environment = vars.parse("APP_ENV", Environment::default)?;

        let secret_key = vars.get("SECRET_KEY");
        let uses_fallback_secret = secret_key.is_none();

        let signup_mode = SignupMode::resolve(
            vars.get("SIGNUP_MODE").as_deref(),
            vars.flag("ALLOW_SELF_SIGNUP").unwrap_or(false),
        )
        .map_err(|e| ConfigError::InvalidValue("SIGNUP_MODE", e.to_string()))?;

        let smtp = match vars.get("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                port: vars.parse("SMTP_PORT", default_smtp_port)?,
                username: vars.get("SMTP_USERNAME"),
                password: vars.get("SMTP_PASSWORD"),
                from: vars.string("SMTP_FROM", || format!("no-reply@{host}")),
                host,
            }),
            None => None,
        };

        Ok(Self {
            app: AppSettings {
                name: vars.string("APP_NAME", default_app_name),
                env,
            },
            api: ServerConfig {
                host: vars.string("API_HOST", default_host),
                port: vars.parse("API_PORT", default_port)?,
                trusted_proxies: vars.list("TRUSTED_PROXIES")?,
            },
            security: SecurityConfig {
                secret_key: secret_key.unwrap_or_else(default_secret_key),
                password_salt: vars.string("SECURITY_PASSWORD_SALT", default_password_salt),
                uses_fallback_secret,
                session_cookie_secure: vars
                    .flag("SESSION_COOKIE_SECURE")
                    .unwrap_or(env.is_production()),
                enable_2fa: vars.flag("ENABLE_2FA").unwrap_or(true),
                totp_issuer: vars.string("TOTP_ISSUER", default_totp_issuer),
                overrides: DevOverrides {
                    security_disabled: vars.flag("SECURITY_DISABLED").unwrap_or(false)
                        || vars.flag("DISABLE_SECURITY").unwrap_or(false),
                    login_disabled: vars.flag("LOGIN_DISABLED").unwrap_or(false),
                    auth_disabled: vars.flag("AUTH_DISABLED").unwrap_or(false),
                },
            },
            dev: DevConfig {
                reset_token: vars.get("DEV_RESET_TOKEN"),
                admin_email: vars.get("DEV_ADMIN_EMAIL"),
                admin_password: vars.get("DEV_ADMIN_PASS"),
            },
            database: DatabaseConfig {
                backend: vars.parse("STORAGE_BACKEND", StorageBackend::default)?,
                url: vars.get("DATABASE_URL"),
                max_connections: vars.parse("DATABASE_MAX_CONNECTIONS", default_max_connections)?,
                min_connections: vars.parse("DATABASE_MIN_CONNECTIONS", default_min_connections)?,
                migrations_dir: vars.string("MIGRATIONS_DIR", default_migrations_dir),
            },
            redis: match vars.get("REDIS_URL") {
                Some(url) => Some(RedisConfig {
                    url,
                    max_connections: vars
                        .parse("REDIS_MAX_CONNECTIONS", default_redis_max_connections)?,
                }),
                None => None,
            },
            jwt: JwtConfig {
                access_token_expiry: vars
                    .parse("JWT_ACCESS_TOKEN_EXPIRY", default_access_token_expiry)?,
                refresh_token_expiry: vars
                    .parse("JWT_REFRESH_TOKEN_EXPIRY", default_refresh_token_expiry)?,
            },
            tokens: TokenConfig {
                reset_max_age: vars.parse("RESET_TOKEN_MAX_AGE", default_reset_max_age)?,
                invite_max_age: vars.parse("INVITE_TOKEN_MAX_AGE", default_invite_max_age)?,
            },
            signup: SignupConfig {
                mode: signup_mode,
                allowlist: DomainAllowlist::parse(&vars.get("ALLOWLIST_DOMAINS").unwrap_or_default()),
            },
            mail: MailConfig {
                public_base_url: vars.string("PUBLIC_BASE_URL", default_public_base_url),
                smtp,
            },
            rate_limit: RateLimitConfig {
                login: vars.string("RATE_LIMIT_LOGIN", || "10 per minute".into()),
                refresh: vars.string("RATE_LIMIT_REFRESH", || "30 per minute".into()),
                forgot: vars.string("RATE_LIMIT_FORGOT", || "5 per hour".into()),
                register: vars.string("RATE_LIMIT_REGISTER", || "10 per hour".into()),
                authenticated: vars.string("RATE_LIMIT_AUTHENTICATED", || "120 per minute".into()),
            },
            cors: CorsConfig {
                allowed_origins: vars
                    .get("CORS_ALLOWED_ORIGINS")
                    .map(|s| {
                        s.split(',')
                            .map(str::trim)
                            .filter(|o| !o.is_empty())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            maintenance: MaintenanceConfig {
                cleanup_interval_secs: vars
                    .parse("REFRESH_CLEANUP_INTERVAL_SECS", default_cleanup_interval)?,
                grace_days: vars.parse("REFRESH_CLEANUP_GRACE_DAYS", default_grace_days)?,
            },
        })
    }

    /// Reject combinations that must never run in production.
    ///
    /// # Errors
    /// Returns `ConfigError` naming the first offending setting
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.backend == StorageBackend::Postgres && self.database.url.is_none() {
            return Err(ConfigError::MissingVar("DATABASE_URL"));
        }

        if !self.app.env.is_production() {
            return Ok(());
        }

        if self.security.overrides.any() {
            return Err(ConfigError::Insecure(
                "security overrides (DISABLE_SECURITY/LOGIN_DISABLED/AUTH_DISABLED) are not allowed in production".into(),
            ));
        }
        if self.security.uses_fallback_secret {
            return Err(ConfigError::MissingVar("SECRET_KEY"));
        }
        if self.security.secret_key.len() < 32 {
            return Err(ConfigError::InvalidValue(
                "SECRET_KEY",
                "must be at least 32 bytes".into(),
            ));
        }
        if self.security.password_salt == default_password_salt() {
            return Err(ConfigError::MissingVar("SECURITY_PASSWORD_SALT"));
        }
        if self.database.backend == StorageBackend::Memory {
            return Err(ConfigError::Insecure(
                "STORAGE_BACKEND=memory is not allowed in production".into(),
            ));
        }
        if self.dev.reset_token.is_some() {
            return Err(ConfigError::Insecure(
                "DEV_RESET_TOKEN is not allowed in production".into(),
            ));
        }
        Ok(())
    }

    /// Security overrides in force (always off in production)
    #[must_use]
    pub fn overrides_active(&self) -> bool {
        !self.app.env.is_production() && self.security.overrides.any()
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),

    #[error("Insecure configuration: {0}")]
    Insecure(String),
}
