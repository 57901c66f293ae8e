//! Configuration structs

mod app_config;

pub use app_config::{
    is_truthy, AppConfig, AppSettings, ConfigError, CorsConfig, DatabaseConfig, DevConfig,
    DevOverrides, Environment, JwtConfig, MailConfig, MaintenanceConfig, RateLimitConfig,
    RedisConfig, SecurityConfig, ServerConfig, SignupConfig, SmtpConfig, StorageBackend,
    TokenConfig,
};
