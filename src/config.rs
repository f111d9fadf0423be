/// Configuration loaded from the environment at startup
use crate::error::{ApiError, ApiResult, ErrorCode};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

pub const ISO_SHORT_DATE_FORMAT: &str = "%Y-%m-%d";
pub const DEFAULT_TIMEZONE: &str = "America/New_York";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub email: Option<EmailConfig>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Base URL of the web client, used when building reset/invite links
    pub application_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Session and lockout policy knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Random bytes per session token, before base64 encoding
    pub token_length: usize,
    pub token_expiration_minutes: i64,
    pub forgot_password_token_length: usize,
    pub forgot_password_expiration_minutes: i64,
    pub add_user_token_expiration_minutes: i64,
    pub clear_forgot_password_on_validate: bool,
    pub max_failed_login_attempts: i64,
    pub login_failure_window_minutes: i64,
    pub profile_lock_duration_minutes: i64,
    pub cookie_name: String,
    pub cookie_domain: String,
    pub secure_cookie: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 8010,
                application_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                path: PathBuf::from("./data/tempo.sqlite"),
                max_connections: 10,
            },
            session: SessionConfig {
                token_length: 48,
                token_expiration_minutes: 60 * 24 * 30,
                forgot_password_token_length: 64,
                forgot_password_expiration_minutes: 30,
                add_user_token_expiration_minutes: 60 * 24 * 7,
                clear_forgot_password_on_validate: true,
                max_failed_login_attempts: 5,
                login_failure_window_minutes: 30,
                profile_lock_duration_minutes: 5,
                cookie_name: "tempo_session".to_string(),
                cookie_domain: String::new(),
                secure_cookie: false,
            },
            email: None,
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults above for anything unset.
    pub fn from_env() -> ApiResult<Self> {
        dotenv::dotenv().ok();

        let mut config = ServerConfig::default();

        if let Ok(hostname) = env::var("TEMPO_HOSTNAME") {
            config.service.hostname = hostname;
        }
        if let Ok(port) = env::var("TEMPO_PORT") {
            config.service.port = port.parse().map_err(|_| {
                ApiError::new(ErrorCode::InvalidField, "Invalid TEMPO_PORT value")
            })?;
        }
        if let Ok(url) = env::var("TEMPO_APPLICATION_URL") {
            config.service.application_url = url;
        }

        if let Ok(path) = env::var("TEMPO_DB_PATH") {
            config.database.path = PathBuf::from(path);
        }
        if let Ok(max) = env::var("TEMPO_DB_MAX_CONNECTIONS") {
            config.database.max_connections = max.parse().unwrap_or(10);
        }

        let session = &mut config.session;
        if let Ok(value) = env::var("TEMPO_SESSION_TOKEN_LENGTH") {
            session.token_length = value.parse().unwrap_or(session.token_length);
        }
        if let Ok(value) = env::var("TEMPO_SESSION_EXPIRATION_MINUTES") {
            session.token_expiration_minutes =
                value.parse().unwrap_or(session.token_expiration_minutes);
        }
        if let Ok(value) = env::var("TEMPO_FORGOT_TOKEN_LENGTH") {
            session.forgot_password_token_length =
                value.parse().unwrap_or(session.forgot_password_token_length);
        }
        if let Ok(value) = env::var("TEMPO_FORGOT_EXPIRATION_MINUTES") {
            session.forgot_password_expiration_minutes = value
                .parse()
                .unwrap_or(session.forgot_password_expiration_minutes);
        }
        if let Ok(value) = env::var("TEMPO_ADD_USER_EXPIRATION_MINUTES") {
            session.add_user_token_expiration_minutes = value
                .parse()
                .unwrap_or(session.add_user_token_expiration_minutes);
        }
        if let Ok(value) = env::var("TEMPO_CLEAR_FORGOT_ON_VALIDATE") {
            session.clear_forgot_password_on_validate =
                value.parse().unwrap_or(session.clear_forgot_password_on_validate);
        }
        if let Ok(value) = env::var("TEMPO_MAX_FAILED_LOGIN_ATTEMPTS") {
            session.max_failed_login_attempts =
                value.parse().unwrap_or(session.max_failed_login_attempts);
        }
        if let Ok(value) = env::var("TEMPO_LOGIN_FAILURE_WINDOW_MINUTES") {
            session.login_failure_window_minutes =
                value.parse().unwrap_or(session.login_failure_window_minutes);
        }
        if let Ok(value) = env::var("TEMPO_PROFILE_LOCK_DURATION_MINUTES") {
            session.profile_lock_duration_minutes =
                value.parse().unwrap_or(session.profile_lock_duration_minutes);
        }
        if let Ok(value) = env::var("TEMPO_COOKIE_NAME") {
            session.cookie_name = value;
        }
        if let Ok(value) = env::var("TEMPO_COOKIE_DOMAIN") {
            session.cookie_domain = value;
        }
        if let Ok(value) = env::var("TEMPO_SECURE_COOKIE") {
            session.secure_cookie = value.parse().unwrap_or(session.secure_cookie);
        }

        if let Ok(smtp_url) = env::var("TEMPO_EMAIL_SMTP_URL") {
            config.email = Some(EmailConfig {
                smtp_url,
                from_address: env::var("TEMPO_EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("noreply@{}", config.service.hostname)),
            });
        }

        if let Ok(level) = env::var("RUST_LOG") {
            config.logging.level = level;
        }

        Ok(config)
    }

    pub fn validate(&self) -> ApiResult<()> {
        if self.service.hostname.is_empty() {
            return Err(ApiError::new(
                ErrorCode::MissingField,
                "Hostname cannot be empty",
            ));
        }

        if self.session.token_length < 32 {
            return Err(ApiError::new(
                ErrorCode::InvalidField,
                "Session token length must be at least 32 bytes",
            ));
        }

        if self.session.max_failed_login_attempts <= 0 {
            return Err(ApiError::new(
                ErrorCode::InvalidField,
                "Max failed login attempts must be positive",
            ));
        }

        if self.session.token_expiration_minutes <= 0 {
            return Err(ApiError::new(
                ErrorCode::InvalidField,
                "Session expiration must be positive",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ServerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.session.max_failed_login_attempts, 5);
        assert!(config.session.clear_forgot_password_on_validate);
    }

    #[test]
    fn rejects_short_tokens() {
        let mut config = ServerConfig::default();
        config.session.token_length = 8;
        assert!(config.validate().is_err());
    }
}
