//! Application configuration

use std::env;

use time::Duration;

use crate::auth::TokenSettings;

/// Minimum length for token signing secrets
const MIN_SECRET_LEN: usize = 32;

/// Longest accepted token lifetime
const MAX_TOKEN_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    pub cors_origin: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Authentication
    pub access_token_secret: String,
    pub access_token_expiry: Duration,
    pub refresh_token_secret: String,
    pub refresh_token_expiry: Duration,
    pub cookie_secure: bool,

    // Logging
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let access_token_secret = required_secret("ACCESS_TOKEN_SECRET")?;
        let refresh_token_secret = required_secret("REFRESH_TOKEN_SECRET")?;

        if access_token_secret == refresh_token_secret {
            return Err(ConfigError::SharedSecret);
        }

        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            cors_origin: env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),

            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),

            // Authentication
            access_token_secret,
            access_token_expiry: duration_var("ACCESS_TOKEN_EXPIRY", "1h")?,
            refresh_token_secret,
            refresh_token_expiry: duration_var("REFRESH_TOKEN_EXPIRY", "10d")?,
            cookie_secure: env::var("COOKIE_SECURE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),

            // Logging
            log_format: match env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        })
    }

    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            access_secret: self.access_token_secret.clone(),
            access_ttl: self.access_token_expiry,
            refresh_secret: self.refresh_token_secret.clone(),
            refresh_ttl: self.refresh_token_expiry,
        }
    }
}

fn required_secret(name: &'static str) -> Result<String, ConfigError> {
    let secret = env::var(name).map_err(|_| ConfigError::Missing(name))?;
    if secret.len() < MIN_SECRET_LEN {
        return Err(ConfigError::WeakSecret(name));
    }
    Ok(secret)
}

fn duration_var(name: &'static str, default: &str) -> Result<Duration, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_duration(&raw).ok_or(ConfigError::InvalidDuration { var: name, value: raw })
}

/// Parse `90`, `90s`, `15m`, `1h` or `10d`. Zero, negative and values above
/// one year are rejected.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().last()? {
        (idx, c) if c.is_ascii_alphabetic() => (&raw[..idx], c),
        _ => (raw, 's'),
    };

    let value: i64 = digits.parse().ok().filter(|v| *v > 0)?;
    let unit_seconds: i64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return None,
    };

    value
        .checked_mul(unit_seconds)
        .filter(|seconds| *seconds <= MAX_TOKEN_TTL_SECONDS)
        .map(Duration::seconds)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Weak secret: {0} must be at least 32 characters")]
    WeakSecret(&'static str),
    #[error("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ")]
    SharedSecret,
    #[error("Invalid duration for {var}: {value:?}")]
    InvalidDuration { var: &'static str, value: String },
}
