//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PORCHLIGHT_URL` - Base URL of the backend (auth at `/auth/v1`, data at `/rest/v1`)
//! - `PORCHLIGHT_ANON_KEY` - Public API key sent with every request
//!
//! ## Optional
//! - `PORCHLIGHT_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `PORCHLIGHT_ADDRESSES_TABLE` - Address table name (default: addresses)
//! - `PORCHLIGHT_ADMIN_TABLE` - Admin authorization table name (default: `admin_users`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use crate::services::addresses::ADDRESSES_TABLE;
use crate::services::identity::ADMIN_TABLE;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "xxx",
    "todo",
    "fixme",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL, always with a trailing slash
    pub base_url: Url,
    /// Public API key (anonymous role)
    pub anon_key: SecretString,
    /// Timeout applied to every backend request
    pub request_timeout: Duration,
    /// Table holding address rows
    pub addresses_table: String,
    /// Table holding admin authorization records
    pub admin_table: String,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the API key looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let base_url = parse_base_url("PORCHLIGHT_URL", &get_required_env("PORCHLIGHT_URL")?)?;
        let anon_key = get_validated_secret("PORCHLIGHT_ANON_KEY")?;
        let request_timeout = parse_timeout(
            "PORCHLIGHT_TIMEOUT_SECS",
            std::env::var("PORCHLIGHT_TIMEOUT_SECS").ok().as_deref(),
        )?;

        Ok(Self {
            base_url,
            anon_key,
            request_timeout,
            addresses_table: get_env_or_default("PORCHLIGHT_ADDRESSES_TABLE", ADDRESSES_TABLE),
            admin_table: get_env_or_default("PORCHLIGHT_ADMIN_TABLE", ADMIN_TABLE),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Build a configuration with defaults for everything but the endpoint.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `base_url` is not an absolute
    /// http(s) URL.
    pub fn new(base_url: &str, anon_key: SecretString) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url("base_url", base_url)?,
            anon_key,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            addresses_table: ADDRESSES_TABLE.to_string(),
            admin_table: ADMIN_TABLE.to_string(),
            sentry_dsn: None,
            sentry_environment: None,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse the backend URL and normalize it to end with `/` so relative joins
/// append instead of replacing the last segment.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut url =
        Url::parse(raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme {}", url.scheme()),
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a request timeout in whole seconds, falling back to
/// `DEFAULT_TIMEOUT_SECS` when unset.
fn parse_timeout(key: &str, raw: Option<&str>) -> Result<Duration, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    };
    let secs = raw
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

/// Get a required secret and reject obvious placeholders.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let secret = SecretString::from(get_required_env(key)?);
    validate_not_placeholder(&secret, key)?;
    Ok(secret)
}

fn validate_not_placeholder(secret: &SecretString, key: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret().to_lowercase();
    if value.trim().is_empty() {
        return Err(ConfigError::InsecureSecret(
            key.to_string(),
            "value is empty".to_string(),
        ));
    }
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| value.contains(**p)) {
        return Err(ConfigError::InsecureSecret(
            key.to_string(),
            format!("looks like a placeholder (contains '{pattern}')"),
        ));
    }
    Ok(())
}
