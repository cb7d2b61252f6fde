//! Wire types for the auth and data APIs.

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use porchlight_core::UserId;

use crate::session::{Session, SessionUser};

#[derive(Debug, Serialize)]
pub(super) struct PasswordGrant<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct RefreshGrant<'a> {
    pub refresh_token: &'a str,
}

/// User object returned by the auth API.
#[derive(Debug, Deserialize)]
pub(super) struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl From<AuthUser> for SessionUser {
    fn from(user: AuthUser) -> Self {
        Self {
            id: UserId::new(user.id),
            email: user.email.filter(|e| !e.is_empty()),
        }
    }
}

/// Token grant response.
#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Absolute expiry as a Unix timestamp; preferred over `expires_in`.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl TokenResponse {
    pub fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .or_else(|| {
                self.expires_in
                    .and_then(TimeDelta::try_seconds)
                    .map(|lifetime| Utc::now() + lifetime)
            });

        Session {
            user: self.user.into(),
            access_token: SecretString::from(self.access_token),
            refresh_token: self.refresh_token.map(SecretString::from),
            expires_at,
        }
    }
}

/// Error body shapes used by the auth and data APIs.
#[derive(Debug, Default, Deserialize)]
pub(super) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

impl ErrorBody {
    /// Best human-readable message, falling back to the raw body.
    pub fn message_or(self, raw: &str) -> String {
        let primary = self
            .error_description
            .or(self.message)
            .or(self.msg)
            .or(self.error);
        match (primary, self.details) {
            (Some(message), Some(details)) => format!("{message} ({details})"),
            (Some(message), None) => message,
            (None, _) if raw.is_empty() => "(empty response body)".to_string(),
            (None, _) => raw.to_string(),
        }
    }
}
