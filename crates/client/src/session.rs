//! Session provider contract.
//!
//! Both components resolve the current principal through a [`SessionProvider`]
//! injected at construction time, so tests can substitute an in-memory one.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use porchlight_core::{Email, UserId};

use crate::error::SessionError;

/// The authenticated principal of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Identifier of the signed-in user.
    pub id: UserId,
    /// Email on record, if the provider exposes one.
    #[serde(default)]
    pub email: Option<String>,
}

/// An authenticated session.
#[derive(Debug, Clone)]
pub struct Session {
    /// The signed-in user.
    pub user: SessionUser,
    /// Bearer token for row-level access to the record store.
    pub access_token: SecretString,
    /// Token used to renew `access_token`, if the provider issues one.
    pub refresh_token: Option<SecretString>,
    /// When `access_token` stops being accepted.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Check if the access token has expired.
    ///
    /// A 30 second margin avoids using a token that expires in flight.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|at| Utc::now() + chrono::Duration::seconds(30) >= at)
    }
}

/// Outcome of an operation that only runs for a signed-in user.
///
/// Being signed out is a normal control path, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gated<T> {
    /// A session was present and the operation ran.
    Authorized(T),
    /// No authenticated user; nothing was attempted.
    SignedOut,
}

impl<T> Gated<T> {
    /// Convert into an `Option`, treating signed-out as `None`.
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Authorized(value) => Some(value),
            Self::SignedOut => None,
        }
    }

    /// Returns `true` if the operation was skipped for lack of a session.
    #[must_use]
    pub const fn is_signed_out(&self) -> bool {
        matches!(self, Self::SignedOut)
    }
}

/// Source of authentication state.
///
/// `session()` reports the locally held session, while `user()` asks the
/// provider who the token belongs to, so it reflects server-side revocation.
/// Neither treats "nobody signed in" as an error.
pub trait SessionProvider: Send + Sync {
    /// The current session, if any.
    fn session(&self) -> impl Future<Output = Result<Option<Session>, SessionError>> + Send;

    /// The verified principal behind the current session, if any.
    fn user(&self) -> impl Future<Output = Result<Option<SessionUser>, SessionError>> + Send;

    /// Verify credentials and establish a session.
    fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> impl Future<Output = Result<Session, SessionError>> + Send;

    /// Terminate the current session.
    fn sign_out(&self) -> impl Future<Output = Result<(), SessionError>> + Send;
}

impl<T: SessionProvider> SessionProvider for Arc<T> {
    fn session(&self) -> impl Future<Output = Result<Option<Session>, SessionError>> + Send {
        (**self).session()
    }

    fn user(&self) -> impl Future<Output = Result<Option<SessionUser>, SessionError>> + Send {
        (**self).user()
    }

    fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> impl Future<Output = Result<Session, SessionError>> + Send {
        (**self).sign_in_with_password(email, password)
    }

    fn sign_out(&self) -> impl Future<Output = Result<(), SessionError>> + Send {
        (**self).sign_out()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_expiring_at(expires_at: Option<DateTime<Utc>>) -> Session {
        Session {
            user: SessionUser {
                id: UserId::new("u1"),
                email: None,
            },
            access_token: SecretString::from("token"),
            refresh_token: None,
            expires_at,
        }
    }

    #[test]
    fn test_session_expiry() {
        assert!(!session_expiring_at(None).is_expired());
        assert!(
            !session_expiring_at(Some(Utc::now() + chrono::Duration::hours(1))).is_expired()
        );
        assert!(session_expiring_at(Some(Utc::now() + chrono::Duration::seconds(5))).is_expired());
        assert!(session_expiring_at(Some(Utc::now() - chrono::Duration::hours(1))).is_expired());
    }

    #[test]
    fn test_gated_helpers() {
        let gated = Gated::Authorized(6);
        assert_eq!(gated.clone().into_option(), Some(6));
        assert!(!gated.is_signed_out());

        let out: Gated<i32> = Gated::SignedOut;
        assert!(out.is_signed_out());
        assert_eq!(out.into_option(), None);
    }
}
