//! Identity and credential error types.

use thiserror::Error;

use porchlight_core::EmailError;

use crate::error::{SessionError, StoreError};

/// Errors surfaced by sign-in and sign-out.
///
/// These are the only failures the identity resolver passes to its caller,
/// since a login form has to show them.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The email is not well formed; the provider was not contacted.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Wrong email/password combination.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The session provider failed.
    #[error("session provider error: {0}")]
    Provider(#[source] SessionError),
}

impl From<SessionError> for AuthError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::InvalidCredentials => Self::InvalidCredentials,
            other => Self::Provider(other),
        }
    }
}

/// Why [`require_admin`](super::IdentityResolver::require_admin) refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessDenied {
    /// Nobody is signed in (or the identity could not be resolved).
    #[error("not signed in")]
    SignedOut,

    /// Signed in, but without an active admin grant.
    #[error("admin access required")]
    NotAdmin,
}

/// Internal failures while resolving; always collapsed to "no identity".
#[derive(Debug, Error)]
pub(super) enum ResolveError {
    #[error("session lookup failed: {0}")]
    Session(#[from] SessionError),

    #[error("admin lookup failed: {0}")]
    Lookup(#[from] StoreError),
}
