//! Errors raised by the collaborator backends.
//!
//! Component-level errors (`AddressError`, `AuthError`) live next to their
//! services and wrap these.

use thiserror::Error;

/// Errors that can occur when talking to a [`RecordStore`](crate::store::RecordStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed (connection, TLS, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("store returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// A row could not be (de)serialized.
    #[error("row decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A maybe-one lookup matched more than one row.
    #[error("expected at most one row from {table}, got {count}")]
    MultipleRows {
        /// Table that was queried.
        table: String,
        /// Number of rows returned.
        count: usize,
    },

    /// The query itself is malformed (e.g. an illegal table name).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The store is unreachable or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur when talking to a [`SessionProvider`](crate::session::SessionProvider).
#[derive(Debug, Error)]
pub enum SessionError {
    /// Wrong email/password combination.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// An account with this email already exists.
    #[error("account already exists")]
    AccountExists,

    /// HTTP request failed (connection, TLS, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The auth service answered with an unexpected status.
    #[error("auth service returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// The auth service response could not be parsed.
    #[error("auth response decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Password hashing failed.
    #[error("password hashing error")]
    PasswordHash,

    /// The auth service is unreachable.
    #[error("auth service unavailable: {0}")]
    Unavailable(String),
}
