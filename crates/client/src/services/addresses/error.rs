//! Address book error types.

use thiserror::Error;

use crate::error::StoreError;

/// Errors that can occur during address operations.
///
/// Being signed out is not among them; see [`Gated`](crate::session::Gated).
#[derive(Debug, Error)]
pub enum AddressError {
    /// Reading the user's addresses failed.
    #[error("failed to fetch addresses: {0}")]
    Fetch(#[source] StoreError),

    /// Persisting a new address failed; nothing was written.
    #[error("failed to add address: {0}")]
    Insert(#[source] StoreError),

    /// The address was saved but the follow-up refresh failed.
    #[error("address saved but refresh failed: {0}")]
    Refresh(#[source] StoreError),
}

impl AddressError {
    /// Returns `true` if the new address reached the store.
    #[must_use]
    pub const fn was_persisted(&self) -> bool {
        matches!(self, Self::Refresh(_))
    }
}
