//! Session-scoped address book.
//!
//! [`AddressStore`] lists and inserts the signed-in user's addresses and keeps
//! a local cache of the last listing. Ownership is implicit: the owner is
//! always the session user, both in the query filter and in every written row.
//!
//! [`AddressBook`] wraps the store for presentation, turning results into
//! user notifications.

mod book;
mod error;

pub use book::{ADD_FAILED, ADDED, AddressBook, FETCH_FAILED, LOGIN_FIRST};
pub use error::AddressError;

use tokio::sync::watch;
use tracing::instrument;

use porchlight_core::{Address, NewAddress, UserId};

use crate::error::StoreError;
use crate::session::{Gated, SessionProvider};
use crate::store::{Direction, RecordStore, Row, Select, decode_row};

/// Default name of the address table.
pub const ADDRESSES_TABLE: &str = "addresses";

/// Observable state of an [`AddressStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressSnapshot {
    /// Last fetched addresses, newest first.
    pub addresses: Vec<Address>,
    /// Whether a listing is in flight.
    pub loading: bool,
}

/// Session-gated access to the signed-in user's addresses.
///
/// Overlapping calls are not serialized: whichever listing finishes last
/// replaces the cache. The remote store stays the source of truth.
pub struct AddressStore<S, R> {
    sessions: S,
    records: R,
    table: String,
    state: watch::Sender<AddressSnapshot>,
}

impl<S, R> AddressStore<S, R>
where
    S: SessionProvider,
    R: RecordStore,
{
    /// Create a store over the default address table.
    #[must_use]
    pub fn new(sessions: S, records: R) -> Self {
        Self {
            sessions,
            records,
            table: ADDRESSES_TABLE.to_string(),
            state: watch::Sender::new(AddressSnapshot::default()),
        }
    }

    /// Use a different table name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Current cache and loading flag.
    #[must_use]
    pub fn snapshot(&self) -> AddressSnapshot {
        self.state.borrow().clone()
    }

    /// Subscribe to cache and loading changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AddressSnapshot> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Fetch the signed-in user's addresses, newest first, and replace the
    /// cache with them.
    ///
    /// Signed out: the cache is cleared and the store is not queried.
    /// On a query error the cache is left as it was. `loading` is cleared on
    /// every path, including when this future is dropped early.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::Fetch` if the query fails or returns rows that
    /// cannot be decoded.
    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn list(&self) -> Result<Gated<Vec<Address>>, AddressError> {
        let _loading = LoadingGuard::start(&self.state);

        let Some(owner) = self.session_owner().await else {
            self.state.send_modify(|s| s.addresses.clear());
            return Ok(Gated::SignedOut);
        };

        let query = Select::from(self.table.as_str())
            .eq("user_id", owner.as_str())
            .order("created_at", Direction::Descending);
        let rows = self
            .records
            .select(&query)
            .await
            .map_err(AddressError::Fetch)?;
        let addresses = decode_owned(rows, &owner).map_err(AddressError::Fetch)?;

        tracing::debug!(user_id = %owner, count = addresses.len(), "Fetched addresses");
        self.state.send_modify(|s| s.addresses.clone_from(&addresses));
        Ok(Gated::Authorized(addresses))
    }

    /// Save a new address for the signed-in user, then refresh the cache.
    ///
    /// The row's owner is always the session user. Signed out: nothing is
    /// written and the cache is untouched. The refresh only starts once the
    /// write is confirmed; there is no optimistic append.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::Insert` if the write fails (cache untouched).
    /// Returns `AddressError::Refresh` if the write succeeded but the
    /// follow-up listing failed.
    #[instrument(skip_all, fields(table = %self.table))]
    pub async fn insert(&self, address: NewAddress) -> Result<Gated<Vec<Address>>, AddressError> {
        if self.save(address).await?.is_signed_out() {
            return Ok(Gated::SignedOut);
        }

        match self.list().await {
            Ok(Gated::Authorized(addresses)) => Ok(Gated::Authorized(addresses)),
            // Session ended between the write and the refresh.
            Ok(Gated::SignedOut) => Ok(Gated::Authorized(Vec::new())),
            Err(AddressError::Fetch(e)) => Err(AddressError::Refresh(e)),
            Err(other) => Err(other),
        }
    }

    /// Write a new address for the signed-in user without refreshing.
    ///
    /// Callers that notify between the write and the refresh use this and
    /// then call [`list`](Self::list) themselves.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::Insert` if the write fails.
    pub async fn save(&self, address: NewAddress) -> Result<Gated<()>, AddressError> {
        let Some(owner) = self.session_owner().await else {
            return Ok(Gated::SignedOut);
        };

        self.records
            .insert(&self.table, vec![address.into_row(&owner)])
            .await
            .map_err(AddressError::Insert)?;
        tracing::info!(user_id = %owner, "Address added");
        Ok(Gated::Authorized(()))
    }

    /// The signed-in user's id; a failing session lookup counts as signed out.
    async fn session_owner(&self) -> Option<UserId> {
        match self.sessions.session().await {
            Ok(session) => session.map(|s| s.user.id),
            Err(error) => {
                tracing::warn!(%error, "Session lookup failed; treating as signed out");
                None
            }
        }
    }
}

/// Decode rows, dropping any that belong to someone other than `owner`.
fn decode_owned(rows: Vec<Row>, owner: &UserId) -> Result<Vec<Address>, StoreError> {
    let mut addresses = Vec::with_capacity(rows.len());
    for row in rows {
        let address: Address = decode_row(row)?;
        if &address.user_id == owner {
            addresses.push(address);
        } else {
            tracing::warn!(
                address_id = %address.id,
                "Dropping address owned by another user"
            );
        }
    }
    Ok(addresses)
}

/// Sets `loading` on creation and clears it on drop.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<AddressSnapshot>,
}

impl<'a> LoadingGuard<'a> {
    fn start(state: &'a watch::Sender<AddressSnapshot>) -> Self {
        state.send_modify(|s| s.loading = true);
        Self { state }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|s| s.loading = false);
    }
}
