//! Presentation adapter for the address store.
//!
//! Turns [`AddressStore`] results into user notifications and plain return
//! values, so UI code never has to handle an error from the address book.

use tokio::sync::watch;

use porchlight_core::{Address, NewAddress};

use super::{AddressSnapshot, AddressStore};
use crate::notify::Notifier;
use crate::session::{Gated, SessionProvider};
use crate::store::RecordStore;

/// Shown when listing fails.
pub const FETCH_FAILED: &str = "Failed to fetch addresses";
/// Shown when saving fails.
pub const ADD_FAILED: &str = "Failed to add address";
/// Shown when saving is attempted while signed out.
pub const LOGIN_FIRST: &str = "Please login first";
/// Shown when an address was saved.
pub const ADDED: &str = "Address added successfully";

/// Fault-contained address book: every failure becomes a notification.
pub struct AddressBook<S, R, N> {
    store: AddressStore<S, R>,
    notifier: N,
}

impl<S, R, N> AddressBook<S, R, N>
where
    S: SessionProvider,
    R: RecordStore,
    N: Notifier,
{
    #[must_use]
    pub const fn new(store: AddressStore<S, R>, notifier: N) -> Self {
        Self { store, notifier }
    }

    /// The wrapped store, for callers that want typed results.
    #[must_use]
    pub const fn store(&self) -> &AddressStore<S, R> {
        &self.store
    }

    #[must_use]
    pub fn snapshot(&self) -> AddressSnapshot {
        self.store.snapshot()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AddressSnapshot> {
        self.store.subscribe()
    }

    /// The signed-in user's addresses, newest first.
    ///
    /// Empty when signed out (silently) or when the fetch fails (with an
    /// error notification).
    pub async fn list(&self) -> Vec<Address> {
        match self.store.list().await {
            Ok(Gated::Authorized(addresses)) => addresses,
            Ok(Gated::SignedOut) => Vec::new(),
            Err(error) => {
                tracing::error!(%error, "Error fetching addresses");
                self.notifier.error(FETCH_FAILED);
                Vec::new()
            }
        }
    }

    /// Save an address for the signed-in user.
    ///
    /// The success notification is shown as soon as the write is confirmed;
    /// the refresh runs afterwards and reports its own failure. Returns
    /// `true` if the address reached the store.
    pub async fn add(&self, address: NewAddress) -> bool {
        match self.store.save(address).await {
            Ok(Gated::Authorized(())) => {
                self.notifier.success(ADDED);
                self.list().await;
                true
            }
            Ok(Gated::SignedOut) => {
                self.notifier.error(LOGIN_FIRST);
                false
            }
            Err(error) => {
                tracing::error!(%error, "Error adding address");
                self.notifier.error(ADD_FAILED);
                false
            }
        }
    }
}
