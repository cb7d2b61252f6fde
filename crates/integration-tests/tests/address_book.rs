//! Address store and notification adapter over the in-memory backends.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use serde_json::json;

use porchlight_client::services::addresses::{ADDED, FETCH_FAILED, LOGIN_FIRST};
use porchlight_client::{
    AddressBook, AddressError, AddressStore, Gated, MemorySessions, MemoryStore, SessionUser,
};
use porchlight_core::{NewAddress, UserId};
use porchlight_integration_tests::{Notification, RecordingNotifier, birch_lane, elm_street};

type Store = AddressStore<Arc<MemorySessions>, Arc<MemoryStore>>;

struct Harness {
    sessions: Arc<MemorySessions>,
    records: Arc<MemoryStore>,
    store: Store,
}

fn harness() -> Harness {
    let sessions = Arc::new(MemorySessions::new());
    let records = Arc::new(MemoryStore::new());
    let store = AddressStore::new(sessions.clone(), records.clone());
    Harness {
        sessions,
        records,
        store,
    }
}

async fn act_as(sessions: &MemorySessions, id: &str) {
    sessions
        .impersonate(SessionUser {
            id: UserId::new(id),
            email: Some(format!("{id}@example.com")),
        })
        .await;
}

// =============================================================================
// Ownership
// =============================================================================

#[tokio::test]
async fn test_insert_stamps_session_owner() {
    let h = harness();
    act_as(&h.sessions, "u1").await;

    let Gated::Authorized(addresses) = h.store.insert(elm_street()).await.unwrap() else {
        panic!("expected a signed-in insert");
    };

    assert_eq!(addresses.len(), 1);
    let address = &addresses[0];
    assert_eq!(address.user_id.as_str(), "u1");
    assert_eq!(address.street, "Elm");
    assert_eq!(
        address.one_line(),
        "12 Elm, Midtown, Springfield, IL 62704 (tel. 555-0100)"
    );

    let rows = h.records.rows("addresses").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["user_id"], "u1");
    assert!(rows[0].contains_key("created_at"));
    assert_eq!(h.store.snapshot().addresses, addresses);
}

#[tokio::test]
async fn test_supplied_owner_is_ignored() {
    let h = harness();
    act_as(&h.sessions, "u1").await;
    let forged: NewAddress = serde_json::from_value(json!({
        "user_id": "u9",
        "house_number": "12",
        "street": "Elm",
        "area": "Midtown",
        "city": "Springfield",
        "state": "IL",
        "pin_code": "62704",
        "mobile": "555-0100",
    }))
    .unwrap();

    h.store.insert(forged).await.unwrap();

    assert_eq!(h.records.rows("addresses").await[0]["user_id"], "u1");
    act_as(&h.sessions, "u9").await;
    assert_eq!(h.store.list().await.unwrap(), Gated::Authorized(vec![]));
}

#[tokio::test]
async fn test_users_only_see_their_own_addresses() {
    let h = harness();
    act_as(&h.sessions, "u1").await;
    h.store.insert(elm_street()).await.unwrap();

    act_as(&h.sessions, "u2").await;
    assert_eq!(h.store.list().await.unwrap(), Gated::Authorized(vec![]));

    h.store.insert(birch_lane()).await.unwrap();
    let addresses = h.store.list().await.unwrap().into_option().unwrap();
    assert_eq!(addresses.len(), 1);
    assert_eq!(addresses[0].user_id.as_str(), "u2");
    assert_eq!(h.records.rows("addresses").await.len(), 2);
}

#[tokio::test]
async fn test_listing_is_newest_first() {
    let h = harness();
    act_as(&h.sessions, "u1").await;
    h.store.insert(elm_street()).await.unwrap();
    h.store.insert(birch_lane()).await.unwrap();

    let addresses = h.store.list().await.unwrap().into_option().unwrap();
    let streets: Vec<_> = addresses.iter().map(|a| a.street.as_str()).collect();
    assert_eq!(streets, ["Birch Lane", "Elm"]);
    assert!(addresses[0].created_at > addresses[1].created_at);
}

// =============================================================================
// Signed Out
// =============================================================================

#[tokio::test]
async fn test_signed_out_touches_nothing() {
    let h = harness();

    assert!(h.store.list().await.unwrap().is_signed_out());
    assert!(h.store.insert(elm_street()).await.unwrap().is_signed_out());

    assert_eq!(h.records.select_count(), 0);
    assert_eq!(h.records.insert_count(), 0);
    assert!(h.store.snapshot().addresses.is_empty());
    assert!(!h.store.is_loading());
}

#[tokio::test]
async fn test_session_outage_counts_as_signed_out() {
    let h = harness();
    act_as(&h.sessions, "u1").await;
    h.sessions.set_outage(Some("auth down")).await;

    assert!(h.store.insert(elm_street()).await.unwrap().is_signed_out());
    assert_eq!(h.records.insert_count(), 0);
}

// =============================================================================
// Loading And Failures
// =============================================================================

#[tokio::test]
async fn test_subscribers_see_final_state() {
    let h = harness();
    act_as(&h.sessions, "u1").await;
    let mut rx = h.store.subscribe();

    h.store.insert(elm_street()).await.unwrap();

    assert!(rx.has_changed().unwrap());
    let snapshot = rx.borrow_and_update().clone();
    assert_eq!(snapshot.addresses.len(), 1);
    assert!(!snapshot.loading);
}

#[tokio::test]
async fn test_failed_fetch_keeps_cache_and_clears_loading() {
    let h = harness();
    act_as(&h.sessions, "u1").await;
    h.store.insert(elm_street()).await.unwrap();

    h.records.set_outage(Some("timeout")).await;
    let error = h.store.list().await.unwrap_err();

    assert!(matches!(error, AddressError::Fetch(_)));
    assert!(!error.was_persisted());
    assert_eq!(h.store.snapshot().addresses.len(), 1);
    assert!(!h.store.is_loading());
}

#[tokio::test]
async fn test_failed_insert_leaves_cache_alone() {
    let h = harness();
    act_as(&h.sessions, "u1").await;
    h.records.set_outage(Some("timeout")).await;

    let error = h.store.insert(elm_street()).await.unwrap_err();

    assert!(matches!(error, AddressError::Insert(_)));
    assert!(h.store.snapshot().addresses.is_empty());
    assert!(!h.store.is_loading());
}

// =============================================================================
// Address Book
// =============================================================================

#[tokio::test]
async fn test_address_book_notifications() {
    let h = harness();
    let notifier = Arc::new(RecordingNotifier::default());
    let book = AddressBook::new(h.store, notifier.clone());

    assert!(!book.add(elm_street()).await);
    assert_eq!(
        notifier.take(),
        vec![Notification::Error(LOGIN_FIRST.into())]
    );

    act_as(&h.sessions, "u1").await;
    assert!(book.add(elm_street()).await);
    assert_eq!(notifier.take(), vec![Notification::Success(ADDED.into())]);
    assert_eq!(book.list().await.len(), 1);

    h.records.set_outage(Some("offline")).await;
    assert!(book.list().await.is_empty());
    assert_eq!(
        notifier.take(),
        vec![Notification::Error(FETCH_FAILED.into())]
    );
    assert_eq!(book.snapshot().addresses.len(), 1);
}
