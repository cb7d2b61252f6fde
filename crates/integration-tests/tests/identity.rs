//! Identity resolution over the in-memory backends.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use secrecy::SecretString;
use serde_json::{Value, json};

use porchlight_client::{
    AccessDenied, AuthError, IdentityResolver, MemorySessions, MemoryStore, RecordStore, Row,
};
use porchlight_core::{Email, UserId};

type Resolver = IdentityResolver<Arc<MemorySessions>, Arc<MemoryStore>>;

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

async fn resolver_with_account(
    id: &str,
    email: &str,
) -> (Resolver, Arc<MemoryStore>, SecretString) {
    let sessions = Arc::new(MemorySessions::new());
    let password = SecretString::from("hunter2hunter2");
    sessions
        .register_as(UserId::new(id), &Email::parse(email).unwrap(), &password)
        .await
        .unwrap();
    let records = Arc::new(MemoryStore::new());
    (
        IdentityResolver::new(sessions, records.clone()),
        records,
        password,
    )
}

#[tokio::test]
async fn test_inactive_editor_resolves_without_admin() {
    let (resolver, records, password) = resolver_with_account("u2", "b@x.com").await;
    records
        .insert(
            "admin_users",
            vec![row(json!({"user_id": "u2", "active": false, "role": "editor"}))],
        )
        .await
        .unwrap();

    resolver.sign_in("b@x.com", &password).await.unwrap();
    let identity = resolver.resolve().await.unwrap();

    assert_eq!(
        serde_json::to_value(&identity).unwrap(),
        json!({
            "id": "u2",
            "email": "b@x.com",
            "isAdmin": false,
            "adminRole": "editor",
            "adminPermissions": [],
        })
    );
    assert_eq!(resolver.require_admin().await, Err(AccessDenied::NotAdmin));
}

#[tokio::test]
async fn test_active_admin_with_permissions() {
    let (resolver, records, password) = resolver_with_account("u3", "ops@x.com").await;
    records
        .insert(
            "admin_users",
            vec![row(json!({
                "user_id": "u3",
                "active": true,
                "role": "owner",
                "permissions": ["addresses:read", "users:write"],
            }))],
        )
        .await
        .unwrap();

    resolver.sign_in("ops@x.com", &password).await.unwrap();
    let identity = resolver.require_admin().await.unwrap();

    assert!(identity.is_admin);
    assert!(identity.has_permission("users:write"));
    assert!(!identity.has_permission("billing:read"));
}

#[tokio::test]
async fn test_signed_out_resolves_to_nothing() {
    let (resolver, records, password) = resolver_with_account("u1", "a@x.com").await;

    assert_eq!(resolver.resolve().await, None);
    assert_eq!(resolver.require_admin().await, Err(AccessDenied::SignedOut));

    resolver.sign_in("a@x.com", &password).await.unwrap();
    assert!(resolver.resolve().await.is_some());

    resolver.sign_out().await.unwrap();
    assert_eq!(resolver.resolve().await, None);
    assert_eq!(records.select_count(), 1);
}

#[tokio::test]
async fn test_bad_credentials_are_reported() {
    let (resolver, _, _) = resolver_with_account("u1", "a@x.com").await;

    assert!(matches!(
        resolver
            .sign_in("a@x.com", &SecretString::from("wrong"))
            .await,
        Err(AuthError::InvalidCredentials)
    ));
    assert!(matches!(
        resolver.sign_in("a@", &SecretString::from("wrong")).await,
        Err(AuthError::InvalidEmail(_))
    ));
    assert_eq!(resolver.resolve().await, None);
}
