//! In-process backends.
//!
//! [`MemoryStore`] and [`MemorySessions`] implement the collaborator traits
//! without any network, for tests, demos and offline use. Both can simulate
//! an outage so failure paths can be exercised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use porchlight_core::{Email, UserId};

use crate::error::{SessionError, StoreError};
use crate::session::{Session, SessionProvider, SessionUser};
use crate::store::{Direction, RecordStore, Row, Select, at_most_one};

// =============================================================================
// Record Store
// =============================================================================

#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<String, Vec<Row>>,
    last_created_at: Option<DateTime<Utc>>,
}

impl Tables {
    /// Strictly increasing creation timestamps, so newest-first ordering is
    /// total even for inserts within the same clock tick.
    fn next_created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_created_at {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        };
        self.last_created_at = Some(next);
        next
    }
}

/// In-memory [`RecordStore`].
///
/// Inserted rows get a UUID `id` and a `created_at` timestamp unless they
/// already carry one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    outage: RwLock<Option<String>>,
    selects: AtomicUsize,
    inserts: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with `StoreError::Unavailable`
    /// (`Some(reason)`) or succeed again (`None`).
    pub async fn set_outage(&self, reason: Option<&str>) {
        *self.outage.write().await = reason.map(str::to_owned);
    }

    /// All rows currently stored in `table`, in insertion order.
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .await
            .rows
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of select operations attempted so far.
    #[must_use]
    pub fn select_count(&self) -> usize {
        self.selects.load(AtomicOrdering::Relaxed)
    }

    /// Number of insert operations attempted so far.
    #[must_use]
    pub fn insert_count(&self) -> usize {
        self.inserts.load(AtomicOrdering::Relaxed)
    }

    async fn check_outage(&self) -> Result<(), StoreError> {
        match self.outage.read().await.as_ref() {
            Some(reason) => Err(StoreError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    async fn run_select(&self, query: &Select) -> Result<Vec<Row>, StoreError> {
        self.selects.fetch_add(1, AtomicOrdering::Relaxed);
        self.check_outage().await?;

        let tables = self.tables.lock().await;
        let mut rows: Vec<Row> = tables
            .rows
            .get(query.table())
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();
        drop(tables);

        if let Some(order) = query.ordering() {
            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(&order.column), b.get(&order.column));
                match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }

        Ok(rows)
    }
}

impl RecordStore for MemoryStore {
    async fn select(&self, query: &Select) -> Result<Vec<Row>, StoreError> {
        self.run_select(query).await
    }

    async fn select_one(&self, query: &Select) -> Result<Option<Row>, StoreError> {
        let rows = self.run_select(query).await?;
        at_most_one(query.table(), rows)
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<(), StoreError> {
        self.inserts.fetch_add(1, AtomicOrdering::Relaxed);
        self.check_outage().await?;
        if table.is_empty() {
            return Err(StoreError::InvalidQuery("empty table name".to_string()));
        }

        let mut tables = self.tables.lock().await;
        let mut stamped = Vec::with_capacity(rows.len());
        for mut row in rows {
            if !row.contains_key("id") {
                row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
            }
            if !row.contains_key("created_at") {
                let created_at = tables.next_created_at();
                row.insert(
                    "created_at".into(),
                    Value::String(created_at.to_rfc3339_opts(SecondsFormat::Micros, true)),
                );
            }
            stamped.push(row);
        }
        tables
            .rows
            .entry(table.to_owned())
            .or_default()
            .extend(stamped);

        Ok(())
    }
}

/// Order two column values: timestamps chronologically, other strings
/// lexically, numbers numerically. Missing values sort first.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => {
            match (
                DateTime::parse_from_rfc3339(a),
                DateTime::parse_from_rfc3339(b),
            ) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

// =============================================================================
// Session Provider
// =============================================================================

#[derive(Debug, Clone)]
struct Account {
    user: SessionUser,
    password_hash: String,
}

/// In-memory [`SessionProvider`] with argon2-hashed accounts.
///
/// Holds at most one active session, like a single browser tab.
#[derive(Debug, Default)]
pub struct MemorySessions {
    accounts: RwLock<HashMap<String, Account>>,
    current: RwLock<Option<Session>>,
    outage: RwLock<Option<String>>,
}

impl MemorySessions {
    /// Create a provider with no accounts and nobody signed in.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account with a freshly generated user id.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AccountExists` if the email is taken.
    /// Returns `SessionError::PasswordHash` if hashing fails.
    pub async fn register(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<UserId, SessionError> {
        let id = UserId::new(Uuid::new_v4().to_string());
        self.register_as(id.clone(), email, password).await?;
        Ok(id)
    }

    /// Register an account under a known user id.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AccountExists` if the email is taken.
    /// Returns `SessionError::PasswordHash` if hashing fails.
    pub async fn register_as(
        &self,
        id: UserId,
        email: &Email,
        password: &SecretString,
    ) -> Result<(), SessionError> {
        let password_hash = hash_password(password.expose_secret())?;
        let key = account_key(email);

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&key) {
            return Err(SessionError::AccountExists);
        }
        accounts.insert(
            key,
            Account {
                user: SessionUser {
                    id,
                    email: Some(email.as_str().to_owned()),
                },
                password_hash,
            },
        );
        Ok(())
    }

    /// Establish a session for `user` without checking credentials.
    pub async fn impersonate(&self, user: SessionUser) {
        *self.current.write().await = Some(new_session(user));
    }

    /// Make every subsequent call fail with `SessionError::Unavailable`
    /// (`Some(reason)`) or succeed again (`None`).
    pub async fn set_outage(&self, reason: Option<&str>) {
        *self.outage.write().await = reason.map(str::to_owned);
    }

    async fn check_outage(&self) -> Result<(), SessionError> {
        match self.outage.read().await.as_ref() {
            Some(reason) => Err(SessionError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

impl SessionProvider for MemorySessions {
    async fn session(&self) -> Result<Option<Session>, SessionError> {
        self.check_outage().await?;
        Ok(self.current.read().await.clone())
    }

    async fn user(&self) -> Result<Option<SessionUser>, SessionError> {
        self.check_outage().await?;
        Ok(self.current.read().await.as_ref().map(|s| s.user.clone()))
    }

    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Session, SessionError> {
        self.check_outage().await?;

        let account = self
            .accounts
            .read()
            .await
            .get(&account_key(email))
            .cloned()
            .ok_or(SessionError::InvalidCredentials)?;
        verify_password(password.expose_secret(), &account.password_hash)?;

        let session = new_session(account.user);
        *self.current.write().await = Some(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), SessionError> {
        self.check_outage().await?;
        *self.current.write().await = None;
        Ok(())
    }
}

fn account_key(email: &Email) -> String {
    email.as_str().to_lowercase()
}

fn new_session(user: SessionUser) -> Session {
    Session {
        user,
        access_token: SecretString::from(Uuid::new_v4().to_string()),
        refresh_token: None,
        expires_at: None,
    }
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, SessionError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| SessionError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), SessionError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| SessionError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| SessionError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_increasing_created_at() {
        let store = MemoryStore::new();
        store
            .insert("t", vec![row(json!({"n": 1})), row(json!({"n": 2}))])
            .await
            .unwrap();

        let rows = store.rows("t").await;
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.contains_key("id")));
        let first = rows[0]["created_at"].as_str().unwrap();
        let second = rows[1]["created_at"].as_str().unwrap();
        assert!(
            DateTime::parse_from_rfc3339(first).unwrap()
                < DateTime::parse_from_rfc3339(second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_select_filters_and_orders() {
        let store = MemoryStore::new();
        for (owner, n) in [("a", 1), ("b", 2), ("a", 3)] {
            store
                .insert("t", vec![row(json!({"owner": owner, "n": n}))])
                .await
                .unwrap();
        }

        let query = Select::from("t")
            .eq("owner", "a")
            .order("created_at", Direction::Descending);
        let rows = store.select(&query).await.unwrap();
        let ns: Vec<_> = rows.iter().map(|r| r["n"].clone()).collect();
        assert_eq!(ns, vec![json!(3), json!(1)]);
        assert_eq!(store.select_count(), 1);

        let rows = store
            .select(&Select::from("t").order("n", Direction::Ascending))
            .await
            .unwrap();
        let ns: Vec<_> = rows.iter().map(|r| r["n"].clone()).collect();
        assert_eq!(ns, vec![json!(1), json!(2), json!(3)]);
    }

    #[tokio::test]
    async fn test_select_one_maybe_semantics() {
        let store = MemoryStore::new();
        let query = Select::from("t").eq("k", "x");
        assert!(store.select_one(&query).await.unwrap().is_none());

        store.insert("t", vec![row(json!({"k": "x"}))]).await.unwrap();
        assert!(store.select_one(&query).await.unwrap().is_some());

        store.insert("t", vec![row(json!({"k": "x"}))]).await.unwrap();
        assert!(matches!(
            store.select_one(&query).await,
            Err(StoreError::MultipleRows { count: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_outage_fails_operations() {
        let store = MemoryStore::new();
        store.set_outage(Some("maintenance")).await;
        assert!(matches!(
            store.insert("t", vec![Row::new()]).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.select(&Select::from("t")).await.is_err());
        assert_eq!(store.insert_count(), 1);

        store.set_outage(None).await;
        assert!(store.insert("t", vec![Row::new()]).await.is_ok());
    }

    #[tokio::test]
    async fn test_sign_in_and_out() {
        let sessions = MemorySessions::new();
        let email = Email::parse("ada@example.com").unwrap();
        let password = SecretString::from("correct horse");
        let id = sessions.register(&email, &password).await.unwrap();

        assert!(sessions.session().await.unwrap().is_none());

        let wrong = SecretString::from("battery staple");
        assert!(matches!(
            sessions.sign_in_with_password(&email, &wrong).await,
            Err(SessionError::InvalidCredentials)
        ));

        let session = sessions
            .sign_in_with_password(&email, &password)
            .await
            .unwrap();
        assert_eq!(session.user.id, id);
        assert_eq!(sessions.user().await.unwrap().unwrap().id, id);

        sessions.sign_out().await.unwrap();
        assert!(sessions.user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_email() {
        let sessions = MemorySessions::new();
        let password = SecretString::from("correct horse");
        sessions
            .register(&Email::parse("ada@example.com").unwrap(), &password)
            .await
            .unwrap();
        assert!(matches!(
            sessions
                .register(&Email::parse("ADA@example.com").unwrap(), &password)
                .await,
            Err(SessionError::AccountExists)
        ));
    }

    #[tokio::test]
    async fn test_unknown_email_is_invalid_credentials() {
        let sessions = MemorySessions::new();
        let result = sessions
            .sign_in_with_password(
                &Email::parse("nobody@example.com").unwrap(),
                &SecretString::from("whatever"),
            )
            .await;
        assert!(matches!(result, Err(SessionError::InvalidCredentials)));
    }
}
