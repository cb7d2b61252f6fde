//! Identity resolution.
//!
//! Joins the session principal against the admin authorization table. The
//! result is recomputed on every call so role changes take effect mid-session.

mod error;

pub use error::{AccessDenied, AuthError};

use secrecy::SecretString;
use tracing::instrument;

use porchlight_core::{AdminGrant, Email, Identity};

use crate::session::{Session, SessionProvider};
use crate::store::{RecordStore, Select, decode_row};
use error::ResolveError;

/// Default name of the admin authorization table.
pub const ADMIN_TABLE: &str = "admin_users";

/// Resolves who is signed in and whether they are an admin.
pub struct IdentityResolver<S, R> {
    sessions: S,
    records: R,
    table: String,
}

impl<S, R> IdentityResolver<S, R>
where
    S: SessionProvider,
    R: RecordStore,
{
    /// Create a resolver over the default admin table.
    #[must_use]
    pub fn new(sessions: S, records: R) -> Self {
        Self {
            sessions,
            records,
            table: ADMIN_TABLE.to_string(),
        }
    }

    /// Use a different admin table name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Resolve the signed-in identity.
    ///
    /// `None` means "not authenticated". Any failure along the way is logged
    /// and also yields `None`; this never errors.
    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn resolve(&self) -> Option<Identity> {
        match self.try_resolve().await {
            Ok(identity) => identity,
            Err(error) => {
                tracing::error!(%error, "Error resolving identity");
                None
            }
        }
    }

    async fn try_resolve(&self) -> Result<Option<Identity>, ResolveError> {
        let Some(user) = self.sessions.user().await? else {
            return Ok(None);
        };

        let query = Select::from(self.table.as_str()).eq("user_id", user.id.as_str());
        let grant = self
            .records
            .select_one(&query)
            .await?
            .map(decode_row::<AdminGrant>)
            .transpose()?;

        let identity = Identity::from_parts(user.id, user.email, grant);
        tracing::debug!(
            user_id = %identity.id,
            is_admin = identity.is_admin,
            "Resolved identity"
        );
        Ok(Some(identity))
    }

    /// Resolve the identity and insist on an active admin grant.
    ///
    /// # Errors
    ///
    /// Returns `AccessDenied::SignedOut` if no identity resolves.
    /// Returns `AccessDenied::NotAdmin` if the user is not an active admin.
    pub async fn require_admin(&self) -> Result<Identity, AccessDenied> {
        let identity = self.resolve().await.ok_or(AccessDenied::SignedOut)?;
        if identity.is_admin {
            Ok(identity)
        } else {
            Err(AccessDenied::NotAdmin)
        }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email is malformed.
    /// Returns `AuthError::InvalidCredentials` if the provider rejects them.
    /// Returns `AuthError::Provider` for any other provider failure.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &SecretString) -> Result<Session, AuthError> {
        let email = Email::parse(email)?;
        let session = self
            .sessions
            .sign_in_with_password(&email, password)
            .await?;
        tracing::info!(user_id = %session.user.id, "User signed in");
        Ok(session)
    }

    /// Sign out of the current session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Provider` if the provider fails to end the session.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.sessions.sign_out().await?;
        tracing::info!("User signed out");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use serde_json::{Value, json};

    use porchlight_core::UserId;

    use super::*;
    use crate::backend::memory::{MemorySessions, MemoryStore};
    use crate::error::SessionError;
    use crate::session::SessionUser;
    use crate::store::Row;

    type Resolver = IdentityResolver<Arc<MemorySessions>, Arc<MemoryStore>>;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    async fn resolver_for(id: &str) -> (Resolver, Arc<MemorySessions>, Arc<MemoryStore>) {
        let sessions = Arc::new(MemorySessions::new());
        sessions
            .impersonate(SessionUser {
                id: UserId::new(id),
                email: Some(format!("{id}@example.com")),
            })
            .await;
        let records = Arc::new(MemoryStore::new());
        (
            IdentityResolver::new(sessions.clone(), records.clone()),
            sessions,
            records,
        )
    }

    async fn grant(records: &MemoryStore, value: Value) {
        records.insert(ADMIN_TABLE, vec![row(value)]).await.unwrap();
    }

    #[tokio::test]
    async fn test_inactive_editor_is_not_admin() {
        let (resolver, _, records) = resolver_for("u2").await;
        grant(&records, json!({"user_id": "u2", "active": false, "role": "editor"})).await;

        let identity = resolver.resolve().await.unwrap();
        assert!(!identity.is_admin);
        assert_eq!(identity.admin_role.as_deref(), Some("editor"));
        assert_eq!(identity.email, "u2@example.com");
    }

    #[tokio::test]
    async fn test_active_grant_is_admin() {
        let (resolver, _, records) = resolver_for("u3").await;
        grant(
            &records,
            json!({"user_id": "u3", "active": true, "role": "owner", "permissions": ["users:write"]}),
        )
        .await;

        let identity = resolver.require_admin().await.unwrap();
        assert_eq!(identity.admin_permissions, vec!["users:write".to_string()]);
    }

    #[tokio::test]
    async fn test_no_grant_is_plain_user() {
        let (resolver, _, _) = resolver_for("u1").await;

        let identity = resolver.resolve().await.unwrap();
        assert!(!identity.is_admin);
        assert_eq!(identity.admin_role, None);
        assert!(identity.admin_permissions.is_empty());
        assert_eq!(resolver.require_admin().await, Err(AccessDenied::NotAdmin));
    }

    #[tokio::test]
    async fn test_missing_email_defaults_to_empty() {
        let sessions = Arc::new(MemorySessions::new());
        sessions
            .impersonate(SessionUser {
                id: UserId::new("u4"),
                email: None,
            })
            .await;
        let resolver = IdentityResolver::new(sessions, Arc::new(MemoryStore::new()));

        assert_eq!(resolver.resolve().await.unwrap().email, "");
    }

    #[tokio::test]
    async fn test_signed_out_resolves_to_none_without_lookup() {
        let records = Arc::new(MemoryStore::new());
        let resolver = IdentityResolver::new(Arc::new(MemorySessions::new()), records.clone());

        assert!(resolver.resolve().await.is_none());
        assert_eq!(records.select_count(), 0);
        assert_eq!(resolver.require_admin().await, Err(AccessDenied::SignedOut));
    }

    #[tokio::test]
    async fn test_failures_collapse_to_none() {
        let (resolver, sessions, records) = resolver_for("u1").await;

        records.set_outage(Some("timeout")).await;
        assert!(resolver.resolve().await.is_none());
        records.set_outage(None).await;

        sessions.set_outage(Some("auth down")).await;
        assert!(resolver.resolve().await.is_none());
        sessions.set_outage(None).await;

        grant(&records, json!({"user_id": "u1", "active": "yes"})).await;
        assert!(resolver.resolve().await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_grants_collapse_to_none() {
        let (resolver, _, records) = resolver_for("u1").await;
        grant(&records, json!({"user_id": "u1", "active": true})).await;
        grant(&records, json!({"user_id": "u1", "active": true})).await;

        assert!(resolver.resolve().await.is_none());
    }

    #[tokio::test]
    async fn test_grant_changes_apply_mid_session() {
        let (resolver, _, records) = resolver_for("u5").await;
        assert!(!resolver.resolve().await.unwrap().is_admin);

        grant(&records, json!({"user_id": "u5", "active": true})).await;
        assert!(resolver.resolve().await.unwrap().is_admin);
    }

    #[tokio::test]
    async fn test_sign_in_errors_propagate() {
        let sessions = Arc::new(MemorySessions::new());
        let email = Email::parse("ada@example.com").unwrap();
        let password = SecretString::from("correct horse");
        sessions.register(&email, &password).await.unwrap();
        let resolver = IdentityResolver::new(sessions.clone(), Arc::new(MemoryStore::new()));

        assert!(matches!(
            resolver.sign_in("not-an-email", &password).await,
            Err(AuthError::InvalidEmail(_))
        ));
        assert!(matches!(
            resolver
                .sign_in("ada@example.com", &SecretString::from("wrong"))
                .await,
            Err(AuthError::InvalidCredentials)
        ));

        let session = resolver.sign_in(" ada@example.com ", &password).await.unwrap();
        assert_eq!(
            resolver.resolve().await.unwrap().id,
            session.user.id
        );

        sessions.set_outage(Some("auth down")).await;
        assert!(matches!(
            resolver.sign_out().await,
            Err(AuthError::Provider(SessionError::Unavailable(_)))
        ));
        sessions.set_outage(None).await;

        resolver.sign_out().await.unwrap();
        assert!(resolver.resolve().await.is_none());
    }
}
