//! Signed-in identity and admin authorization records.

use serde::{Deserialize, Deserializer, Serialize};

use super::id::UserId;

/// An authorization record from the admin lookup table.
///
/// Presence alone grants nothing: only an `active` record makes its user an
/// admin. Missing or null `permissions` read as empty and a missing or null
/// `active` reads as `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminGrant {
    pub user_id: UserId,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub permissions: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub active: bool,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The resolved identity of the signed-in user.
///
/// Recomputed on every resolution and never persisted. `admin_role` and
/// `admin_permissions` are informational: only `is_admin` is an
/// authorization decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: UserId,
    pub email: String,
    pub is_admin: bool,
    pub admin_role: Option<String>,
    pub admin_permissions: Vec<String>,
}

impl Identity {
    /// Join a session principal with its (optional) authorization record.
    #[must_use]
    pub fn from_parts(id: UserId, email: Option<String>, grant: Option<AdminGrant>) -> Self {
        let is_admin = grant.as_ref().is_some_and(|g| g.active);
        let (admin_role, admin_permissions) =
            grant.map_or((None, Vec::new()), |g| (g.role, g.permissions));

        Self {
            id,
            email: email.unwrap_or_default(),
            is_admin,
            admin_role,
            admin_permissions,
        }
    }

    /// Whether the authorization record lists `permission`.
    ///
    /// Informational only; gate access on [`Identity::is_admin`].
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.admin_permissions.iter().any(|p| p == permission)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn grant(active: bool) -> AdminGrant {
        AdminGrant {
            user_id: UserId::new("u2"),
            role: Some("editor".into()),
            permissions: vec!["orders:read".into()],
            active,
        }
    }

    #[test]
    fn test_no_grant_is_not_admin() {
        let identity = Identity::from_parts(UserId::new("u1"), None, None);
        assert!(!identity.is_admin);
        assert_eq!(identity.email, "");
        assert_eq!(identity.admin_role, None);
        assert!(identity.admin_permissions.is_empty());
    }

    #[test]
    fn test_inactive_grant_keeps_role_but_not_admin() {
        let identity = Identity::from_parts(
            UserId::new("u2"),
            Some("u2@example.com".into()),
            Some(grant(false)),
        );
        assert!(!identity.is_admin);
        assert_eq!(identity.admin_role.as_deref(), Some("editor"));
        assert!(identity.has_permission("orders:read"));
    }

    #[test]
    fn test_active_grant_is_admin() {
        let identity = Identity::from_parts(UserId::new("u2"), None, Some(grant(true)));
        assert!(identity.is_admin);
        assert!(!identity.has_permission("orders:write"));
    }

    #[test]
    fn test_grant_nulls_read_as_defaults() {
        let parsed: AdminGrant =
            serde_json::from_value(json!({"user_id": "u3", "permissions": null, "active": null}))
                .unwrap();
        assert!(parsed.permissions.is_empty());
        assert!(!parsed.active);
        assert_eq!(parsed.role, None);

        let parsed: AdminGrant = serde_json::from_value(json!({"user_id": "u3"})).unwrap();
        assert!(!parsed.active);
    }

    #[test]
    fn test_identity_serializes_camel_case() {
        let identity = Identity::from_parts(UserId::new("u2"), None, Some(grant(true)));
        let value = serde_json::to_value(&identity).unwrap();
        assert_eq!(value["isAdmin"], json!(true));
        assert_eq!(value["adminRole"], json!("editor"));
        assert_eq!(value["adminPermissions"], json!(["orders:read"]));
    }
}
