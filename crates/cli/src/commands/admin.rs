//! Admin grant management commands.
//!
//! Grants live in `admin_users`. A user is an admin only while their row is
//! active; revoking deactivates the row and keeps its role for the record.
//!
//! # Usage
//!
//! ```bash
//! porchlight admin grant -u 0f9c...-e1 -r editor -p addresses:read -p addresses:write
//! porchlight admin revoke -u 0f9c...-e1
//! porchlight admin list
//! ```
//!
//! # Environment Variables
//!
//! - `PORCHLIGHT_DATABASE_URL` - `PostgreSQL` connection string (falls back
//!   to `DATABASE_URL`)

use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use porchlight_core::{AdminGrant, UserId};

use super::migrate::database_url;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// User IDs are UUIDs issued by the auth provider.
    #[error("Invalid user ID: {0}")]
    InvalidUserId(String),

    /// Role labels may not be blank.
    #[error("Invalid role: role must not be blank")]
    BlankRole,

    /// No grant exists for the user.
    #[error("No admin grant for user: {0}")]
    NotFound(String),
}

#[derive(sqlx::FromRow)]
struct GrantRow {
    user_id: Uuid,
    role: Option<String>,
    permissions: Vec<String>,
    active: bool,
}

impl From<GrantRow> for AdminGrant {
    fn from(row: GrantRow) -> Self {
        Self {
            user_id: UserId::new(row.user_id.to_string()),
            role: row.role,
            permissions: row.permissions,
            active: row.active,
        }
    }
}

fn parse_user_id(raw: &str) -> Result<Uuid, AdminError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AdminError::InvalidUserId(raw.to_owned()))
}

async fn connect() -> Result<PgPool, AdminError> {
    let database_url =
        database_url().ok_or(AdminError::MissingEnvVar("PORCHLIGHT_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(PgPool::connect(&database_url).await?)
}

/// Create or replace the admin grant for a user.
pub async fn grant(
    user_id: &str,
    role: Option<&str>,
    permissions: &[String],
    active: bool,
) -> Result<(), AdminError> {
    let user_id = parse_user_id(user_id)?;
    let role = role.map(str::trim);
    if role.is_some_and(str::is_empty) {
        return Err(AdminError::BlankRole);
    }

    let pool = connect().await?;

    sqlx::query(
        r"
        INSERT INTO admin_users (user_id, role, permissions, active)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id) DO UPDATE
        SET role = EXCLUDED.role,
            permissions = EXCLUDED.permissions,
            active = EXCLUDED.active,
            updated_at = now()
        ",
    )
    .bind(user_id)
    .bind(role)
    .bind(permissions)
    .bind(active)
    .execute(&pool)
    .await?;

    tracing::info!(
        %user_id,
        role = role.unwrap_or("-"),
        permissions = permissions.len(),
        active,
        "Admin grant saved"
    );
    Ok(())
}

/// Deactivate the admin grant for a user.
pub async fn revoke(user_id: &str) -> Result<(), AdminError> {
    let user_id = parse_user_id(user_id)?;
    let pool = connect().await?;

    let result = sqlx::query(
        "UPDATE admin_users SET active = false, updated_at = now() WHERE user_id = $1",
    )
    .bind(user_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AdminError::NotFound(user_id.to_string()));
    }

    tracing::info!(%user_id, "Admin grant revoked");
    Ok(())
}

/// Print every admin grant.
#[allow(clippy::print_stdout)]
pub async fn list() -> Result<(), AdminError> {
    let pool = connect().await?;

    let grants: Vec<AdminGrant> = sqlx::query_as::<_, GrantRow>(
        "SELECT user_id, role, permissions, active FROM admin_users ORDER BY created_at",
    )
    .fetch_all(&pool)
    .await?
    .into_iter()
    .map(AdminGrant::from)
    .collect();

    if grants.is_empty() {
        println!("No admin grants");
        return Ok(());
    }

    for grant in &grants {
        println!(
            "{}  {:<8}  {:<10}  {}",
            grant.user_id,
            if grant.active { "active" } else { "inactive" },
            grant.role.as_deref().unwrap_or("-"),
            grant.permissions.join(",")
        );
    }
    Ok(())
}
