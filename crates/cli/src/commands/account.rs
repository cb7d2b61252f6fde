//! Identity commands.
//!
//! # Usage
//!
//! ```bash
//! PORCHLIGHT_EMAIL=ada@example.com PORCHLIGHT_PASSWORD=... porchlight whoami --json
//! ```

use super::{CommandError, Connection, Login};

/// Sign in and print the resolved identity.
#[allow(clippy::print_stdout)]
pub async fn whoami(login: &Login, json: bool) -> Result<(), CommandError> {
    let connection = Connection::open(login).await?;
    let identity = connection.identity.resolve().await;
    connection.close().await;

    let identity = identity.ok_or(CommandError::SignedOut)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&identity)?);
        return Ok(());
    }

    println!("User:        {}", identity.id);
    println!("Email:       {}", identity.email);
    println!("Admin:       {}", if identity.is_admin { "yes" } else { "no" });
    if let Some(role) = &identity.admin_role {
        println!("Role:        {role}");
    }
    if !identity.admin_permissions.is_empty() {
        println!("Permissions: {}", identity.admin_permissions.join(", "));
    }
    Ok(())
}
