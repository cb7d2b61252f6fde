//! Address commands.
//!
//! # Usage
//!
//! ```bash
//! export PORCHLIGHT_EMAIL=ada@example.com PORCHLIGHT_PASSWORD=...
//! porchlight addresses list --json
//! porchlight addresses add --house-number 12 --street Elm --area Downtown \
//!     --city Springfield --state IL --pin-code 62701 --mobile 555-0100
//! ```
//!
//! Failures are reported as notifications on stderr, the same way an
//! interactive client would toast them.

use porchlight_client::{AddressBook, TracingNotifier};
use porchlight_core::NewAddress;

use super::{CommandError, Connection, Login};

/// Print the signed-in user's addresses, newest first.
#[allow(clippy::print_stdout)]
pub async fn list(login: &Login, json: bool) -> Result<(), CommandError> {
    let connection = Connection::open(login).await?;
    let book = AddressBook::new(connection.addresses(), TracingNotifier);
    let addresses = book.list().await;
    connection.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&addresses)?);
    } else if addresses.is_empty() {
        println!("No addresses");
    } else {
        for address in &addresses {
            println!("{}  {}", address.created_at.format("%Y-%m-%d"), address.one_line());
        }
    }
    Ok(())
}

/// Save an address for the signed-in user.
pub async fn add(login: &Login, address: NewAddress) -> Result<(), CommandError> {
    let connection = Connection::open(login).await?;
    let book = AddressBook::new(connection.addresses(), TracingNotifier);
    let saved = book.add(address).await;
    let count = book.snapshot().addresses.len();
    connection.close().await;

    if !saved {
        return Err(CommandError::NotSaved);
    }
    tracing::info!(count, "Address book updated");
    Ok(())
}
