//! Porchlight client library.
//!
//! Session-aware data access for a web front end:
//!
//! - [`AddressStore`] / [`AddressBook`] - the signed-in user's addresses,
//!   scoped to the session owner on every read and write
//! - [`IdentityResolver`] - who is signed in and whether they are an admin
//!
//! # Architecture
//!
//! Both services are generic over two injected collaborators: a
//! [`SessionProvider`] for authentication state and a [`RecordStore`] for
//! persistence. [`backend`] provides an HTTP implementation of both and an
//! in-memory one for tests. Services return typed results; only the
//! presentation adapter ([`AddressBook`]) talks to a [`Notifier`].
//!
//! # Example
//!
//! ```rust,ignore
//! use porchlight_client::{AddressStore, ClientConfig, IdentityResolver, RestClient};
//!
//! let config = ClientConfig::from_env()?;
//! let client = RestClient::new(&config)?;
//!
//! let identity = IdentityResolver::new(client.clone(), client.clone());
//! identity.sign_in("ada@example.com", &password).await?;
//!
//! let addresses = AddressStore::new(client.clone(), client);
//! let listing = addresses.list().await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod error;
pub mod notify;
pub mod services;
pub mod session;
pub mod store;

pub use backend::{MemorySessions, MemoryStore, RestClient};
pub use config::{ClientConfig, ConfigError};
pub use error::{SessionError, StoreError};
pub use notify::{Notifier, TracingNotifier};
pub use services::addresses::{AddressBook, AddressError, AddressSnapshot, AddressStore};
pub use services::identity::{AccessDenied, AuthError, IdentityResolver};
pub use session::{Gated, Session, SessionProvider, SessionUser};
pub use store::{RecordStore, Row, Select};
